//! Known USDC and settlement contract deployments.

use alloy_primitives::{Address, address};
use circlepay::ChainId;
use circlepay::amount::USDC_DECIMALS;

use crate::chain::{AssetInfo, ChainDeployment};

/// Ethereum Mainnet chain ID.
pub const ETHEREUM_MAINNET: ChainId = 1;

/// OP Mainnet chain ID.
pub const OPTIMISM_MAINNET: ChainId = 10;

/// Polygon Mainnet chain ID.
pub const POLYGON_MAINNET: ChainId = 137;

/// Base Mainnet chain ID.
pub const BASE_MAINNET: ChainId = 8453;

/// Arbitrum One chain ID.
pub const ARBITRUM_MAINNET: ChainId = 42161;

/// Polygon Amoy (testnet) chain ID.
pub const POLYGON_AMOY: ChainId = 80002;

/// Base Sepolia (testnet) chain ID.
pub const BASE_SEPOLIA: ChainId = 84532;

/// Arbitrum Sepolia (testnet) chain ID.
pub const ARBITRUM_SEPOLIA: ChainId = 421_614;

/// Ethereum Sepolia (testnet) chain ID.
pub const ETHEREUM_SEPOLIA: ChainId = 11_155_111;

/// OP Sepolia (testnet) chain ID.
pub const OPTIMISM_SEPOLIA: ChainId = 11_155_420;

/// USDC contract address on Ethereum Mainnet.
pub const USDC_ETHEREUM: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

/// USDC contract address on OP Mainnet.
pub const USDC_OPTIMISM: Address = address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85");

/// USDC contract address on Polygon Mainnet.
pub const USDC_POLYGON: Address = address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359");

/// USDC contract address on Base Mainnet.
pub const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC contract address on Arbitrum One.
pub const USDC_ARBITRUM: Address = address!("af88d065e77c8cC2239327C5EDb3A432268e5831");

/// USDC contract address on Polygon Amoy.
pub const USDC_POLYGON_AMOY: Address = address!("41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582");

/// USDC contract address on Base Sepolia.
pub const USDC_BASE_SEPOLIA: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// USDC contract address on Arbitrum Sepolia.
pub const USDC_ARBITRUM_SEPOLIA: Address = address!("75faf114eafb1BDbe2F0316DF893fd58CE46AA4d");

/// USDC contract address on Ethereum Sepolia.
pub const USDC_ETHEREUM_SEPOLIA: Address = address!("1c7D4B196Cb0C7B01d743Fbc6116a902379C7238");

/// USDC contract address on OP Sepolia.
pub const USDC_OPTIMISM_SEPOLIA: Address = address!("5fd84259d66Cd46123540766Be93DFE6D43130D7");

/// Cross-chain settlement contract, deployed at the same address on Base
/// Sepolia, Arbitrum Sepolia and OP Sepolia.
pub const CIRCLEPAY_SETTLEMENT: Address = address!("ca31f2E4A6595586A617Ae6bf194EfcB243C187e");

/// EIP-712 domain name of USDC on mainnets.
pub const MAINNET_USDC_NAME: &str = "USD Coin";

/// EIP-712 domain name of USDC on testnets.
pub const TESTNET_USDC_NAME: &str = "USDC";

/// EIP-712 domain version of USDC.
pub const DEFAULT_USDC_VERSION: &str = "2";

/// Returns the deployments of all known chains.
#[must_use]
pub fn known_deployments() -> Vec<ChainDeployment> {
    vec![
        deployment(ETHEREUM_MAINNET, "Ethereum", USDC_ETHEREUM, MAINNET_USDC_NAME, None),
        deployment(OPTIMISM_MAINNET, "OP Mainnet", USDC_OPTIMISM, MAINNET_USDC_NAME, None),
        deployment(POLYGON_MAINNET, "Polygon", USDC_POLYGON, MAINNET_USDC_NAME, None),
        deployment(BASE_MAINNET, "Base", USDC_BASE, MAINNET_USDC_NAME, None),
        deployment(ARBITRUM_MAINNET, "Arbitrum One", USDC_ARBITRUM, MAINNET_USDC_NAME, None),
        deployment(POLYGON_AMOY, "Polygon Amoy", USDC_POLYGON_AMOY, TESTNET_USDC_NAME, None),
        deployment(
            BASE_SEPOLIA,
            "Base Sepolia",
            USDC_BASE_SEPOLIA,
            TESTNET_USDC_NAME,
            Some(CIRCLEPAY_SETTLEMENT),
        ),
        deployment(
            ARBITRUM_SEPOLIA,
            "Arbitrum Sepolia",
            USDC_ARBITRUM_SEPOLIA,
            TESTNET_USDC_NAME,
            Some(CIRCLEPAY_SETTLEMENT),
        ),
        deployment(
            ETHEREUM_SEPOLIA,
            "Sepolia",
            USDC_ETHEREUM_SEPOLIA,
            TESTNET_USDC_NAME,
            None,
        ),
        deployment(
            OPTIMISM_SEPOLIA,
            "OP Sepolia",
            USDC_OPTIMISM_SEPOLIA,
            TESTNET_USDC_NAME,
            Some(CIRCLEPAY_SETTLEMENT),
        ),
    ]
}

fn deployment(
    chain_id: ChainId,
    name: &str,
    token: Address,
    token_name: &str,
    settlement: Option<Address>,
) -> ChainDeployment {
    ChainDeployment {
        chain_id,
        name: name.to_owned(),
        token: usdc_asset(token, token_name, DEFAULT_USDC_VERSION),
        settlement,
    }
}

/// Creates a USDC [`AssetInfo`] with the given address and EIP-712 domain.
#[must_use]
pub fn usdc_asset(address: Address, name: &str, version: &str) -> AssetInfo {
    AssetInfo {
        address,
        decimals: USDC_DECIMALS,
        name: name.to_owned(),
        version: version.to_owned(),
    }
}
