//! Chain/contract resolution.
//!
//! [`ChainRegistry`] maps an EIP-155 chain ID to the USDC token contract that
//! implements `transferWithAuthorization` and, where deployed, to the
//! cross-chain settlement contract. The table is plain data: it starts from
//! [`known_deployments`](crate::known_deployments) and can be overridden or
//! extended from configuration.

use std::collections::HashMap;

use alloy_primitives::Address;
use alloy_sol_types::{Eip712Domain, eip712_domain};
use circlepay::{ChainId, CirclePayError, ExecutionPath};
use serde::{Deserialize, Serialize};

/// Token metadata needed to build its EIP-712 domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Contract address.
    pub address: Address,
    /// Number of decimals.
    pub decimals: u8,
    /// EIP-712 domain name for the token contract.
    pub name: String,
    /// EIP-712 domain version for the token contract.
    pub version: String,
}

/// Contracts deployed on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDeployment {
    /// EIP-155 chain ID.
    pub chain_id: ChainId,
    /// Human-readable chain name.
    pub name: String,
    /// The USDC token contract.
    pub token: AssetInfo,
    /// The cross-chain settlement contract, if deployed on this chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Address>,
}

impl ChainDeployment {
    /// EIP-712 domain of the token contract on this chain.
    #[must_use]
    pub fn eip712_domain(&self) -> Eip712Domain {
        eip712_domain! {
            name: self.token.name.clone(),
            version: self.token.version.clone(),
            chain_id: self.chain_id,
            verifying_contract: self.token.address,
        }
    }
}

/// Data-driven chain/contract registry.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    deployments: HashMap<ChainId, ChainDeployment>,
}

impl ChainRegistry {
    /// Creates a registry from a list of deployments. Later entries for the
    /// same chain replace earlier ones.
    #[must_use]
    pub fn new(deployments: impl IntoIterator<Item = ChainDeployment>) -> Self {
        Self {
            deployments: deployments
                .into_iter()
                .map(|d| (d.chain_id, d))
                .collect(),
        }
    }

    /// Registry of all known USDC and settlement deployments.
    #[must_use]
    pub fn known() -> Self {
        Self::new(crate::known_deployments())
    }

    /// Adds or replaces the deployment for its chain.
    #[must_use]
    pub fn with_deployment(mut self, deployment: ChainDeployment) -> Self {
        self.insert(deployment);
        self
    }

    /// Adds or replaces the deployment for its chain.
    pub fn insert(&mut self, deployment: ChainDeployment) {
        self.deployments.insert(deployment.chain_id, deployment);
    }

    /// Returns the deployment for `chain_id`, if supported.
    #[must_use]
    pub fn get(&self, chain_id: ChainId) -> Option<&ChainDeployment> {
        self.deployments.get(&chain_id)
    }

    /// Returns the deployment for `chain_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CirclePayError::UnsupportedChain`] for an unknown chain.
    pub fn deployment(&self, chain_id: ChainId) -> Result<&ChainDeployment, CirclePayError> {
        self.get(chain_id)
            .ok_or(CirclePayError::UnsupportedChain(chain_id))
    }

    /// Whether `chain_id` has a known token deployment.
    #[must_use]
    pub fn is_supported_chain(&self, chain_id: ChainId) -> bool {
        self.deployments.contains_key(&chain_id)
    }

    /// Address of the USDC token contract on `chain_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CirclePayError::UnsupportedChain`] for an unknown chain.
    pub fn resolve_token_contract(&self, chain_id: ChainId) -> Result<Address, CirclePayError> {
        self.deployment(chain_id).map(|d| d.token.address)
    }

    /// Address of the cross-chain settlement contract on `chain_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CirclePayError::UnsupportedChain`] if the chain is unknown or
    /// has no settlement contract.
    pub fn resolve_settlement_contract(
        &self,
        chain_id: ChainId,
    ) -> Result<Address, CirclePayError> {
        self.deployment(chain_id)?
            .settlement
            .ok_or(CirclePayError::UnsupportedChain(chain_id))
    }

    /// The contract a transfer from `origin` along `path` is sent to.
    ///
    /// Same-chain transfers call the token contract; cross-chain transfers
    /// call the settlement contract, and the destination chain must be known
    /// as well.
    ///
    /// # Errors
    ///
    /// Returns [`CirclePayError::UnsupportedChain`] naming the first chain
    /// that cannot be resolved.
    pub fn resolve_target(
        &self,
        origin: ChainId,
        path: ExecutionPath,
    ) -> Result<Address, CirclePayError> {
        match path {
            ExecutionPath::SameChain => self.resolve_token_contract(origin),
            ExecutionPath::CrossChain { destination_chain } => {
                let settlement = self.resolve_settlement_contract(origin)?;
                if !self.is_supported_chain(destination_chain) {
                    return Err(CirclePayError::UnsupportedChain(destination_chain));
                }
                Ok(settlement)
            }
        }
    }

    /// All deployments, ordered by chain ID.
    #[must_use]
    pub fn deployments(&self) -> Vec<&ChainDeployment> {
        let mut all: Vec<_> = self.deployments.values().collect();
        all.sort_by_key(|d| d.chain_id);
        all
    }
}
