//! Solidity interface definitions for on-chain interactions.
//!
//! - [`TransferWithAuthorization`] - the EIP-712 struct a sender signs
//! - [`IEIP3009`] - the USDC subset used for same-chain execution
//! - [`ICirclePay`] - the cross-chain settlement contract
//! - [`Sig6492`] - ABI-decodable prefix of an EIP-6492 wrapped signature

use alloy_sol_types::sol;

sol! {
    /// EIP-3009 `TransferWithAuthorization` typed-data struct.
    ///
    /// For a cross-chain transfer `to` is the settlement contract, not the
    /// final receiver.
    #[derive(Debug, PartialEq, Eq)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

sol! {
    /// Minimal EIP-3009 interface of the USDC token contract.
    ///
    /// Reference: <https://eips.ethereum.org/EIPS/eip-3009>
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug, PartialEq, Eq)]
    interface IEIP3009 {
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            bytes signature
        ) external;
    }
}

sol! {
    /// CirclePay cross-chain settlement contract.
    ///
    /// Pulls `value` from `from` with the sender's EIP-3009 authorization
    /// (whose `to` is this contract) and pays `receiver` on
    /// `destinationChain`.
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug, PartialEq, Eq)]
    interface ICirclePay {
        function transferUsdcCrossChain(
            address from,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            bytes signature,
            uint256 destinationChain,
            address receiver
        ) external;
    }
}

sol! {
    /// Solidity-compatible struct for decoding the prefix of an EIP-6492 signature.
    #[derive(Debug)]
    struct Sig6492 {
        address factory;
        bytes   factoryCalldata;
        bytes   innerSig;
    }
}
