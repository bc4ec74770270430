#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EIP-155 (EVM) support for CirclePay gasless USDC transfers.
//!
//! This crate turns the chain-agnostic records of [`circlepay`] into EVM
//! operations:
//!
//! - [`chain`] - Chain/contract resolution over a data-driven registry
//! - [`authorization`] - Nonce derivation, EIP-712 message construction and signing
//! - [`signature`] - EOA / EIP-1271 / EIP-6492 signature classification
//! - [`contract`] - Solidity bindings for the token and settlement contracts
//! - [`router`] - The Execution Router and its contract-call service seam
//! - `provider` - An alloy-backed contract-call service (feature `provider`)
//!
//! # Feature Flags
//!
//! - `provider` - JSON-RPC contract-call service built on alloy
//! - `telemetry` - `tracing` spans and events

/// Awaits a future, optionally instrumenting it with a tracing span.
macro_rules! traced {
    ($fut:expr, $span:expr) => {{
        #[cfg(feature = "telemetry")]
        {
            use tracing::Instrument;
            $fut.instrument($span).await
        }
        #[cfg(not(feature = "telemetry"))]
        {
            $fut.await
        }
    }};
}

pub mod authorization;
pub mod chain;
pub mod contract;
#[cfg(feature = "provider")]
pub mod provider;
pub mod router;
pub mod signature;

mod networks;
pub use networks::*;

pub use authorization::{
    AuthorizationRequest, AuthorizationSigner, NonceGenerator, TypedAuthorization,
    build_authorization_message, generate_nonce, sign_authorization, verify_transfer_signature,
};
pub use chain::{AssetInfo, ChainDeployment, ChainRegistry};
pub use router::{
    CallError, ContractCallService, ExecutionError, ExecutionReport, ExecutionRouter,
    MetaTransaction, PendingCall, PreparedCall, ReconcileOutcome,
};
