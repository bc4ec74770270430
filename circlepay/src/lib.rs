#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for CirclePay gasless USDC transfers.
//!
//! A sender signs an EIP-3009 `transferWithAuthorization` message off-chain.
//! The signed intent is persisted as a pending [`TransferAuthorization`], and
//! any sponsor may later submit it on-chain and pay the gas. This crate holds
//! the chain-agnostic pieces of that workflow; EVM specifics live in
//! `circlepay-evm` and SQLite persistence in `circlepay-store`.
//!
//! # Modules
//!
//! - [`amount`] - USDC base-unit amounts and decimal conversion
//! - [`campaign`] - Sponsor campaigns and their store contract
//! - [`chain`] - EIP-155 chain identifiers and CAIP-2 helpers
//! - [`error`] - The [`CirclePayError`] taxonomy
//! - [`execution`] - Execution path, state machine and receipts
//! - [`nonce`] - 32-byte authorization nonces and their wire form
//! - [`reconcile`] - Bridges confirmed receipts back into the store
//! - [`store`] - The Pending-Transfer Store contract and an in-memory backend
//! - [`timestamp`] - Unix timestamps and clocks
//! - [`transfer`] - The persisted transfer authorization record
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation

pub mod amount;
pub mod campaign;
pub mod chain;
pub mod error;
pub mod execution;
pub mod nonce;
pub mod reconcile;
pub mod store;
pub mod timestamp;
pub mod transfer;

pub use amount::TokenAmount;
pub use campaign::{Campaign, CampaignStore, NewCampaign};
pub use chain::ChainId;
pub use error::CirclePayError;
pub use execution::{ExecutionPath, ExecutionReceipt, ExecutionState};
pub use nonce::AuthorizationNonce;
pub use reconcile::ReceiptReconciler;
pub use store::{MemoryCampaignStore, MemoryTransferStore, StoreError, TransferStore};
pub use timestamp::{Clock, SystemClock, UnixTimestamp};
pub use transfer::{NewTransfer, TransferAuthorization, TransferFilter, TransferId};
