//! CirclePay HTTP service.
//!
//! Stores signed EIP-3009 transfer authorizations and executes them on-chain
//! with a sponsor wallet, so the token holder never pays gas.
//!
//! # Modules
//!
//! - [`handlers`] - Axum route handlers and router builder
//! - [`error`] - HTTP error mapping
//! - [`config`] - Server configuration with environment variable expansion
//! - [`util`] - Shutdown signal handling

pub mod config;
pub mod error;
pub mod handlers;
pub mod util;

pub use handlers::{AppState, app_router};
