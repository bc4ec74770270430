//! Server configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! port = 4022
//! require_eoa_signatures = true
//! receipt_timeout_secs = 120
//!
//! [storage]
//! backend = "sqlite"
//! path = "circlepay.db"
//!
//! [chains."eip155:84532"]
//! rpc_url = "https://sepolia.base.org"
//! sponsor_private_key = "$SPONSOR_KEY_BASE_SEPOLIA"
//!
//! [[deployments]]
//! chain_id = 31337
//! name = "Anvil"
//! token = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
//! token_name = "USDC"
//! token_version = "2"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `config.toml`)
//! - `HOST` - Override server bind address
//! - `PORT` - Override server port
//! - Sponsor keys referenced by `$VAR` in the config file

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use circlepay::ChainId;
use circlepay_evm::{ChainDeployment, ChainRegistry, usdc_asset};
use serde::{Deserialize, Serialize};

/// Errors from loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`ServerConfig`].
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
}

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `4022`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Reject stored signatures that do not recover to the sender.
    #[serde(default = "default_true")]
    pub require_eoa_signatures: bool,

    /// Seconds to wait for a sponsored transaction's receipt.
    #[serde(default = "default_receipt_timeout")]
    pub receipt_timeout_secs: u64,

    /// Block confirmations to wait for.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    /// Persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// RPC access per chain, keyed by CAIP-2 identifier.
    #[serde(default)]
    pub chains: HashMap<String, ChainConfig>,

    /// Deployments that override or extend the built-in registry.
    #[serde(default)]
    pub deployments: Vec<DeploymentConfig>,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite file.
    #[default]
    Sqlite,
    /// Process memory; records are lost on restart.
    Memory,
}

/// The `[storage]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which backend to use.
    #[serde(default)]
    pub backend: StorageBackend,
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// SQLite connections kept open.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_db_path(),
            pool_size: default_pool_size(),
        }
    }
}

/// Per-chain RPC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// HTTP RPC endpoint URL.
    pub rpc_url: String,

    /// Private key of the sponsor wallet (hex, with or without `0x`).
    /// Without it the chain is only used to verify reported receipts.
    #[serde(default)]
    pub sponsor_private_key: Option<String>,

    /// Whether the chain supports EIP-1559 gas pricing.
    #[serde(default = "default_true")]
    pub eip1559: bool,

    /// Whether the chain uses flashblocks.
    #[serde(default)]
    pub flashblocks: bool,
}

/// A `[[deployments]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// EIP-155 chain ID.
    pub chain_id: ChainId,
    /// Human-readable chain name.
    pub name: String,
    /// USDC token contract.
    pub token: Address,
    /// EIP-712 domain name of the token.
    pub token_name: String,
    /// EIP-712 domain version of the token.
    pub token_version: String,
    /// Cross-chain settlement contract.
    #[serde(default)]
    pub settlement: Option<Address>,
}

impl From<DeploymentConfig> for ChainDeployment {
    fn from(value: DeploymentConfig) -> Self {
        Self {
            chain_id: value.chain_id,
            name: value.name,
            token: usdc_asset(value.token, &value.token_name, &value.token_version),
            settlement: value.settlement,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

const fn default_port() -> u16 {
    4022
}

const fn default_true() -> bool {
    true
}

const fn default_receipt_timeout() -> u64 {
    120
}

const fn default_confirmations() -> u64 {
    1
}

fn default_db_path() -> PathBuf {
    PathBuf::from("circlepay.db")
}

const fn default_pool_size() -> usize {
    circlepay_store::DEFAULT_POOL_SIZE
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            require_eoa_signatures: true,
            receipt_timeout_secs: default_receipt_timeout(),
            confirmations: default_confirmations(),
            storage: StorageConfig::default(),
            chains: HashMap::new(),
            deployments: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the path given by the `CONFIG` environment
    /// variable, falling back to `config.toml` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(Path::new(&path))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the defaults. `HOST` and `PORT` override the
    /// file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = if path.exists() {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?
        } else {
            String::new()
        };
        let mut config = Self::from_toml_str(&content)?;

        if let Some(host) = std::env::var("HOST").ok().and_then(|h| h.parse().ok()) {
            config.host = host;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        Ok(config)
    }

    /// Parses configuration text after expanding environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(&expand_env_vars(content))?)
    }

    /// The built-in registry with the configured deployments applied.
    #[must_use]
    pub fn registry(&self) -> ChainRegistry {
        self.deployments
            .iter()
            .cloned()
            .fold(ChainRegistry::known(), |registry, d| {
                registry.with_deployment(d.into())
            })
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string from environment variables.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        let braced = chars.next_if_eq(&'{').is_some();
        let mut name = String::new();
        let mut closed = false;
        while let Some(&c) = chars.peek() {
            if braced && c == '}' {
                chars.next();
                closed = true;
                break;
            }
            if !braced && !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            name.push(c);
            chars.next();
        }

        // An unterminated `${` is literal text, never a lookup.
        let resolved = if name.is_empty() || (braced && !closed) {
            None
        } else {
            std::env::var(&name).ok()
        };
        match resolved {
            Some(value) => result.push_str(&value),
            None => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&name);
                if closed {
                    result.push('}');
                }
            }
        }
    }

    result
}
