//! CirclePay HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p circlepay-server --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p circlepay-server
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p circlepay-server
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `config.toml`)
//! - `HOST` - Override bind address (default: `0.0.0.0`)
//! - `PORT` - Override port (default: `4022`)
//! - `RUST_LOG` - Log level filter (default: `info`)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alloy_network::EthereumWallet;
use alloy_signer_local::PrivateKeySigner;
use axum::http::Method;
use circlepay::chain::parse_caip2;
use circlepay::{
    CampaignStore, MemoryCampaignStore, MemoryTransferStore, ReceiptReconciler, TransferStore,
};
use circlepay_evm::ExecutionRouter;
use circlepay_evm::provider::{ChainProviderConfig, Eip155ChainProvider};
use circlepay_store::SqliteStore;
use tower_http::cors;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use url::Url;

use circlepay_server::config::{ServerConfig, StorageBackend};
use circlepay_server::handlers::{AppState, app_router};
use circlepay_server::util::SigDown;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("server failed: {e}");
        std::process::exit(1);
    }
}

type Stores = (Arc<dyn TransferStore>, Arc<dyn CampaignStore>);

fn open_stores(config: &ServerConfig) -> Result<Stores, Box<dyn std::error::Error>> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            let store =
                SqliteStore::open_with_pool_size(&config.storage.path, config.storage.pool_size)?;
            tracing::info!(
                path = %config.storage.path.display(),
                pool_size = config.storage.pool_size,
                "opened SQLite store"
            );
            let transfers: Arc<dyn TransferStore> = Arc::new(store.clone());
            let campaigns: Arc<dyn CampaignStore> = Arc::new(store);
            Ok((transfers, campaigns))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; records are lost on restart");
            let transfers: Arc<dyn TransferStore> = Arc::new(MemoryTransferStore::new());
            let campaigns: Arc<dyn CampaignStore> = Arc::new(MemoryCampaignStore::new());
            Ok((transfers, campaigns))
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        chains = config.chains.len(),
        "loaded configuration"
    );

    let registry = Arc::new(config.registry());
    let (transfers, campaigns) = open_stores(&config)?;

    let mut router = ExecutionRouter::new(Arc::clone(&registry), ReceiptReconciler::new(transfers))
        .with_confirmation_timeout(Duration::from_secs(config.receipt_timeout_secs))
        .with_confirmations(config.confirmations);

    for (network_id, chain_cfg) in &config.chains {
        let Some(chain_id) = parse_caip2(network_id) else {
            tracing::warn!(network = %network_id, "skipping chain: invalid CAIP-2 identifier");
            continue;
        };
        if !registry.is_supported_chain(chain_id) {
            tracing::warn!(network = %network_id, "skipping chain: no USDC deployment known");
            continue;
        }

        let rpc_url: Url = chain_cfg
            .rpc_url
            .parse()
            .map_err(|e| format!("invalid RPC URL for {network_id}: {e}"))?;

        let key = chain_cfg
            .sponsor_private_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        let wallet = match key {
            Some(k) if k.starts_with('$') => {
                tracing::warn!(
                    network = %network_id,
                    "sponsor_private_key not resolved (missing env var?); chain is read-only"
                );
                None
            }
            Some(k) => {
                let signer: PrivateKeySigner = k
                    .parse()
                    .map_err(|e| format!("invalid sponsor key for {network_id}: {e}"))?;
                Some(EthereumWallet::from(signer))
            }
            None => None,
        };

        let provider = Eip155ChainProvider::connect_http(
            rpc_url,
            wallet,
            ChainProviderConfig {
                eip1559: chain_cfg.eip1559,
                flashblocks: chain_cfg.flashblocks,
                receipt_timeout_secs: config.receipt_timeout_secs,
            },
        );
        tracing::info!(
            network = %network_id,
            sponsors = ?provider.sponsor_addresses(),
            "registered chain"
        );
        router = router.with_service(chain_id, provider);
    }

    let sig_down = SigDown::try_new()?;
    let shutdown = sig_down.cancellation_token();
    let state = AppState::new(router, campaigns, config.require_eoa_signatures)
        .with_shutdown(shutdown.clone());

    let app = app_router(state).layer(TraceLayer::new_for_http()).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PATCH])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    sig_down.recv().await;
    tracing::info!("shut down gracefully");
    Ok(())
}
