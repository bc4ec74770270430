//! EVM chain provider backing the Execution Router.
//!
//! Provides [`Eip155ChainProvider`] with:
//! - Full filler stack (gas, blob gas, nonce, chain ID, wallet)
//! - [`PendingNonceManager`] for concurrent nonce tracking with pending queries
//! - Multiple sponsor signers with round-robin selection
//! - Automatic nonce reset on transaction failures
//! - A read-only mode for receipt verification without a sponsor wallet

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy_network::{Ethereum, EthereumWallet, Network, NetworkWallet, TransactionBuilder};
use alloy_primitives::{Address, TxHash};
use alloy_provider::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, NonceManager,
    WalletFiller,
};
use alloy_provider::{
    DynProvider, Identity, PendingTransactionBuilder, Provider, ProviderBuilder, RootProvider,
};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{BlockId, TransactionReceipt, TransactionRequest};
use alloy_transport::{TransportError, TransportResult};
use circlepay::ExecutionReceipt;
use dashmap::DashMap;
use tokio::sync::Mutex;
use url::Url;

use crate::router::{CallError, ContractCallService, MetaTransaction, PendingCall};

/// Nonce manager that queries pending transactions for the initial nonce.
///
/// - **First call per address**: queries with `.pending()` from RPC
/// - **Subsequent calls**: increments the cached nonce locally
/// - **On failure**: [`reset_nonce`](Self::reset_nonce) forces a re-query
#[derive(Clone, Debug, Default)]
pub struct PendingNonceManager {
    nonces: Arc<DashMap<Address, Arc<Mutex<u64>>>>,
}

const NONCE_UNSET: u64 = u64::MAX;

#[async_trait::async_trait]
impl NonceManager for PendingNonceManager {
    async fn get_next_nonce<P, N>(&self, provider: &P, address: Address) -> TransportResult<u64>
    where
        P: Provider<N>,
        N: Network,
    {
        let slot = {
            let entry = self
                .nonces
                .entry(address)
                .or_insert_with(|| Arc::new(Mutex::new(NONCE_UNSET)));
            Arc::clone(entry.value())
        };

        let mut nonce = slot.lock().await;
        let next = if *nonce == NONCE_UNSET {
            provider.get_transaction_count(address).pending().await?
        } else {
            *nonce + 1
        };
        *nonce = next;
        Ok(next)
    }
}

impl PendingNonceManager {
    /// Forgets the cached nonce of `address`; the next use re-queries it.
    pub async fn reset_nonce(&self, address: Address) {
        let slot = self.nonces.get(&address).map(|e| Arc::clone(e.value()));
        if let Some(slot) = slot {
            *slot.lock().await = NONCE_UNSET;
        }
    }
}

/// Combined filler type: Gas + `BlobGas` + Nonce([`PendingNonceManager`]) + `ChainId`.
pub type InnerFiller = JoinFill<
    GasFiller,
    JoinFill<BlobGasFiller, JoinFill<NonceFiller<PendingNonceManager>, ChainIdFiller>>,
>;

/// Fully composed Ethereum provider with all fillers and wallet signing.
pub type FullProvider = FillProvider<
    JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>,
    RootProvider,
>;

/// Configuration for [`Eip155ChainProvider`].
#[derive(Debug, Clone, Copy)]
pub struct ChainProviderConfig {
    /// Whether the chain supports EIP-1559 gas pricing (default: `true`).
    pub eip1559: bool,
    /// Whether the chain uses flashblocks (default: `false`).
    pub flashblocks: bool,
    /// Seconds the receipt watcher polls before giving up (default: 120).
    pub receipt_timeout_secs: u64,
}

impl Default for ChainProviderConfig {
    fn default() -> Self {
        Self {
            eip1559: true,
            flashblocks: false,
            receipt_timeout_secs: 120,
        }
    }
}

#[derive(Debug)]
struct Sponsor {
    provider: FullProvider,
    addresses: Vec<Address>,
    cursor: AtomicUsize,
    nonce_manager: PendingNonceManager,
}

impl Sponsor {
    fn next(&self) -> Address {
        if self.addresses.len() == 1 {
            self.addresses[0]
        } else {
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.addresses.len();
            self.addresses[idx]
        }
    }
}

/// JSON-RPC [`ContractCallService`] for one EVM chain.
#[derive(Debug, Clone)]
pub struct Eip155ChainProvider {
    read: DynProvider,
    sponsor: Option<Arc<Sponsor>>,
    config: ChainProviderConfig,
}

impl Eip155ChainProvider {
    /// Creates a provider that sponsors transactions with the signers in
    /// `wallet`.
    #[must_use]
    pub fn new(rpc_client: RpcClient, wallet: EthereumWallet, config: ChainProviderConfig) -> Self {
        let addresses: Vec<Address> =
            NetworkWallet::<Ethereum>::signer_addresses(&wallet).collect();
        let nonce_manager = PendingNonceManager::default();

        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(nonce_manager.clone()),
                    ChainIdFiller::default(),
                ),
            ),
        );

        let provider: FullProvider = ProviderBuilder::default()
            .filler(filler)
            .wallet(wallet)
            .connect_client(rpc_client);

        Self {
            read: provider.clone().erased(),
            sponsor: Some(Arc::new(Sponsor {
                provider,
                addresses,
                cursor: AtomicUsize::new(0),
                nonce_manager,
            })),
            config,
        }
    }

    /// Creates a provider that can only look up receipts.
    #[must_use]
    pub fn read_only(rpc_client: RpcClient, config: ChainProviderConfig) -> Self {
        Self {
            read: RootProvider::<Ethereum>::new(rpc_client).erased(),
            sponsor: None,
            config,
        }
    }

    /// Connects over HTTP; without a `wallet` the provider is read-only.
    #[must_use]
    pub fn connect_http(
        rpc_url: Url,
        wallet: Option<EthereumWallet>,
        config: ChainProviderConfig,
    ) -> Self {
        let client = RpcClient::new_http(rpc_url);
        match wallet {
            Some(wallet) => Self::new(client, wallet, config),
            None => Self::read_only(client, config),
        }
    }

    /// The provider used for reads.
    #[must_use]
    pub const fn read_provider(&self) -> &DynProvider {
        &self.read
    }

    /// All sponsor addresses.
    #[must_use]
    pub fn sponsor_addresses(&self) -> Vec<Address> {
        self.sponsor
            .as_ref()
            .map(|s| s.addresses.clone())
            .unwrap_or_default()
    }
}

/// Maps a node error to [`CallError`], recognizing contract reverts.
fn classify(error: &TransportError) -> CallError {
    match error.as_error_resp() {
        Some(payload) if payload.message.to_lowercase().contains("revert") => {
            CallError::Reverted(payload.message.to_string())
        }
        _ => CallError::Transport(error.to_string()),
    }
}

fn to_execution_receipt(receipt: &TransactionReceipt) -> ExecutionReceipt {
    ExecutionReceipt {
        transaction_hash: receipt.transaction_hash,
        success: receipt.status(),
        block_number: receipt.block_number,
    }
}

/// A broadcast transaction awaiting its receipt.
#[derive(Debug)]
pub struct Eip155PendingCall {
    inner: PendingTransactionBuilder<Ethereum>,
    sponsor: Arc<Sponsor>,
    from: Address,
    confirmations: u64,
    timeout: Duration,
}

impl PendingCall for Eip155PendingCall {
    fn tx_hash(&self) -> TxHash {
        *self.inner.tx_hash()
    }

    async fn confirm(self) -> Result<ExecutionReceipt, CallError> {
        let watcher = self
            .inner
            .with_required_confirmations(self.confirmations)
            .with_timeout(Some(self.timeout));
        match watcher.get_receipt().await {
            Ok(receipt) => Ok(to_execution_receipt(&receipt)),
            Err(e) => {
                self.sponsor.nonce_manager.reset_nonce(self.from).await;
                Err(CallError::Transport(e.to_string()))
            }
        }
    }
}

impl ContractCallService for Eip155ChainProvider {
    type Pending = Eip155PendingCall;

    fn sponsor(&self) -> Option<Address> {
        self.sponsor.as_ref().and_then(|s| s.addresses.first().copied())
    }

    async fn submit(&self, tx: MetaTransaction) -> Result<Eip155PendingCall, CallError> {
        let sponsor = self.sponsor.clone().ok_or(CallError::NoSponsor)?;
        let from = sponsor.next();

        let mut txr = TransactionRequest::default()
            .with_to(tx.to)
            .with_from(from)
            .with_input(tx.calldata);

        // Legacy gas pricing for non-EIP-1559 chains
        if !self.config.eip1559 {
            let gas = sponsor
                .provider
                .get_gas_price()
                .await
                .map_err(|e| classify(&e))?;
            txr.set_gas_price(gas);
        }

        // Estimation runs the call, so a used nonce or bad signature reverts here.
        let block_id = if self.config.flashblocks {
            BlockId::latest()
        } else {
            BlockId::pending()
        };
        let gas_limit = sponsor
            .provider
            .estimate_gas(txr.clone())
            .block(block_id)
            .await
            .map_err(|e| classify(&e))?;
        txr.set_gas_limit(gas_limit);

        let pending = match sponsor.provider.send_transaction(txr).await {
            Ok(pending) => pending,
            Err(e) => {
                sponsor.nonce_manager.reset_nonce(from).await;
                return Err(classify(&e));
            }
        };
        #[cfg(feature = "telemetry")]
        tracing::debug!(tx = %pending.tx_hash(), sponsor = %from, "transaction broadcast");

        Ok(Eip155PendingCall {
            inner: pending,
            sponsor,
            from,
            confirmations: tx.confirmations,
            timeout: Duration::from_secs(self.config.receipt_timeout_secs),
        })
    }

    async fn receipt(&self, tx: TxHash) -> Result<Option<ExecutionReceipt>, CallError> {
        let receipt = self
            .read
            .get_transaction_receipt(tx)
            .await
            .map_err(|e| classify(&e))?;
        Ok(receipt.as_ref().map(to_execution_receipt))
    }
}
