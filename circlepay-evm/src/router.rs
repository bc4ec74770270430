//! Execution Router.
//!
//! Given a stored [`TransferAuthorization`], the router picks the execution
//! path, encodes the matching contract call and drives one execution attempt
//! through [`ExecutionState`]:
//!
//! - same-chain: `transferWithAuthorization(sender, receiver, amount,
//!   validAfter, validBefore, nonce, signature)` on the token contract
//! - cross-chain: `transferUsdcCrossChain(sender, amount, validAfter,
//!   validBefore, nonce, signature, destinationChain, receiver)` on the
//!   settlement contract
//!
//! The router never serializes competing sponsors. The token contract
//! rejects a second use of a nonce, and the store's atomic `mark_executed`
//! rejects a second bookkeeping update; both outcomes are reported, not
//! treated as corruption. A failed attempt leaves the record pending.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_sol_types::SolCall;
use circlepay::execution::InvalidTransition;
use circlepay::{
    ChainId, CirclePayError, ExecutionPath, ExecutionReceipt, ExecutionState, ReceiptReconciler,
    TransferAuthorization, TransferId,
};
use serde::Serialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::chain::ChainRegistry;
use crate::contract::{ICirclePay, IEIP3009};

/// Default bound on waiting for a receipt.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// A transaction to broadcast: target contract, calldata and the number of
/// confirmations to wait for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTransaction {
    /// Target contract address.
    pub to: Address,
    /// Encoded function call data.
    pub calldata: Bytes,
    /// Number of block confirmations to wait for.
    pub confirmations: u64,
}

/// Errors reported by a [`ContractCallService`].
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The contract rejected the call.
    #[error("execution reverted: {0}")]
    Reverted(String),
    /// The node could not be reached or refused the transaction.
    #[error("{0}")]
    Transport(String),
    /// The service has no wallet to sign with.
    #[error("no sponsor wallet is configured")]
    NoSponsor,
}

/// Handle to a broadcast transaction.
pub trait PendingCall: Send {
    /// Hash of the broadcast transaction.
    fn tx_hash(&self) -> TxHash;

    /// Waits for the transaction to be mined.
    fn confirm(self) -> impl Future<Output = Result<ExecutionReceipt, CallError>> + Send;
}

/// The contract-call collaborator of the router, one per chain.
pub trait ContractCallService: Send + Sync {
    /// Handle returned by [`submit`](Self::submit).
    type Pending: PendingCall;

    /// Address that pays for submitted transactions, if any.
    fn sponsor(&self) -> Option<Address>;

    /// Broadcasts `tx` and returns once the node accepts it.
    fn submit(
        &self,
        tx: MetaTransaction,
    ) -> impl Future<Output = Result<Self::Pending, CallError>> + Send;

    /// Looks up the receipt of an already broadcast transaction.
    fn receipt(
        &self,
        tx: TxHash,
    ) -> impl Future<Output = Result<Option<ExecutionReceipt>, CallError>> + Send;
}

impl<T: ContractCallService> ContractCallService for Arc<T> {
    type Pending = T::Pending;

    fn sponsor(&self) -> Option<Address> {
        (**self).sponsor()
    }

    fn submit(
        &self,
        tx: MetaTransaction,
    ) -> impl Future<Output = Result<Self::Pending, CallError>> + Send {
        (**self).submit(tx)
    }

    fn receipt(
        &self,
        tx: TxHash,
    ) -> impl Future<Output = Result<Option<ExecutionReceipt>, CallError>> + Send {
        (**self).receipt(tx)
    }
}

/// One named argument of a prepared call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallArgument {
    /// Solidity parameter name.
    pub name: &'static str,
    /// Solidity parameter type.
    #[serde(rename = "type")]
    pub ty: &'static str,
    /// JSON value; `uint256` values are decimal strings.
    pub value: Value,
}

/// The contract call that executes a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedCall {
    /// The transfer being executed.
    pub transfer_id: TransferId,
    /// Chain the call is sent on.
    pub chain_id: ChainId,
    /// Contract address.
    pub target: Address,
    /// Selected execution path.
    pub path: ExecutionPath,
    /// ABI function name.
    pub function_name: &'static str,
    /// Arguments in ABI order.
    pub args: Vec<CallArgument>,
    /// ABI-encoded calldata.
    pub calldata: Bytes,
}

fn arg(name: &'static str, ty: &'static str, value: Value) -> CallArgument {
    CallArgument { name, ty, value }
}

/// Encodes the contract call for `record`.
///
/// The nonce is passed in its 32-byte ABI form whatever its wire form was.
///
/// # Errors
///
/// Returns [`CirclePayError::UnsupportedChain`] when the origin chain, the
/// settlement contract, or the destination chain cannot be resolved.
pub fn plan(
    registry: &ChainRegistry,
    record: &TransferAuthorization,
) -> Result<PreparedCall, CirclePayError> {
    let path = record.path();
    let target = registry.resolve_target(record.chain_id, path)?;
    let value: U256 = record.amount.into();
    let valid_after = U256::from(record.valid_after.as_secs());
    let valid_before = U256::from(record.valid_before.as_secs());
    let nonce = record.nonce.as_b256();
    let signature = record.signature.clone();

    let (function_name, calldata, args) = match path {
        ExecutionPath::SameChain => {
            let call = IEIP3009::transferWithAuthorizationCall {
                from: record.sender,
                to: record.receiver,
                value,
                validAfter: valid_after,
                validBefore: valid_before,
                nonce,
                signature: signature.clone(),
            };
            let args = vec![
                arg("from", "address", json!(record.sender)),
                arg("to", "address", json!(record.receiver)),
                arg("value", "uint256", json!(value.to_string())),
                arg("validAfter", "uint256", json!(valid_after.to_string())),
                arg("validBefore", "uint256", json!(valid_before.to_string())),
                arg("nonce", "bytes32", json!(nonce)),
                arg("signature", "bytes", json!(signature)),
            ];
            ("transferWithAuthorization", call.abi_encode(), args)
        }
        ExecutionPath::CrossChain { destination_chain } => {
            let destination = U256::from(destination_chain);
            let call = ICirclePay::transferUsdcCrossChainCall {
                from: record.sender,
                value,
                validAfter: valid_after,
                validBefore: valid_before,
                nonce,
                signature: signature.clone(),
                destinationChain: destination,
                receiver: record.receiver,
            };
            let args = vec![
                arg("from", "address", json!(record.sender)),
                arg("value", "uint256", json!(value.to_string())),
                arg("validAfter", "uint256", json!(valid_after.to_string())),
                arg("validBefore", "uint256", json!(valid_before.to_string())),
                arg("nonce", "bytes32", json!(nonce)),
                arg("signature", "bytes", json!(signature)),
                arg("destinationChain", "uint256", json!(destination.to_string())),
                arg("receiver", "address", json!(record.receiver)),
            ];
            ("transferUsdcCrossChain", call.abi_encode(), args)
        }
    };

    Ok(PreparedCall {
        transfer_id: record.id,
        chain_id: record.chain_id,
        target,
        path,
        function_name,
        args,
        calldata: calldata.into(),
    })
}

/// How the store took the outcome of a successful on-chain execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconcileOutcome {
    /// This attempt marked the record executed.
    Recorded,
    /// Another sponsor recorded the transfer first.
    AlreadyExecuted,
}

/// Result of a successful execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// The executed transfer.
    pub transfer_id: TransferId,
    /// Hash of the mined transaction.
    pub transaction_hash: TxHash,
    /// The path taken.
    pub path: ExecutionPath,
    /// Final state of the attempt.
    pub state: ExecutionState,
    /// What the store did with the receipt.
    pub outcome: ReconcileOutcome,
}

/// A failed execution attempt and the state it ended in.
///
/// Failures before anything was sent end in [`ExecutionState::Pending`];
/// failures after submission end in [`ExecutionState::Failed`].
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ExecutionError {
    /// Final state of the attempt.
    pub state: ExecutionState,
    /// What went wrong.
    pub error: CirclePayError,
}

impl ExecutionError {
    /// Moves an in-flight attempt to [`ExecutionState::Failed`].
    fn failed(id: TransferId, state: ExecutionState, error: CirclePayError) -> Self {
        let reason = error.to_string();
        #[cfg(feature = "telemetry")]
        tracing::warn!(transfer_id = %id, from = state.name(), %reason, "execution failed");
        #[cfg(not(feature = "telemetry"))]
        let _ = id;
        let state = state
            .fail(reason.clone())
            .unwrap_or(ExecutionState::Failed { reason });
        Self { state, error }
    }
}

impl From<CirclePayError> for ExecutionError {
    fn from(error: CirclePayError) -> Self {
        Self {
            state: ExecutionState::Pending,
            error,
        }
    }
}

impl From<InvalidTransition> for ExecutionError {
    fn from(value: InvalidTransition) -> Self {
        CirclePayError::from(value).into()
    }
}

impl From<ExecutionError> for CirclePayError {
    fn from(value: ExecutionError) -> Self {
        value.error
    }
}

/// Routes stored transfers to the right contract call and reconciles the
/// result.
pub struct ExecutionRouter<C> {
    registry: Arc<ChainRegistry>,
    services: HashMap<ChainId, C>,
    reconciler: ReceiptReconciler,
    confirmation_timeout: Duration,
    confirmations: u64,
}

impl<C> std::fmt::Debug for ExecutionRouter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRouter")
            .field("chains", &self.services.keys().collect::<Vec<_>>())
            .field("confirmation_timeout", &self.confirmation_timeout)
            .finish_non_exhaustive()
    }
}

impl<C: ContractCallService> ExecutionRouter<C> {
    /// Creates a router with no contract-call services.
    #[must_use]
    pub fn new(registry: Arc<ChainRegistry>, reconciler: ReceiptReconciler) -> Self {
        Self {
            registry,
            services: HashMap::new(),
            reconciler,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            confirmations: 1,
        }
    }

    /// Registers the contract-call service for `chain_id`.
    #[must_use]
    pub fn with_service(mut self, chain_id: ChainId, service: C) -> Self {
        self.services.insert(chain_id, service);
        self
    }

    /// Bounds how long a broadcast transaction is waited for.
    #[must_use]
    pub const fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Sets the number of confirmations to wait for.
    #[must_use]
    pub const fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    /// The chain registry.
    #[must_use]
    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// The reconciler, and through it the transfer store.
    #[must_use]
    pub const fn reconciler(&self) -> &ReceiptReconciler {
        &self.reconciler
    }

    /// The contract-call service for `chain_id`.
    #[must_use]
    pub fn service(&self, chain_id: ChainId) -> Option<&C> {
        self.services.get(&chain_id)
    }

    /// The sponsor address that would pay for executions on `chain_id`.
    #[must_use]
    pub fn sponsor(&self, chain_id: ChainId) -> Option<Address> {
        self.service(chain_id).and_then(ContractCallService::sponsor)
    }

    async fn load(&self, id: TransferId) -> Result<TransferAuthorization, CirclePayError> {
        self.reconciler
            .store()
            .find_by_id(id)
            .await?
            .ok_or(CirclePayError::NotFound(id))
    }

    /// Encodes the contract call for transfer `id` without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`CirclePayError::NotFound`] for an unknown ID, or the errors
    /// of [`plan`].
    pub async fn prepare(&self, id: TransferId) -> Result<PreparedCall, CirclePayError> {
        let record = self.load(id).await?;
        plan(&self.registry, &record)
    }

    /// Executes transfer `id` with this service's own sponsor wallet.
    ///
    /// Waiting for the receipt is bounded by the confirmation timeout and
    /// aborted when `cancel` fires. On any failure the record stays pending.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionError`] whose state is `Pending` if nothing was
    /// sent and `Failed` otherwise, wrapping:
    ///
    /// - [`CirclePayError::NotFound`] / [`CirclePayError::AlreadyExecuted`]
    ///   before anything is sent
    /// - [`CirclePayError::UnsupportedChain`] if the call cannot be resolved
    /// - [`CirclePayError::SubmissionFailed`] if the broadcast fails
    /// - [`CirclePayError::ContractReverted`] if the contract rejects the call
    /// - [`CirclePayError::ConfirmationFailed`] on timeout or cancellation
    #[allow(clippy::cognitive_complexity)]
    pub async fn execute(
        &self,
        id: TransferId,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, ExecutionError> {
        let record = self.load(id).await?;
        if record.executed {
            return Err(CirclePayError::AlreadyExecuted(id).into());
        }
        let prepared = plan(&self.registry, &record)?;
        let service = self
            .service(record.chain_id)
            .filter(|s| s.sponsor().is_some())
            .ok_or_else(|| {
                CirclePayError::SubmissionFailed(format!(
                    "no sponsor wallet for chain {}",
                    record.chain_id
                ))
            })?;
        if cancel.is_cancelled() {
            return Err(CirclePayError::SubmissionFailed("execution cancelled".into()).into());
        }

        let state = ExecutionState::Pending.submit(prepared.path)?;
        #[cfg(feature = "telemetry")]
        tracing::info!(
            transfer_id = %id,
            chain_id = record.chain_id,
            path = %prepared.path,
            target = %prepared.target,
            "submitting transfer"
        );
        let submission = service.submit(MetaTransaction {
            to: prepared.target,
            calldata: prepared.calldata.clone(),
            confirmations: self.confirmations,
        });
        let submitted = traced!(
            submission,
            tracing::info_span!("submit_transfer",
                transfer_id = %id,
                function = prepared.function_name,
                otel.kind = "client",
            )
        );
        let pending = match submitted {
            Ok(pending) => pending,
            Err(CallError::Reverted(reason)) => {
                let error = CirclePayError::ContractReverted {
                    transaction: None,
                    reason,
                };
                return Err(ExecutionError::failed(id, state, error));
            }
            Err(other) => {
                let error = CirclePayError::SubmissionFailed(other.to_string());
                return Err(ExecutionError::failed(id, state, error));
            }
        };

        let tx = pending.tx_hash();
        let state = state.submitted(tx)?;
        let confirmed = traced!(
            self.confirm(pending, cancel),
            tracing::info_span!("confirm_transfer", transfer_id = %id, tx = %tx)
        );
        let receipt = match confirmed {
            Ok(receipt) if receipt.transaction_hash == tx => receipt,
            Ok(receipt) => {
                let error = CirclePayError::ConfirmationFailed {
                    transaction: tx,
                    reason: format!("receipt is for {}", receipt.transaction_hash),
                };
                return Err(ExecutionError::failed(id, state, error));
            }
            Err(error) => return Err(ExecutionError::failed(id, state, error)),
        };

        let outcome = match self.reconciler.reconcile(id, &receipt).await {
            Ok(_) => ReconcileOutcome::Recorded,
            Err(CirclePayError::AlreadyExecuted(_)) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(transfer_id = %id, tx = %tx, "transfer was recorded by another sponsor");
                ReconcileOutcome::AlreadyExecuted
            }
            Err(error) => return Err(ExecutionError::failed(id, state, error)),
        };
        let state = state.confirmed(tx)?;

        Ok(ExecutionReport {
            transfer_id: id,
            transaction_hash: tx,
            path: prepared.path,
            state,
            outcome,
        })
    }

    async fn confirm(
        &self,
        pending: C::Pending,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReceipt, CirclePayError> {
        let tx = pending.tx_hash();
        let timeout = self.confirmation_timeout;
        let waiting = tokio::time::timeout(timeout, pending.confirm());
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(CirclePayError::ConfirmationFailed {
                    transaction: tx,
                    reason: "cancelled while waiting for the receipt".into(),
                });
            }
            result = waiting => result,
        };
        match result {
            Err(_) => Err(CirclePayError::ConfirmationFailed {
                transaction: tx,
                reason: format!("no receipt within {}s", timeout.as_secs()),
            }),
            Ok(Err(CallError::Reverted(reason))) => Err(CirclePayError::ContractReverted {
                transaction: Some(tx),
                reason,
            }),
            Ok(Err(e)) => Err(CirclePayError::ConfirmationFailed {
                transaction: tx,
                reason: e.to_string(),
            }),
            Ok(Ok(receipt)) if !receipt.success => Err(CirclePayError::ContractReverted {
                transaction: Some(receipt.transaction_hash),
                reason: "transaction receipt reports failure".into(),
            }),
            Ok(Ok(receipt)) => Ok(receipt),
        }
    }

    /// Records a transaction that a sponsor's own wallet sent.
    ///
    /// When a contract-call service is configured for the record's origin
    /// chain, its receipt is fetched and checked first. Otherwise the report
    /// is trusted.
    ///
    /// # Errors
    ///
    /// - [`CirclePayError::InvalidInput`] if the chain has no receipt for `tx`
    /// - [`CirclePayError::ContractReverted`] if the receipt reports failure
    /// - [`CirclePayError::AlreadyExecuted`] / [`CirclePayError::NotFound`]
    ///   from the store
    pub async fn record_reported(
        &self,
        id: TransferId,
        tx: TxHash,
    ) -> Result<TransferAuthorization, CirclePayError> {
        let record = self.load(id).await?;
        let receipt = match self.service(record.chain_id) {
            Some(service) => service
                .receipt(tx)
                .await
                .map_err(|e| CirclePayError::SubmissionFailed(e.to_string()))?
                .ok_or_else(|| {
                    CirclePayError::InvalidInput(format!(
                        "no receipt for {tx} on chain {}",
                        record.chain_id
                    ))
                })?,
            None => ExecutionReceipt {
                transaction_hash: tx,
                success: true,
                block_number: None,
            },
        };
        self.reconciler.reconcile(id, &receipt).await
    }
}
