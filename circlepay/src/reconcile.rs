//! Reconciliation of on-chain receipts with stored transfers.

use std::sync::Arc;

use crate::error::CirclePayError;
use crate::execution::ExecutionReceipt;
use crate::store::TransferStore;
use crate::transfer::{TransferAuthorization, TransferId};

/// Applies confirmed receipts to the [`TransferStore`].
///
/// A successful receipt marks the record executed. A reverted receipt leaves
/// it pending and surfaces as [`CirclePayError::ContractReverted`]. An already
/// executed record is never rewritten.
#[derive(Clone)]
pub struct ReceiptReconciler {
    store: Arc<dyn TransferStore>,
}

impl std::fmt::Debug for ReceiptReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptReconciler").finish_non_exhaustive()
    }
}

impl ReceiptReconciler {
    /// Creates a reconciler over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TransferStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TransferStore> {
        &self.store
    }

    /// Records the outcome of `receipt` for transfer `id`.
    ///
    /// # Errors
    ///
    /// - [`CirclePayError::ContractReverted`] if the receipt reports failure
    /// - [`CirclePayError::AlreadyExecuted`] if another caller recorded the
    ///   transfer first
    /// - [`CirclePayError::NotFound`] for an unknown ID
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(skip_all, fields(transfer_id = %id, tx = %receipt.transaction_hash))
    )]
    pub async fn reconcile(
        &self,
        id: TransferId,
        receipt: &ExecutionReceipt,
    ) -> Result<TransferAuthorization, CirclePayError> {
        if !receipt.success {
            #[cfg(feature = "telemetry")]
            tracing::warn!("receipt reports revert");
            return Err(CirclePayError::ContractReverted {
                transaction: Some(receipt.transaction_hash),
                reason: "transaction receipt reports failure".into(),
            });
        }
        let record = self
            .store
            .mark_executed(id, receipt.transaction_hash)
            .await?;
        #[cfg(feature = "telemetry")]
        tracing::info!("transfer reconciled");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::TxHash;

    use super::*;
    use crate::store::MemoryTransferStore;
    use crate::transfer::tests::sample_input;

    fn receipt(byte: u8, success: bool) -> ExecutionReceipt {
        ExecutionReceipt {
            transaction_hash: TxHash::repeat_byte(byte),
            success,
            block_number: Some(100),
        }
    }

    #[tokio::test]
    async fn test_success_marks_executed() {
        let store = Arc::new(MemoryTransferStore::new());
        let record = store.create(sample_input()).await.unwrap();
        let reconciler = ReceiptReconciler::new(store.clone());
        let done = reconciler.reconcile(record.id, &receipt(9, true)).await.unwrap();
        assert!(done.executed);
        assert_eq!(done.transaction_hash, Some(TxHash::repeat_byte(9)));
    }

    #[tokio::test]
    async fn test_revert_leaves_record_pending() {
        let store = Arc::new(MemoryTransferStore::new());
        let record = store.create(sample_input()).await.unwrap();
        let reconciler = ReceiptReconciler::new(store.clone());
        let err = reconciler
            .reconcile(record.id, &receipt(9, false))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CirclePayError::ContractReverted { transaction: Some(tx), .. } if tx == TxHash::repeat_byte(9)
        ));
        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert!(!stored.executed);
    }

    #[tokio::test]
    async fn test_executed_record_is_never_undone() {
        let store = Arc::new(MemoryTransferStore::new());
        let record = store.create(sample_input()).await.unwrap();
        let reconciler = ReceiptReconciler::new(store.clone());
        reconciler.reconcile(record.id, &receipt(1, true)).await.unwrap();

        let err = reconciler
            .reconcile(record.id, &receipt(2, true))
            .await
            .unwrap_err();
        assert!(matches!(err, CirclePayError::AlreadyExecuted(_)));
        reconciler
            .reconcile(record.id, &receipt(3, false))
            .await
            .unwrap_err();
        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert!(stored.executed);
        assert_eq!(stored.transaction_hash, Some(TxHash::repeat_byte(1)));
    }
}
