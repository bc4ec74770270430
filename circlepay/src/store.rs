//! The Pending-Transfer Store contract.
//!
//! A [`TransferStore`] persists signed authorizations until a sponsor executes
//! them. The only mutation after creation is [`TransferStore::mark_executed`],
//! which must behave as an atomic compare-and-set on the `executed` flag: of
//! two racing callers for the same record, exactly one succeeds and the other
//! observes [`StoreError::AlreadyExecuted`].
//!
//! [`MemoryTransferStore`] is the in-process backend; the SQLite backend lives
//! in `circlepay-store`.

mod memory;

pub use memory::{MemoryCampaignStore, MemoryTransferStore};

use alloy_primitives::TxHash;
use async_trait::async_trait;

use crate::error::CirclePayError;
use crate::transfer::{NewTransfer, TransferAuthorization, TransferFilter, TransferId};

/// Errors reported by store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Input failed validation; the message names the offending field.
    #[error("{0}")]
    Validation(String),
    /// No record with this ID.
    #[error("transfer {0} not found")]
    NotFound(TransferId),
    /// The record was already executed.
    #[error("transfer {0} is already executed")]
    AlreadyExecuted(TransferId),
    /// The backend itself failed.
    #[error("{0}")]
    Backend(String),
}

impl From<StoreError> for CirclePayError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(m) => Self::InvalidInput(m),
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::AlreadyExecuted(id) => Self::AlreadyExecuted(id),
            StoreError::Backend(m) => Self::Storage(m),
        }
    }
}

/// Persistence for transfer authorizations.
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Validates and persists a new pending record, assigning its ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if a required field is missing.
    async fn create(&self, input: NewTransfer) -> Result<TransferAuthorization, StoreError>;

    /// Looks up a single record.
    async fn find_by_id(&self, id: TransferId)
    -> Result<Option<TransferAuthorization>, StoreError>;

    /// Returns all records matching every set criterion of `filter`,
    /// oldest first.
    async fn query(&self, filter: &TransferFilter)
    -> Result<Vec<TransferAuthorization>, StoreError>;

    /// Atomically flips `executed` from `false` to `true` and records the hash.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown ID and
    /// [`StoreError::AlreadyExecuted`] if the record was executed before; in
    /// the latter case the stored hash is left untouched.
    async fn mark_executed(
        &self,
        id: TransferId,
        transaction_hash: TxHash,
    ) -> Result<TransferAuthorization, StoreError>;
}

#[async_trait]
impl<T: TransferStore + ?Sized> TransferStore for std::sync::Arc<T> {
    async fn create(&self, input: NewTransfer) -> Result<TransferAuthorization, StoreError> {
        (**self).create(input).await
    }

    async fn find_by_id(
        &self,
        id: TransferId,
    ) -> Result<Option<TransferAuthorization>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn query(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<TransferAuthorization>, StoreError> {
        (**self).query(filter).await
    }

    async fn mark_executed(
        &self,
        id: TransferId,
        transaction_hash: TxHash,
    ) -> Result<TransferAuthorization, StoreError> {
        (**self).mark_executed(id, transaction_hash).await
    }
}
