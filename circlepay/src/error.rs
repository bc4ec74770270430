//! Error taxonomy for authorization, persistence and execution.
//!
//! Every fallible CirclePay operation reports one of the [`CirclePayError`]
//! kinds. The HTTP layer maps each kind to a status code; see
//! `circlepay-server`.

use alloy_primitives::TxHash;

use crate::chain::ChainId;
use crate::transfer::TransferId;

/// Errors raised by CirclePay operations.
#[derive(Debug, thiserror::Error)]
pub enum CirclePayError {
    /// Malformed or missing caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The chain has no known deployment (or lacks the contract required
    /// for the requested path).
    #[error("unsupported chain {0}")]
    UnsupportedChain(ChainId),

    /// The signer refused to sign, or a signature failed verification.
    #[error("signature rejected: {0}")]
    SignatureRejected(String),

    /// The transaction could not be submitted to the network.
    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    /// The contract reverted the call, either during submission or as a
    /// failed receipt.
    #[error("contract reverted{}: {reason}", revert_location(.transaction))]
    ContractReverted {
        /// Transaction hash, when the revert surfaced as a mined receipt.
        transaction: Option<TxHash>,
        /// Revert reason or RPC message.
        reason: String,
    },

    /// The transfer was already marked executed.
    #[error("transfer {0} is already executed")]
    AlreadyExecuted(TransferId),

    /// No transfer with this ID exists.
    #[error("transfer {0} not found")]
    NotFound(TransferId),

    /// A transaction was submitted but its receipt was not observed in time.
    ///
    /// The record stays pending; the transaction may still land.
    #[error("confirmation of {transaction} failed: {reason}")]
    ConfirmationFailed {
        /// Hash of the submitted transaction.
        transaction: TxHash,
        /// Why confirmation did not complete.
        reason: String,
    },

    /// The persistence backend failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

fn revert_location(transaction: &Option<TxHash>) -> String {
    transaction.map(|tx| format!(" in {tx}")).unwrap_or_default()
}

impl CirclePayError {
    /// Shorthand for [`CirclePayError::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Whether retrying the same operation later could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SubmissionFailed(_) | Self::ConfirmationFailed { .. } | Self::Storage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_message_includes_hash_when_known() {
        let err = CirclePayError::ContractReverted {
            transaction: Some(TxHash::repeat_byte(0xab)),
            reason: "status 0".into(),
        };
        let text = err.to_string();
        assert!(text.starts_with("contract reverted in 0xabab"));
        assert!(text.ends_with(": status 0"));

        let err = CirclePayError::ContractReverted {
            transaction: None,
            reason: "authorization is used".into(),
        };
        assert_eq!(err.to_string(), "contract reverted: authorization is used");
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(CirclePayError::SubmissionFailed("rpc down".into()).is_retryable());
        assert!(!CirclePayError::UnsupportedChain(999).is_retryable());
        assert!(!CirclePayError::invalid_input("amount").is_retryable());
    }
}
