//! Execution path selection and the per-execution state machine.
//!
//! A pending transfer is executed along one of two paths:
//!
//! - **same-chain**: the origin chain's USDC contract is called directly with
//!   `transferWithAuthorization`
//! - **cross-chain**: the origin chain's settlement contract is called with
//!   `transferUsdcCrossChain`, which pulls the funds and bridges them to the
//!   destination chain
//!
//! Each execution attempt walks [`ExecutionState`]:
//!
//! ```text
//! Pending ──► Submitting ──► Confirming ──► Executed
//!                 │               │
//!                 └──► Failed ◄───┘
//! ```

use std::fmt;

use alloy_primitives::TxHash;
use serde::{Deserialize, Serialize};

use crate::chain::ChainId;

/// How a transfer reaches its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExecutionPath {
    /// Origin and destination chains are the same.
    SameChain,
    /// Funds are bridged from the origin to `destination_chain`.
    #[serde(rename_all = "camelCase")]
    CrossChain {
        /// The chain that credits the receiver.
        destination_chain: ChainId,
    },
}

impl ExecutionPath {
    /// Selects the path for a transfer from `origin` to `destination`.
    #[must_use]
    pub const fn select(origin: ChainId, destination: ChainId) -> Self {
        if origin == destination {
            Self::SameChain
        } else {
            Self::CrossChain {
                destination_chain: destination,
            }
        }
    }

    /// Whether the path bridges to another chain.
    #[must_use]
    pub const fn is_cross_chain(&self) -> bool {
        matches!(self, Self::CrossChain { .. })
    }
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameChain => f.write_str("same-chain"),
            Self::CrossChain { destination_chain } => {
                write!(f, "cross-chain to {destination_chain}")
            }
        }
    }
}

/// Outcome of a mined transaction, as reported by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    /// Hash of the mined transaction.
    pub transaction_hash: TxHash,
    /// `true` if the transaction succeeded, `false` if it reverted.
    pub success: bool,
    /// Block the transaction was included in, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

/// State of a single execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ExecutionState {
    /// Nothing has been sent yet.
    Pending,
    /// A call along `path` is being submitted.
    Submitting {
        /// The chosen path.
        path: ExecutionPath,
    },
    /// The transaction was accepted by the node and is awaiting its receipt.
    #[serde(rename_all = "camelCase")]
    Confirming {
        /// Hash of the submitted transaction.
        transaction_hash: TxHash,
    },
    /// The receipt reported success and the store was updated.
    #[serde(rename_all = "camelCase")]
    Executed {
        /// Hash of the executing transaction.
        transaction_hash: TxHash,
    },
    /// The attempt ended without executing the transfer.
    Failed {
        /// Why the attempt failed.
        reason: String,
    },
}

/// An [`ExecutionState`] transition that the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move from {from} to {to}")]
pub struct InvalidTransition {
    /// Name of the current state.
    pub from: &'static str,
    /// Name of the requested state.
    pub to: &'static str,
}

impl From<InvalidTransition> for crate::CirclePayError {
    fn from(value: InvalidTransition) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

impl ExecutionState {
    /// Short name of the state, for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitting { .. } => "submitting",
            Self::Confirming { .. } => "confirming",
            Self::Executed { .. } => "executed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed { .. } | Self::Failed { .. })
    }

    fn reject(&self, to: &'static str) -> InvalidTransition {
        InvalidTransition {
            from: self.name(),
            to,
        }
    }

    /// `Pending → Submitting`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] from any other state.
    pub fn submit(self, path: ExecutionPath) -> Result<Self, InvalidTransition> {
        match self {
            Self::Pending => Ok(Self::Submitting { path }),
            other => Err(other.reject("submitting")),
        }
    }

    /// `Submitting → Confirming`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] from any other state.
    pub fn submitted(self, transaction_hash: TxHash) -> Result<Self, InvalidTransition> {
        match self {
            Self::Submitting { .. } => Ok(Self::Confirming { transaction_hash }),
            other => Err(other.reject("confirming")),
        }
    }

    /// `Confirming → Executed`, for the transaction being confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] from any other state, or if the hash
    /// differs from the one being confirmed.
    pub fn confirmed(self, transaction_hash: TxHash) -> Result<Self, InvalidTransition> {
        match self {
            Self::Confirming {
                transaction_hash: pending,
            } if pending == transaction_hash => Ok(Self::Executed { transaction_hash }),
            other => Err(other.reject("executed")),
        }
    }

    /// `Submitting | Confirming → Failed`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] from any other state.
    pub fn fail(self, reason: impl Into<String>) -> Result<Self, InvalidTransition> {
        match self {
            Self::Submitting { .. } | Self::Confirming { .. } => Ok(Self::Failed {
                reason: reason.into(),
            }),
            other => Err(other.reject("failed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_selection() {
        assert_eq!(ExecutionPath::select(84532, 84532), ExecutionPath::SameChain);
        assert_eq!(
            ExecutionPath::select(84532, 11_155_420),
            ExecutionPath::CrossChain {
                destination_chain: 11_155_420
            }
        );
        assert!(ExecutionPath::select(1, 10).is_cross_chain());
    }

    #[test]
    fn test_happy_path_transitions() {
        let tx = TxHash::repeat_byte(7);
        let state = ExecutionState::Pending
            .submit(ExecutionPath::SameChain)
            .and_then(|s| s.submitted(tx))
            .and_then(|s| s.confirmed(tx))
            .unwrap();
        assert_eq!(state, ExecutionState::Executed { transaction_hash: tx });
        assert!(state.is_terminal());
    }

    #[test]
    fn test_failure_only_after_submission() {
        let err = ExecutionState::Pending.fail("boom").unwrap_err();
        assert_eq!(err.from, "pending");
        let failed = ExecutionState::Pending
            .submit(ExecutionPath::SameChain)
            .unwrap()
            .fail("rpc unavailable")
            .unwrap();
        assert!(failed.is_terminal());
        assert!(failed.submit(ExecutionPath::SameChain).is_err());
    }

    #[test]
    fn test_confirmation_requires_matching_hash() {
        let state = ExecutionState::Confirming {
            transaction_hash: TxHash::repeat_byte(1),
        };
        assert!(state.confirmed(TxHash::repeat_byte(2)).is_err());
    }

    #[test]
    fn test_executed_cannot_move() {
        let tx = TxHash::repeat_byte(3);
        let state = ExecutionState::Executed { transaction_hash: tx };
        assert!(state.clone().fail("late").is_err());
        assert!(state.submitted(tx).is_err());
    }
}
