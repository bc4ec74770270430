//! Error responses of the HTTP service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use circlepay::{ChainId, CirclePayError, StoreError};
use circlepay_evm::ExecutionError;

/// Errors returned by route handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A domain error from the core, the store or the router.
    #[error(transparent)]
    Domain(#[from] CirclePayError),

    /// The chain has no sponsor wallet configured.
    #[error("no sponsor wallet is configured for chain {0}")]
    NoSponsor(ChainId),

    /// A looked-up resource other than a transfer does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request is malformed in a way the extractors do not catch.
    #[error("{0}")]
    BadRequest(String),
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        Self::Domain(value.into())
    }
}

impl From<ExecutionError> for ApiError {
    fn from(value: ExecutionError) -> Self {
        tracing::debug!(state = value.state.name(), "execution attempt ended");
        Self::Domain(value.error)
    }
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Domain(e) => match e {
                CirclePayError::InvalidInput(_)
                | CirclePayError::UnsupportedChain(_)
                | CirclePayError::SignatureRejected(_) => StatusCode::BAD_REQUEST,
                CirclePayError::NotFound(_) => StatusCode::NOT_FOUND,
                CirclePayError::AlreadyExecuted(_) => StatusCode::CONFLICT,
                CirclePayError::ContractReverted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                CirclePayError::SubmissionFailed(_) | CirclePayError::ConfirmationFailed { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                CirclePayError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NoSponsor(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::TxHash;
    use circlepay::{ExecutionState, TransferId};

    use super::*;

    #[test]
    fn test_status_mapping() {
        let id = TransferId::new_v4();
        let cases = [
            (ApiError::from(CirclePayError::invalid_input("x")), 400),
            (ApiError::from(CirclePayError::UnsupportedChain(5)), 400),
            (ApiError::from(StoreError::NotFound(id)), 404),
            (ApiError::from(StoreError::AlreadyExecuted(id)), 409),
            (
                ApiError::from(CirclePayError::ContractReverted {
                    transaction: None,
                    reason: "used".into(),
                }),
                422,
            ),
            (
                ApiError::from(CirclePayError::ConfirmationFailed {
                    transaction: TxHash::ZERO,
                    reason: "timeout".into(),
                }),
                502,
            ),
            (ApiError::NoSponsor(84532), 503),
            (
                ApiError::from(ExecutionError {
                    state: ExecutionState::Failed {
                        reason: "rpc down".into(),
                    },
                    error: CirclePayError::SubmissionFailed("rpc down".into()),
                }),
                502,
            ),
            (ApiError::from(StoreError::Backend("disk".into())), 500),
        ];
        for (error, status) in cases {
            assert_eq!(error.status().as_u16(), status, "{error}");
        }
    }
}
