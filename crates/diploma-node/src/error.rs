//! HTTP error type for the node API.
//!
//! Maps engine errors to status codes with a JSON body of the form
//! `{"error": {"code": "...", "message": "..."}}`. Internal details are
//! logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use diploma_registry::RegistryError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code, e.g. `NOT_FOUND`.
    pub code: String,
    pub message: String,
    /// Set for transient failures the client may retry.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retriable: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The request may have taken effect; the message names what to check.
    #[error("pending: {0}")]
    Pending(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Pending(_) => (StatusCode::GATEWAY_TIMEOUT, "ISSUANCE_PENDING"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) | Self::Pending(_) => {
                tracing::warn!(error = %self, "request not completed")
            }
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                retriable: matches!(self, Self::ServiceUnavailable(_)),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => Self::NotFound(format!("credential {}", id)),
            RegistryError::Forbidden(reason) => Self::Forbidden(reason),
            RegistryError::InvalidInput(reason) => Self::Validation(reason),
            e @ (RegistryError::StoreUnavailable(_) | RegistryError::IdCollision(_)) => {
                Self::ServiceUnavailable(e.to_string())
            }
            RegistryError::IssueUnconfirmed(id) => Self::Pending(format!(
                "credential {} may still be stored; fetch it before issuing again",
                id
            )),
            e @ (RegistryError::KeyUnavailable(_)
            | RegistryError::Crypto(_)
            | RegistryError::Core(_)) => Self::Internal(e.to_string()),
        }
    }
}
