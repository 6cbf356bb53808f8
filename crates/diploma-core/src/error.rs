use crate::credential_state::VerificationState;

/// Core domain errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid verification transition from {from} on {event}")]
    InvalidStateTransition {
        from: VerificationState,
        event: String,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("invalid credential id: {0}")]
    InvalidCredentialId(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
