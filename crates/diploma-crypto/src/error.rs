/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("password hashing failed: {0}")]
    PasswordHashError(String),

    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
