use diploma_core::CredentialId;

/// Engine errors.
///
/// Verification outcomes (unknown, revoked, bad signature) are not errors;
/// they are reported as a [`diploma_core::Verdict`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("credential not found: {0}")]
    NotFound(CredentialId),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("could not allocate a unique credential id after {0} attempts")]
    IdCollision(u32),

    /// The insert outlived the store timeout and may still land. Retrying
    /// would risk a second record; look the id up instead.
    #[error("issuance of credential {0} not confirmed before timeout")]
    IssueUnconfirmed(CredentialId),

    #[error("crypto error: {0}")]
    Crypto(#[from] diploma_crypto::CryptoError),

    #[error("core error: {0}")]
    Core(#[from] diploma_core::CoreError),
}

impl RegistryError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::IdCollision(_))
    }
}

impl From<crate::store::StoreError> for RegistryError {
    fn from(e: crate::store::StoreError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}
