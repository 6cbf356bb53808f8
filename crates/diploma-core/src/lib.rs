//! Diploma Core: Fundamental types, errors, and configuration shared by the
//! credential issuance, signing and verification engine.

pub mod config;
pub mod credential_state;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use credential_state::{
    Verdict, VerificationEvent, VerificationState, VerificationStateMachine,
};
pub use error::CoreError;
pub use types::{Claims, Credential, CredentialId, CredentialSummary, Principal, Role};
