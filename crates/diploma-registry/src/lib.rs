//! Diploma Registry: Key store, signing authority, credential registry,
//! authorization gate and verification protocol.

pub mod authority;
pub mod engine;
pub mod error;
pub mod gate;
pub mod key_store;
pub mod registry;
pub mod store;
pub mod verifier;

pub use authority::{verify_credential_signature, SigningAuthority};
pub use engine::Engine;
pub use error::RegistryError;
pub use gate::{authorize, decide, Decision, Operation};
pub use key_store::{FileKeyBackend, KeyBackend, KeyStore, MemoryKeyBackend, StoredKey};
pub use registry::{CredentialCursor, CredentialList, CredentialRegistry, ListFilter};
pub use store::{CredentialStore, MemoryStore, PageQuery, StoreError};
pub use verifier::CredentialVerifier;
