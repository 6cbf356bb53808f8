//! Shared fixtures for the cross-crate tests.

use std::path::PathBuf;
use std::sync::Arc;

use diploma_core::{Claims, Credential, EngineConfig};
use diploma_registry::{Engine, FileKeyBackend, KeyStore, MemoryKeyBackend, MemoryStore};

/// An engine over an in-memory store with a freshly generated key.
pub fn memory_engine() -> Engine {
    let keypair = KeyStore::new(MemoryKeyBackend::new())
        .load_or_create()
        .expect("in-memory key creation cannot fail");
    Engine::new(keypair, Arc::new(MemoryStore::new()), EngineConfig::default())
}

/// An engine whose key lives in `key_path`, sharing `store` with other
/// engines built the same way.
pub fn file_engine(key_path: &PathBuf, store: Arc<MemoryStore>) -> Engine {
    let keypair = KeyStore::new(FileKeyBackend::new(key_path))
        .load_or_create()
        .expect("key file must be usable");
    Engine::new(keypair, store, EngineConfig::default())
}

pub fn registrar() -> Claims {
    Claims::issuer("registrar")
}

/// The JSON a holder would present for verification.
pub fn presented(credential: &Credential) -> serde_json::Value {
    serde_json::to_value(credential).expect("credential always serializes")
}

/// A unique scratch directory under the system temp dir.
pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("diploma-{}-{}", label, rand::random::<u64>()));
    tracing::debug!(path = %dir.display(), "scratch directory");
    dir
}
