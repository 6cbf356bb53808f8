//! Persistence of the single issuing keypair.
//!
//! The keypair is created exactly once and loaded unchanged on every start.
//! A persisted key that cannot be read back is fatal: regenerating it would
//! silently invalidate every credential ever issued.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use diploma_crypto::KeyPair;

use crate::error::RegistryError;

const ALGORITHM: &str = "ed25519";

/// On-disk form of the keypair. Both halves are kept so that a mismatch
/// between them is detected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKey {
    pub algorithm: String,
    pub public_key: String,
    pub private_key: String,
}

impl StoredKey {
    fn from_keypair(keypair: &KeyPair) -> Self {
        Self {
            algorithm: ALGORITHM.into(),
            public_key: keypair.public_key().to_hex(),
            private_key: keypair.secret_hex(),
        }
    }

    /// Decode and cross-check both halves.
    fn to_keypair(&self) -> Result<KeyPair, RegistryError> {
        if self.algorithm != ALGORITHM {
            return Err(RegistryError::KeyUnavailable(format!(
                "unsupported key algorithm '{}'",
                self.algorithm
            )));
        }
        let keypair = KeyPair::from_secret_hex(&self.private_key)
            .map_err(|e| RegistryError::KeyUnavailable(format!("corrupt private key: {}", e)))?;
        if keypair.public_key().to_hex() != self.public_key.trim().to_ascii_lowercase() {
            return Err(RegistryError::KeyUnavailable(
                "public key does not match private key".into(),
            ));
        }
        Ok(keypair)
    }
}

/// Where the keypair lives.
pub trait KeyBackend: Send + Sync {
    /// Read the persisted key, if any.
    fn load(&self) -> Result<Option<StoredKey>, RegistryError>;

    /// Persist `key` only if nothing is persisted yet. Returns `false` if
    /// another writer got there first.
    fn create_if_absent(&self, key: &StoredKey) -> Result<bool, RegistryError>;
}

/// Keypair stored as a JSON file.
///
/// Creation writes a private temporary file and hard-links it into place,
/// which fails if the target already exists. Two processes racing on first
/// boot therefore end up trusting the same key, and readers never observe a
/// partially written file.
pub struct FileKeyBackend {
    path: PathBuf,
}

impl FileKeyBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        file.write_all(contents)?;
        file.sync_all()
    }
}

impl KeyBackend for FileKeyBackend {
    fn load(&self) -> Result<Option<StoredKey>, RegistryError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RegistryError::KeyUnavailable(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        let key = serde_json::from_str(&contents).map_err(|e| {
            RegistryError::KeyUnavailable(format!("corrupt key file {}: {}", self.path.display(), e))
        })?;
        Ok(Some(key))
    }

    fn create_if_absent(&self, key: &StoredKey) -> Result<bool, RegistryError> {
        let io_err = |e: std::io::Error| {
            RegistryError::KeyUnavailable(format!("cannot write {}: {}", self.path.display(), e))
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let contents = serde_json::to_vec_pretty(key)
            .map_err(|e| RegistryError::KeyUnavailable(e.to_string()))?;
        // Unique per generated key, so concurrent creators never share it.
        let tmp = self
            .path
            .with_extension(format!("tmp-{}", key.public_key.chars().take(16).collect::<String>()));
        Self::write_private(&tmp, &contents).map_err(io_err)?;

        let linked = std::fs::hard_link(&tmp, &self.path);
        let _ = std::fs::remove_file(&tmp);
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_err(e)),
        }
    }
}

/// Keypair held in memory only.
#[derive(Default)]
pub struct MemoryKeyBackend {
    slot: Mutex<Option<StoredKey>>,
}

impl MemoryKeyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the backend with an existing record.
    pub fn with_key(key: StoredKey) -> Self {
        Self {
            slot: Mutex::new(Some(key)),
        }
    }
}

impl KeyBackend for MemoryKeyBackend {
    fn load(&self) -> Result<Option<StoredKey>, RegistryError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| RegistryError::KeyUnavailable("key slot lock poisoned".into()))?;
        Ok(slot.clone())
    }

    fn create_if_absent(&self, key: &StoredKey) -> Result<bool, RegistryError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| RegistryError::KeyUnavailable("key slot lock poisoned".into()))?;
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(key.clone());
        Ok(true)
    }
}

/// Owner of the issuing keypair.
pub struct KeyStore<B: KeyBackend> {
    backend: B,
}

impl<B: KeyBackend> KeyStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load the persisted keypair, creating and persisting one on first use.
    ///
    /// Call once during bootstrap, before serving requests.
    pub fn load_or_create(&self) -> Result<Arc<KeyPair>, RegistryError> {
        if let Some(stored) = self.backend.load()? {
            let keypair = stored.to_keypair()?;
            tracing::info!(public_key = %stored.public_key, "loaded issuing keypair");
            return Ok(Arc::new(keypair));
        }

        let fresh = KeyPair::generate();
        let stored = StoredKey::from_keypair(&fresh);
        if self.backend.create_if_absent(&stored)? {
            tracing::info!(public_key = %stored.public_key, "generated and persisted issuing keypair");
            return Ok(Arc::new(fresh));
        }

        // Lost a first-boot race: trust whatever the winner persisted.
        let winner = self.backend.load()?.ok_or_else(|| {
            RegistryError::KeyUnavailable("keypair vanished after concurrent creation".into())
        })?;
        let keypair = winner.to_keypair()?;
        tracing::info!(public_key = %winner.public_key, "loaded keypair created concurrently");
        Ok(Arc::new(keypair))
    }
}
