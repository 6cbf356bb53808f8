//! Persistence seam for credential records.
//!
//! The registry only needs a keyed collection with two single-document
//! atomic writes: create-if-absent and set-revoked. Backends must serialize
//! concurrent writes to the same id and must never expose a half-written
//! record to readers.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use diploma_core::{Credential, CredentialId};

/// Transient failure talking to the backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("store operation timed out after {0} ms")]
    Timeout(u64),
}

/// One page of a key-ordered listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// Resume strictly after this id; `None` starts from the first key.
    pub after: Option<CredentialId>,
    /// Only records whose `subject_name` equals this.
    pub owner: Option<String>,
    pub limit: usize,
}

impl PageQuery {
    fn admits(&self, credential: &Credential) -> bool {
        self.after.as_ref().map_or(true, |after| credential.id > *after)
            && self
                .owner
                .as_deref()
                .map_or(true, |owner| credential.is_owned_by(owner))
    }
}

/// Keyed collection of signed credential records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a record unless one with the same id exists.
    ///
    /// Returns `false`, leaving the existing record untouched, on collision.
    async fn insert_new(&self, credential: &Credential) -> Result<bool, StoreError>;

    /// Fetch a record by id.
    async fn get(&self, id: &CredentialId) -> Result<Option<Credential>, StoreError>;

    /// Up to `query.limit` matching records, ordered by id.
    ///
    /// A page shorter than the limit means the listing is exhausted.
    async fn list_page(&self, query: &PageQuery) -> Result<Vec<Credential>, StoreError>;

    /// Set the revoked flag. Returns `false` if no record has this id.
    async fn set_revoked(&self, id: &CredentialId) -> Result<bool, StoreError>;
}

/// In-memory store, for tests and ephemeral nodes.
#[derive(Default)]
pub struct MemoryStore {
    credentials: DashMap<CredentialId, Credential>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_new(&self, credential: &Credential) -> Result<bool, StoreError> {
        match self.credentials.entry(credential.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(credential.clone());
                Ok(true)
            }
        }
    }

    async fn get(&self, id: &CredentialId) -> Result<Option<Credential>, StoreError> {
        Ok(self.credentials.get(id).map(|e| e.value().clone()))
    }

    async fn list_page(&self, query: &PageQuery) -> Result<Vec<Credential>, StoreError> {
        let mut ids: Vec<CredentialId> = self
            .credentials
            .iter()
            .filter(|e| query.admits(e.value()))
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids.truncate(query.limit);
        // Records admitted above are never removed, only flagged.
        Ok(ids
            .iter()
            .filter_map(|id| self.credentials.get(id).map(|e| e.value().clone()))
            .collect())
    }

    async fn set_revoked(&self, id: &CredentialId) -> Result<bool, StoreError> {
        match self.credentials.get_mut(id) {
            Some(mut entry) => {
                entry.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
