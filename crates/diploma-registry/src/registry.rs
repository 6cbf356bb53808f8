use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

use diploma_core::types::{normalize_timestamp, validate_field};
use diploma_core::{Credential, CredentialId, CredentialSummary, EngineConfig};
use diploma_crypto::SignableFields;

use crate::authority::SigningAuthority;
use crate::error::RegistryError;
use crate::store::{CredentialStore, PageQuery, StoreError};

/// Which credentials a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    All,
    OwnedBy(String),
}

impl ListFilter {
    fn owner(&self) -> Option<String> {
        match self {
            Self::All => None,
            Self::OwnedBy(subject) => Some(subject.clone()),
        }
    }
}

/// A fully collected listing, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialList {
    items: Vec<Credential>,
}

impl CredentialList {
    pub fn iter(&self) -> std::slice::Iter<'_, Credential> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn summaries(&self) -> Vec<CredentialSummary> {
        self.items.iter().map(Credential::summary).collect()
    }

    pub fn into_vec(self) -> Vec<Credential> {
        self.items
    }
}

impl IntoIterator for CredentialList {
    type Item = Credential;
    type IntoIter = std::vec::IntoIter<Credential>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a CredentialList {
    type Item = &'a Credential;
    type IntoIter = std::slice::Iter<'a, Credential>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Lazy, key-ordered walk over a listing.
///
/// Nothing is read until [`next`](Self::next) is first awaited; records are
/// then pulled from the store one page at a time. [`restart`](Self::restart)
/// rewinds to the first key. Records are never deleted, so a restarted walk
/// yields every record the first walk did, in the same order.
pub struct CredentialCursor {
    registry: CredentialRegistry,
    filter: ListFilter,
    after: Option<CredentialId>,
    buffer: VecDeque<Credential>,
    exhausted: bool,
}

impl CredentialCursor {
    fn new(registry: CredentialRegistry, filter: ListFilter) -> Self {
        Self {
            registry,
            filter,
            after: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    /// The next record, or `None` once the listing is exhausted.
    pub async fn next(&mut self) -> Result<Option<Credential>, RegistryError> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.buffer.pop_front())
    }

    pub fn restart(&mut self) {
        self.after = None;
        self.buffer.clear();
        self.exhausted = false;
    }

    /// Drain the remaining records into a [`CredentialList`].
    pub async fn collect_all(mut self) -> Result<CredentialList, RegistryError> {
        let mut items = Vec::new();
        while let Some(credential) = self.next().await? {
            items.push(credential);
        }
        Ok(CredentialList { items })
    }

    async fn fetch_page(&mut self) -> Result<(), RegistryError> {
        let limit = self.registry.config.list_page_size.max(1);
        let query = PageQuery {
            after: self.after.clone(),
            owner: self.filter.owner(),
            limit,
        };
        let page = self
            .registry
            .bounded(self.registry.store.list_page(&query))
            .await?;
        self.exhausted = page.len() < limit;
        if let Some(last) = page.last() {
            self.after = Some(last.id.clone());
        }
        self.buffer.extend(page);
        Ok(())
    }
}

/// Lifecycle of credential records: create, read, list and revoke.
///
/// Records are never deleted and, once written, only their `revoked` flag
/// ever changes.
#[derive(Clone)]
pub struct CredentialRegistry {
    store: Arc<dyn CredentialStore>,
    authority: SigningAuthority,
    config: EngineConfig,
}

impl CredentialRegistry {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        authority: SigningAuthority,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            authority,
            config,
        }
    }

    pub fn authority(&self) -> &SigningAuthority {
        &self.authority
    }

    /// Sign and persist a new credential under a fresh id.
    ///
    /// The returned record is exactly what was stored.
    pub async fn issue(
        &self,
        subject_name: &str,
        credential_title: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<Credential, RegistryError> {
        validate_field("subject_name", subject_name)
            .and_then(|_| validate_field("credential_title", credential_title))
            .map_err(|e| RegistryError::InvalidInput(e.to_string()))?;

        let issued_at = normalize_timestamp(issued_at);
        let attempts = self.config.id_attempts.max(1);

        for attempt in 1..=attempts {
            let id = CredentialId::generate();
            let signature = self.authority.sign_fields(&SignableFields::new(
                id.as_str(),
                subject_name,
                credential_title,
                issued_at,
            ))?;
            let credential = Credential {
                id,
                subject_name: subject_name.to_string(),
                credential_title: credential_title.to_string(),
                issued_at,
                revoked: false,
                signature,
            };

            if self.insert_confirmed(&credential).await? {
                tracing::info!(
                    credential_id = %credential.id,
                    subject = %credential.subject_name,
                    title = %credential.credential_title,
                    "credential issued"
                );
                return Ok(credential);
            }
            tracing::warn!(credential_id = %credential.id, attempt, "credential id collision");
        }

        Err(RegistryError::IdCollision(attempts))
    }

    pub async fn get(&self, id: &CredentialId) -> Result<Credential, RegistryError> {
        self.lookup(id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Like [`get`](Self::get), but a miss is `None` rather than an error.
    pub async fn lookup(&self, id: &CredentialId) -> Result<Option<Credential>, RegistryError> {
        self.bounded(self.store.get(id)).await
    }

    /// Start a lazy listing. No store round trip happens until the cursor
    /// is first advanced.
    pub fn list(&self, filter: ListFilter) -> CredentialCursor {
        CredentialCursor::new(self.clone(), filter)
    }

    /// Mark a credential revoked. Revoking twice is not an error.
    pub async fn revoke(&self, id: &CredentialId) -> Result<(), RegistryError> {
        if !self.bounded(self.store.set_revoked(id)).await? {
            return Err(RegistryError::NotFound(id.clone()));
        }
        tracing::info!(credential_id = %id, "credential revoked");
        Ok(())
    }

    /// Insert a new record, resolving the outcome even when the store is slow.
    ///
    /// The write runs on its own task so a timeout cannot abandon it half
    /// way. If it has not finished in time and a follow-up read does not
    /// find the record, the caller gets [`RegistryError::IssueUnconfirmed`]
    /// carrying the id, never a plain retriable error.
    async fn insert_confirmed(&self, credential: &Credential) -> Result<bool, RegistryError> {
        let store = Arc::clone(&self.store);
        let record = credential.clone();
        let mut write = tokio::spawn(async move { store.insert_new(&record).await });

        match tokio::time::timeout(self.config.store_timeout(), &mut write).await {
            Ok(Ok(result)) => result.map_err(|e| {
                tracing::warn!(error = %e, "credential store error");
                RegistryError::from(e)
            }),
            Ok(Err(e)) => Err(StoreError::Backend(format!("insert task failed: {}", e)).into()),
            Err(_) => {
                tracing::warn!(
                    credential_id = %credential.id,
                    timeout_ms = self.config.store_timeout_ms,
                    "credential insert still pending after timeout"
                );
                watch_late_write(credential.id.clone(), write);
                match self.lookup(&credential.id).await {
                    Ok(Some(stored)) if stored == *credential => Ok(true),
                    _ => Err(RegistryError::IssueUnconfirmed(credential.id.clone())),
                }
            }
        }
    }

    /// Run one store round trip under the configured I/O timeout.
    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, RegistryError> {
        match tokio::time::timeout(self.config.store_timeout(), op).await {
            Ok(result) => result.map_err(|e| {
                tracing::warn!(error = %e, "credential store error");
                RegistryError::from(e)
            }),
            Err(_) => {
                tracing::warn!(timeout_ms = self.config.store_timeout_ms, "credential store timed out");
                Err(StoreError::Timeout(self.config.store_timeout_ms).into())
            }
        }
    }
}

/// Log how an insert that outlived its timeout eventually ended.
fn watch_late_write(id: CredentialId, write: JoinHandle<Result<bool, StoreError>>) {
    tokio::spawn(async move {
        match write.await {
            Ok(Ok(true)) => tracing::info!(credential_id = %id, "pending credential insert landed"),
            Ok(Ok(false)) => tracing::warn!(credential_id = %id, "pending credential insert collided"),
            Ok(Err(e)) => tracing::warn!(credential_id = %id, error = %e, "pending credential insert failed"),
            Err(e) => tracing::warn!(credential_id = %id, error = %e, "pending credential insert aborted"),
        }
    });
}
