//! RocksDB storage backend for the diploma node.

use anyhow::Result;
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};
use std::path::Path;
use std::sync::{Arc, Mutex};

use diploma_core::{Credential, CredentialId, Principal};
use diploma_registry::{CredentialStore, PageQuery, StoreError};

/// Column family names for different data types.
const CF_CREDENTIALS: &str = "credentials";
const CF_PRINCIPALS: &str = "principals";

/// RocksDB-backed storage for the diploma node.
///
/// Read-modify-write sequences (create-if-absent, revoke) hold `write_lock`
/// so that each behaves as a single atomic document update.
pub struct Storage {
    db: DB,
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_CREDENTIALS, Options::default()),
            ColumnFamilyDescriptor::new(CF_PRINCIPALS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let cf = self.cf(cf_name)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn cf(&self, cf_name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::Backend(format!("column family '{}' not found", cf_name)))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Backend("write lock poisoned".into()))
    }

    /// Insert a document unless the key is taken.
    fn put_if_absent(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        let _guard = self.lock()?;
        if self.get(cf_name, key)?.is_some() {
            return Ok(false);
        }
        self.put(cf_name, key, value)?;
        Ok(true)
    }

    // --- Credentials ---

    pub fn insert_credential(&self, credential: &Credential) -> Result<bool, StoreError> {
        let data = encode(credential)?;
        self.put_if_absent(CF_CREDENTIALS, credential.id.as_str().as_bytes(), &data)
    }

    pub fn get_credential(&self, id: &CredentialId) -> Result<Option<Credential>, StoreError> {
        self.get(CF_CREDENTIALS, id.as_str().as_bytes())?
            .map(|bytes| decode(id.as_str(), &bytes))
            .transpose()
    }

    /// One page of credentials in key order, seeking straight to the
    /// resume point.
    pub fn list_credentials_page(&self, query: &PageQuery) -> Result<Vec<Credential>, StoreError> {
        let cf = self.cf(CF_CREDENTIALS)?;
        let mode = match &query.after {
            Some(after) => IteratorMode::From(after.as_str().as_bytes(), Direction::Forward),
            None => IteratorMode::Start,
        };
        let after = query.after.as_ref().map(|id| id.as_str().as_bytes());

        let mut page = Vec::new();
        for item in self.db.iterator_cf(&cf, mode) {
            if page.len() >= query.limit {
                break;
            }
            let (key, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            if after == Some(&key[..]) {
                continue;
            }
            let credential: Credential = decode(&String::from_utf8_lossy(&key), &value)?;
            if query
                .owner
                .as_deref()
                .map_or(true, |owner| credential.is_owned_by(owner))
            {
                page.push(credential);
            }
        }
        Ok(page)
    }

    pub fn revoke_credential(&self, id: &CredentialId) -> Result<bool, StoreError> {
        let _guard = self.lock()?;
        let Some(mut credential) = self.get_credential(id)? else {
            return Ok(false);
        };
        if !credential.revoked {
            credential.revoked = true;
            self.put(CF_CREDENTIALS, id.as_str().as_bytes(), &encode(&credential)?)?;
        }
        Ok(true)
    }

    // --- Principals ---

    pub fn insert_principal(&self, principal: &Principal) -> Result<bool, StoreError> {
        let data = encode(principal)?;
        self.put_if_absent(CF_PRINCIPALS, principal.username.as_bytes(), &data)
    }

    pub fn get_principal(&self, username: &str) -> Result<Option<Principal>, StoreError> {
        self.get(CF_PRINCIPALS, username.as_bytes())?
            .map(|bytes| decode(username, &bytes))
            .transpose()
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Backend(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// [`CredentialStore`] over [`Storage`]; blocking RocksDB calls run on the
/// blocking thread pool.
#[derive(Clone)]
pub struct RocksStore {
    storage: Arc<Storage>,
}

impl RocksStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> Result<T, StoreError> + Send + 'static,
    {
        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || f(&storage))
            .await
            .map_err(|e| StoreError::Backend(format!("storage task failed: {}", e)))?
    }
}

#[async_trait]
impl CredentialStore for RocksStore {
    async fn insert_new(&self, credential: &Credential) -> Result<bool, StoreError> {
        let credential = credential.clone();
        self.blocking(move |s| s.insert_credential(&credential))
            .await
    }

    async fn get(&self, id: &CredentialId) -> Result<Option<Credential>, StoreError> {
        let id = id.clone();
        self.blocking(move |s| s.get_credential(&id)).await
    }

    async fn list_page(&self, query: &PageQuery) -> Result<Vec<Credential>, StoreError> {
        let query = query.clone();
        self.blocking(move |s| s.list_credentials_page(&query)).await
    }

    async fn set_revoked(&self, id: &CredentialId) -> Result<bool, StoreError> {
        let id = id.clone();
        self.blocking(move |s| s.revoke_credential(&id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use diploma_core::Role;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("diploma-test-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn credential(id: &str, subject: &str) -> Credential {
        Credential {
            id: CredentialId::new(id).unwrap(),
            subject_name: subject.into(),
            credential_title: "BSc Physics".into(),
            issued_at: Utc::now(),
            revoked: false,
            signature: vec![7; 64],
        }
    }

    #[test]
    fn test_open_storage() {
        let dir = temp_dir();
        let storage = Storage::open(&dir);
        assert!(storage.is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_insert_get_credential() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();

        let cred = credential("vc-001", "Alice");
        assert!(storage.insert_credential(&cred).unwrap());
        assert_eq!(storage.get_credential(&cred.id).unwrap(), Some(cred));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_insert_never_overwrites() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();

        storage.insert_credential(&credential("vc-001", "Alice")).unwrap();
        assert!(!storage
            .insert_credential(&credential("vc-001", "Mallory"))
            .unwrap());
        let stored = storage
            .get_credential(&CredentialId::new("vc-001").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(stored.subject_name, "Alice");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_get_nonexistent() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();

        let result = storage
            .get_credential(&CredentialId::new("nonexistent").unwrap())
            .unwrap();
        assert!(result.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    fn page_ids(storage: &Storage, after: Option<&str>, owner: Option<&str>) -> Vec<String> {
        let query = PageQuery {
            after: after.map(|id| CredentialId::new(id).unwrap()),
            owner: owner.map(str::to_string),
            limit: 2,
        };
        storage
            .list_credentials_page(&query)
            .unwrap()
            .into_iter()
            .map(|c| c.id.to_string())
            .collect()
    }

    #[test]
    fn test_list_pages_in_key_order() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();

        for id in ["c", "a", "e", "b", "d"] {
            storage.insert_credential(&credential(id, "Alice")).unwrap();
        }
        assert_eq!(page_ids(&storage, None, None), vec!["a", "b"]);
        assert_eq!(page_ids(&storage, Some("b"), None), vec!["c", "d"]);
        assert_eq!(page_ids(&storage, Some("d"), None), vec!["e"]);
        assert!(page_ids(&storage, Some("e"), None).is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_list_page_filters_owner() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();

        for (id, owner) in [("a", "Alice"), ("b", "Bob"), ("c", "Alice"), ("d", "Alice")] {
            storage.insert_credential(&credential(id, owner)).unwrap();
        }
        assert_eq!(page_ids(&storage, None, Some("Alice")), vec!["a", "c"]);
        assert_eq!(page_ids(&storage, Some("c"), Some("Alice")), vec!["d"]);
        assert_eq!(page_ids(&storage, None, Some("Bob")), vec!["b"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_revoke_keeps_other_fields() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();

        let cred = credential("vc-001", "Alice");
        storage.insert_credential(&cred).unwrap();
        assert!(storage.revoke_credential(&cred.id).unwrap());
        assert!(storage.revoke_credential(&cred.id).unwrap());

        let stored = storage.get_credential(&cred.id).unwrap().unwrap();
        assert!(stored.revoked);
        assert_eq!(stored.signature, cred.signature);
        assert!(!storage
            .revoke_credential(&CredentialId::new("missing").unwrap())
            .unwrap());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = temp_dir();
        let cred = credential("vc-001", "Alice");
        {
            let storage = Storage::open(&dir).unwrap();
            storage.insert_credential(&cred).unwrap();
        }
        let storage = Storage::open(&dir).unwrap();
        assert_eq!(storage.get_credential(&cred.id).unwrap(), Some(cred));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_principals() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();

        let principal = Principal {
            username: "alice".into(),
            role: Role::Holder,
            credential_hash: "$argon2id$stub".into(),
        };
        assert!(storage.insert_principal(&principal).unwrap());
        assert!(!storage.insert_principal(&principal).unwrap());
        assert_eq!(storage.get_principal("alice").unwrap(), Some(principal));
        assert!(storage.get_principal("bob").unwrap().is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_rocks_store_through_trait() {
        let dir = temp_dir();
        let store = RocksStore::new(Arc::new(Storage::open(&dir).unwrap()));

        let cred = credential("vc-async", "Alice");
        assert!(store.insert_new(&cred).await.unwrap());
        assert!(!store.insert_new(&cred).await.unwrap());
        assert!(store.set_revoked(&cred.id).await.unwrap());
        assert!(store.get(&cred.id).await.unwrap().unwrap().revoked);
        let query = PageQuery {
            after: None,
            owner: None,
            limit: 10,
        };
        assert_eq!(store.list_page(&query).await.unwrap().len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
