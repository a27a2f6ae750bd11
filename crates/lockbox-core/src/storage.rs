use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;

use crate::record::Record;

/// Errors surfaced by record stores and the secure storage service.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultError {
    /// Requested identifier does not exist.
    #[error("entry not found for id: {id}")]
    NotFound { id: String },
    /// Connection or transaction failure in the persistence layer.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
    /// Malformed key or nonce, or a key used outside its permitted usage.
    #[error("crypto failure: {reason}")]
    Crypto { reason: String },
    /// Authentication tag did not verify: tampered data or the wrong key.
    #[error("decryption failed: ciphertext could not be authenticated")]
    Decryption,
    /// Persisted data does not have the expected shape.
    #[error("serialization failure: {reason}")]
    Serialization { reason: String },
}

impl VaultError {
    pub fn storage<E: ToString>(err: E) -> Self {
        VaultError::Storage {
            reason: err.to_string(),
        }
    }

    pub fn crypto(reason: impl Into<String>) -> Self {
        VaultError::Crypto {
            reason: reason.into(),
        }
    }

    pub fn serialization<E: ToString>(err: E) -> Self {
        VaultError::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Keyed persistent storage of encrypted records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a record under `id`, replacing any existing record as a whole.
    async fn put(&self, id: &str, record: &Record) -> Result<(), VaultError>;

    /// Fetch the current record for `id`; `Ok(None)` when absent.
    async fn get(&self, id: &str) -> Result<Option<Record>, VaultError>;

    /// Remove the record for `id` (idempotent).
    async fn delete(&self, id: &str) -> Result<(), VaultError>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn put(&self, id: &str, record: &Record) -> Result<(), VaultError> {
        (**self).put(id, record).await
    }

    async fn get(&self, id: &str) -> Result<Option<Record>, VaultError> {
        (**self).get(id).await
    }

    async fn delete(&self, id: &str) -> Result<(), VaultError> {
        (**self).delete(id).await
    }
}

/// Process-local record store for tests and ephemeral sessions. Contents are lost on drop.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<Mutex<HashMap<String, Record>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records. Still answers after a panicked writer poisoned the lock,
    /// since a `HashMap` is never left half-updated by `insert` or `remove`.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn put(&self, id: &str, record: &Record) -> Result<(), VaultError> {
        let mut map = self.inner.lock().map_err(|err| VaultError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;
        trace!(id, "in-memory put");
        map.insert(id.to_string(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Record>, VaultError> {
        let map = self.inner.lock().map_err(|err| VaultError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;
        Ok(map.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<(), VaultError> {
        let mut map = self.inner.lock().map_err(|err| VaultError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;
        map.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{KEY_LEN, NONCE_LEN};

    fn record(tag: u8) -> Record {
        Record::new(vec![tag; 20], [tag; NONCE_LEN], [tag; KEY_LEN])
    }

    #[tokio::test]
    async fn put_then_get_returns_record() {
        let store = InMemoryRecordStore::new();
        store.put("agent/session", &record(1)).await.expect("put");

        let fetched = store.get("agent/session").await.expect("get");
        assert_eq!(fetched, Some(record(1)));
    }

    #[tokio::test]
    async fn put_replaces_existing_record() {
        let store = InMemoryRecordStore::new();
        store.put("k", &record(1)).await.expect("put");
        store.put("k", &record(2)).await.expect("put again");

        assert_eq!(store.get("k").await.expect("get"), Some(record(2)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_id_is_none() {
        let store = InMemoryRecordStore::new();
        assert_eq!(store.get("absent-id").await.expect("get"), None);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_removes_data() {
        let store = InMemoryRecordStore::new();
        store.put("k", &record(3)).await.expect("put should succeed");
        store.delete("k").await.expect("delete should succeed");
        store
            .delete("k")
            .await
            .expect("delete again should still succeed");

        assert_eq!(store.get("k").await.expect("get"), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn len_survives_a_poisoned_lock() {
        let store = InMemoryRecordStore::new();
        store.put("kept", &record(5)).await.expect("put");

        let inner = Arc::clone(&store.inner);
        let panicked = std::thread::spawn(move || {
            let _guard = inner.lock().expect("lock");
            panic!("writer died holding the lock");
        })
        .join();
        assert!(panicked.is_err());

        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
        assert!(matches!(
            store.get("kept").await,
            Err(VaultError::Storage { .. })
        ));
    }

    #[tokio::test]
    async fn arc_store_delegates() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.put("shared", &record(4)).await.expect("put via arc");
        assert_eq!(store.get("shared").await.expect("get"), Some(record(4)));
    }
}
