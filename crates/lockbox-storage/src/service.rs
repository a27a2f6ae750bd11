use lockbox_core::{Record, RecordStore, VaultError};
use tracing::{debug, instrument};

use crate::{
    cipher, key_manager,
    key_protection::{InlineKeys, KeyProtector},
};

/// Saves and loads sensitive values: every save seals the value under a brand new key
/// and nonce, and stores the result as one record under the caller's identifier.
pub struct SecureStorageService<S: RecordStore, K: KeyProtector = InlineKeys> {
    store: S,
    protector: K,
}

impl<S: RecordStore> SecureStorageService<S, InlineKeys> {
    /// Service that keeps each record's key inline in the record.
    pub fn new(store: S) -> Self {
        Self::with_protector(store, InlineKeys)
    }
}

impl<S: RecordStore, K: KeyProtector> SecureStorageService<S, K> {
    pub fn with_protector(store: S, protector: K) -> Self {
        Self { store, protector }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Encrypt `plaintext` under a fresh key and persist it, replacing any previous
    /// record for `id`.
    #[instrument(skip_all, fields(id = %id, protector = self.protector.name()))]
    pub async fn save(&self, id: &str, plaintext: &[u8]) -> Result<(), VaultError> {
        let key = key_manager::generate();
        let nonce = cipher::generate_nonce();
        let ciphertext = cipher::encrypt(&key, &nonce, plaintext)?;
        let exported = key_manager::export(&key)?;
        let key_material = self.protector.protect(&nonce, exported).await?;

        self.store
            .put(id, &Record::new(ciphertext, nonce, key_material))
            .await?;
        debug!(len = plaintext.len(), "saved record");
        Ok(())
    }

    /// Decrypt the record stored under `id`. Returns exactly what was saved or fails;
    /// tampering is reported as [`VaultError::Decryption`].
    #[instrument(skip_all, fields(id = %id, protector = self.protector.name()))]
    pub async fn load(&self, id: &str) -> Result<Vec<u8>, VaultError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| VaultError::NotFound { id: id.to_string() })?;

        let material = self
            .protector
            .recover(&record.nonce, record.key_material)
            .await?;
        let key = key_manager::import(&material)?;
        cipher::decrypt(&key, &record.nonce, &record.ciphertext)
    }

    /// Remove the record for `id` (idempotent).
    #[instrument(skip_all, fields(id = %id))]
    pub async fn delete(&self, id: &str) -> Result<(), VaultError> {
        self.store.delete(id).await
    }
}
