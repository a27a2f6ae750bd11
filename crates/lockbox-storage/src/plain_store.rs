use std::path::{Path, PathBuf};

use lockbox_core::VaultError;
use tracing::instrument;

use crate::fs_util::{file_name_for, read_if_exists, write_atomic};

/// Unencrypted key-value byte store. Each value is kept as a JSON array of numbers.
///
/// Offers no confidentiality; use [`crate::SecureStorageService`] for anything sensitive.
#[derive(Debug, Clone)]
pub struct PlainStore {
    root: PathBuf,
}

impl PlainStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(file_name_for(key))
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn save_raw(&self, key: &str, value: &[u8]) -> Result<(), VaultError> {
        let json = serde_json::to_vec(value).map_err(VaultError::serialization)?;
        write_atomic(&self.path_for(key), &json)
    }

    /// Fails with `NotFound` when absent and `Serialization` when the stored text is not
    /// an array of integers in `0..=255`.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn load_raw(&self, key: &str) -> Result<Vec<u8>, VaultError> {
        let bytes = read_if_exists(&self.path_for(key))?.ok_or_else(|| VaultError::NotFound {
            id: key.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(VaultError::serialization)
    }
}
