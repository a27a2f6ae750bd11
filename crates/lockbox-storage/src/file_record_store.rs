#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::{
    fs,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use lockbox_core::{Record, RecordStore, VaultError};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::fs_util::{file_name_for, read_if_exists, remove_if_exists, write_atomic};

const MANIFEST_FILE: &str = "lockbox.json";
const RECORDS_DIR: &str = "records";
const FORMAT_VERSION: u32 = 2;

/// Directory-backed record store: one JSON file per identifier, written atomically.
/// Files are named by a digest of the id; the id itself is kept inside the file.
///
/// The database handle is opened on first use and shared by every later call.
pub struct FileRecordStore {
    root: PathBuf,
    db: OnceCell<RecordDatabase>,
    #[cfg(test)]
    opens: AtomicUsize,
}

/// Opened record database: the root has been created and its manifest checked.
#[derive(Debug)]
pub struct RecordDatabase {
    records: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    ciphertext: String,
    nonce: String,
    key_material: String,
}

impl FileRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            db: OnceCell::new(),
            #[cfg(test)]
            opens: AtomicUsize::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The shared database handle, opening it if this is the first use.
    /// A failed open is not cached; the next caller tries again.
    pub async fn database(&self) -> Result<&RecordDatabase, VaultError> {
        self.db
            .get_or_try_init(|| async {
                #[cfg(test)]
                self.opens.fetch_add(1, Ordering::SeqCst);
                RecordDatabase::open(&self.root)
            })
            .await
    }
}

impl RecordDatabase {
    fn open(root: &Path) -> Result<Self, VaultError> {
        debug!(?root, "opening record database");
        let records = root.join(RECORDS_DIR);
        fs::create_dir_all(&records).map_err(VaultError::storage)?;

        let manifest_path = root.join(MANIFEST_FILE);
        match read_if_exists(&manifest_path)? {
            Some(bytes) => {
                let manifest: Manifest =
                    serde_json::from_slice(&bytes).map_err(VaultError::serialization)?;
                if manifest.format != FORMAT_VERSION {
                    return Err(VaultError::Storage {
                        reason: format!(
                            "unsupported store format {} (expected {FORMAT_VERSION})",
                            manifest.format
                        ),
                    });
                }
            }
            None => {
                let manifest = serde_json::to_vec(&Manifest {
                    format: FORMAT_VERSION,
                })
                .map_err(VaultError::serialization)?;
                write_atomic(&manifest_path, &manifest)?;
            }
        }

        Ok(Self { records })
    }

    pub(crate) fn path_for(&self, id: &str) -> PathBuf {
        self.records.join(file_name_for(id))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    #[instrument(skip_all, fields(id = %id))]
    async fn put(&self, id: &str, record: &Record) -> Result<(), VaultError> {
        let db = self.database().await?;
        let stored = StoredRecord {
            id: id.to_string(),
            ciphertext: URL_SAFE_NO_PAD.encode(&record.ciphertext),
            nonce: URL_SAFE_NO_PAD.encode(record.nonce),
            key_material: URL_SAFE_NO_PAD.encode(record.key_material),
        };
        let json = serde_json::to_vec(&stored).map_err(VaultError::serialization)?;
        write_atomic(&db.path_for(id), &json)
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn get(&self, id: &str) -> Result<Option<Record>, VaultError> {
        let db = self.database().await?;
        let Some(bytes) = read_if_exists(&db.path_for(id))? else {
            return Ok(None);
        };
        let stored: StoredRecord =
            serde_json::from_slice(&bytes).map_err(VaultError::serialization)?;
        if stored.id != id {
            return Err(VaultError::Storage {
                reason: "record file belongs to a different id".to_string(),
            });
        }
        decode_record(stored).map(Some)
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn delete(&self, id: &str) -> Result<(), VaultError> {
        let db = self.database().await?;
        remove_if_exists(&db.path_for(id))
    }
}

fn decode_record(stored: StoredRecord) -> Result<Record, VaultError> {
    let ciphertext = decode_field("ciphertext", &stored.ciphertext)?;
    let nonce = decode_field("nonce", &stored.nonce)?;
    let key_material = decode_field("key_material", &stored.key_material)?;
    Record::from_parts(ciphertext, &nonce, &key_material)
}

fn decode_field(field: &str, value: &str) -> Result<Vec<u8>, VaultError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| VaultError::Serialization {
            reason: format!("{field} decode failed: {e}"),
        })
}
