use std::{
    fmt,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use lockbox_core::KEY_LEN;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use zeroize::Zeroizing;

/// Master key used to protect per-record keys.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey {
    /// Identifier for logging/rotation (never log key bytes).
    pub id: String,
    /// 256-bit symmetric key.
    pub bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
}

/// Provides access to the master key (OS keychain in production; memory in tests).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn get_or_create(&self) -> Result<MasterKey, KeyError>;
}

/// OS keyring-backed provider. Uses the `keyring` crate to store the key.
pub struct KeyringProvider {
    service: String,
    account: String,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

#[async_trait]
impl KeyProvider for KeyringProvider {
    async fn get_or_create(&self) -> Result<MasterKey, KeyError> {
        // Keyring operations are synchronous; wrap in async for trait compatibility.
        let entry = keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))?;

        match entry.get_password() {
            Ok(secret) => decode_key(&self.account, &secret),
            Err(keyring::Error::NoEntry) => {
                let key = generate_key(&self.account);
                entry
                    .set_password(&encode_key(&key))
                    .map_err(|e| KeyError::Keyring(e.to_string()))?;
                tracing::info!(key_id = %key.id, "created master key in OS keyring");
                Ok(key)
            }
            Err(err) => Err(KeyError::Keyring(err.to_string())),
        }
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<MasterKey>>>,
}

impl InMemoryKeyProvider {
    /// Provider seeded with fixed key bytes.
    pub fn with_key(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(MasterKey {
                id: "memory".to_string(),
                bytes: Zeroizing::new(bytes),
            }))),
        }
    }
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn get_or_create(&self) -> Result<MasterKey, KeyError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let key = generate_key("memory");
        *guard = Some(key.clone());
        Ok(key)
    }
}

fn generate_key(id: &str) -> MasterKey {
    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    OsRng.fill_bytes(&mut *bytes);
    MasterKey {
        id: id.to_string(),
        bytes,
    }
}

fn encode_key(key: &MasterKey) -> String {
    general_purpose::STANDARD.encode(*key.bytes)
}

fn decode_key(id: &str, secret: &str) -> Result<MasterKey, KeyError> {
    let bytes = Zeroizing::new(
        general_purpose::STANDARD
            .decode(secret)
            .map_err(|e| KeyError::Decode(e.to_string()))?,
    );

    let out = <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
        KeyError::Decode(format!("expected {KEY_LEN} bytes, got {}", bytes.len()))
    })?;
    Ok(MasterKey {
        id: id.to_string(),
        bytes: Zeroizing::new(out),
    })
}
