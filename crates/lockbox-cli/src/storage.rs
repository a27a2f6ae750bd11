use std::path::PathBuf;

use color_eyre::Result;
use dirs::data_dir;
use lockbox_storage::{
    key_provider::KeyringProvider, FileRecordStore, InlineKeys, KeyProtector,
    MasterKeyProtector, PlainStore, SecureStorageService,
};
use tracing::debug;

use crate::config::{Config, KeyProtection};

/// Encrypted service as wired by the CLI; the key strategy is picked at runtime.
pub type Service = SecureStorageService<FileRecordStore, Box<dyn KeyProtector>>;

/// Resolve the default data directory for Lockbox.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("lockbox"))
}

fn data_root(config: &Config) -> Result<PathBuf> {
    match &config.data_dir {
        Some(root) => Ok(root.clone()),
        None => default_data_dir(),
    }
}

/// Build the encrypted service using config overrides.
pub fn service_from_config(config: &Config) -> Result<Service> {
    let root = data_root(config)?.join("secure");
    debug!(?root, protection = ?config.key_protection, "initializing encrypted store");
    Ok(SecureStorageService::with_protector(
        FileRecordStore::new(root),
        protector_for(config),
    ))
}

/// Build the unencrypted companion store.
pub fn plain_store_from_config(config: &Config) -> Result<PlainStore> {
    Ok(PlainStore::new(data_root(config)?.join("plain")))
}

fn protector_for(config: &Config) -> Box<dyn KeyProtector> {
    match config.key_protection {
        KeyProtection::Inline => Box::new(InlineKeys),
        KeyProtection::Keyring => Box::new(MasterKeyProtector::new(KeyringProvider::new(
            config.keyring.service.clone(),
            config.keyring.account.clone(),
        ))),
    }
}

/// Helper for tests to construct a service rooted at a temp dir with an in-memory master key.
#[cfg(test)]
pub fn test_service(root: impl Into<PathBuf>) -> Service {
    use lockbox_storage::key_provider::InMemoryKeyProvider;

    SecureStorageService::with_protector(
        FileRecordStore::new(root),
        Box::new(MasterKeyProtector::new(InMemoryKeyProvider::default())),
    )
}
