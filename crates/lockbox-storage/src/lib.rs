//! Concrete storage implementations with encryption at rest.
//! Every record is sealed with AES-256-GCM under its own freshly generated key;
//! how that key is kept in the record is decided by a pluggable `KeyProtector`.

mod fs_util;

pub mod cipher;
pub mod file_record_store;
pub mod key_manager;
pub mod key_protection;
pub mod key_provider;
pub mod plain_store;
pub mod service;

pub use file_record_store::FileRecordStore;
pub use key_protection::{InlineKeys, KeyProtector, MasterKeyProtector};
pub use plain_store::PlainStore;
pub use service::SecureStorageService;
