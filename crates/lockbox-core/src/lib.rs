//! Core abstractions for Lockbox: the encrypted record model, the error taxonomy,
//! and the keyed record store contract. Crypto and on-disk persistence live in
//! `lockbox-storage`.

pub mod record;
pub mod storage;

pub use record::{Record, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use storage::{InMemoryRecordStore, RecordStore, VaultError};
