use std::fmt;

use crate::storage::VaultError;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// 256-bit symmetric key length in bytes.
pub const KEY_LEN: usize = 32;
/// Authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// The persisted unit for one identifier: ciphertext (tag included), the nonce it was
/// sealed with, and the key material needed to open it.
///
/// Records are immutable; a later save of the same identifier replaces the whole record.
#[derive(Clone, PartialEq, Eq)]
pub struct Record {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub key_material: [u8; KEY_LEN],
}

impl Record {
    pub fn new(ciphertext: Vec<u8>, nonce: [u8; NONCE_LEN], key_material: [u8; KEY_LEN]) -> Self {
        Self {
            ciphertext,
            nonce,
            key_material,
        }
    }

    /// Build a record from untrusted slices, rejecting nonces or key material of the
    /// wrong width.
    pub fn from_parts(
        ciphertext: Vec<u8>,
        nonce: &[u8],
        key_material: &[u8],
    ) -> Result<Self, VaultError> {
        Ok(Self {
            ciphertext,
            nonce: fixed_width("nonce", nonce)?,
            key_material: fixed_width("key_material", key_material)?,
        })
    }
}

// Never print key bytes.
impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("nonce", &self.nonce)
            .field("key_material", &"<redacted>")
            .finish()
    }
}

/// Convert a slice into a fixed-width array, failing with a serialization error that
/// names the offending field.
pub fn fixed_width<const N: usize>(field: &str, bytes: &[u8]) -> Result<[u8; N], VaultError> {
    <[u8; N]>::try_from(bytes).map_err(|_| VaultError::Serialization {
        reason: format!("{field}: expected {N} bytes, got {}", bytes.len()),
    })
}
