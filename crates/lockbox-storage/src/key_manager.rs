use std::fmt;

use lockbox_core::{VaultError, KEY_LEN};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

/// What a key may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    /// Freshly generated: may encrypt, decrypt and be exported.
    Extractable,
    /// Reconstructed from stored material: may only decrypt.
    DecryptOnly,
}

/// 256-bit AES-GCM key. Bytes are wiped when the key is dropped.
pub struct SymmetricKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
    usage: KeyUsage,
}

impl SymmetricKey {
    pub fn usage(&self) -> KeyUsage {
        self.usage
    }

    pub(crate) fn expose(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh, uniformly random extractable key.
pub fn generate() -> SymmetricKey {
    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    OsRng.fill_bytes(&mut *bytes);
    SymmetricKey {
        bytes,
        usage: KeyUsage::Extractable,
    }
}

/// Raw key material of an extractable key.
pub fn export(key: &SymmetricKey) -> Result<[u8; KEY_LEN], VaultError> {
    match key.usage {
        KeyUsage::Extractable => Ok(*key.bytes),
        KeyUsage::DecryptOnly => Err(VaultError::crypto("key is not extractable")),
    }
}

/// Rebuild a decrypt-only key from raw material.
pub fn import(material: &[u8]) -> Result<SymmetricKey, VaultError> {
    let bytes = <[u8; KEY_LEN]>::try_from(material).map_err(|_| {
        VaultError::crypto(format!(
            "expected {KEY_LEN} bytes of key material, got {}",
            material.len()
        ))
    })?;
    Ok(SymmetricKey {
        bytes: Zeroizing::new(bytes),
        usage: KeyUsage::DecryptOnly,
    })
}
