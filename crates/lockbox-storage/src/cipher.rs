//! AES-256-GCM sealing and opening. Stateless: every function is a pure function of
//! its inputs apart from nonce generation.

use aes_gcm::{
    aead::{consts::U12, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use lockbox_core::{VaultError, KEY_LEN, NONCE_LEN};
use rand::{rngs::OsRng, RngCore};

use crate::key_manager::{KeyUsage, SymmetricKey};

/// Fresh random nonce. A (key, nonce) pair must only ever seal one message.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Seal `plaintext`, returning the ciphertext with the authentication tag appended.
pub fn encrypt(key: &SymmetricKey, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
    if key.usage() != KeyUsage::Extractable {
        return Err(VaultError::crypto("key is not permitted to encrypt"));
    }
    let nonce = checked_nonce(nonce)?;
    build_cipher(key.expose())?
        .encrypt(nonce, plaintext)
        .map_err(|e| VaultError::crypto(format!("encrypt failed: {e}")))
}

/// Open `ciphertext`. Any authentication failure is reported as
/// [`VaultError::Decryption`] and no plaintext is returned.
pub fn decrypt(
    key: &SymmetricKey,
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, VaultError> {
    let nonce = checked_nonce(nonce)?;
    build_cipher(key.expose())?
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::Decryption)
}

/// GCM counter-mode keystream for `key` and `nonce`: the encryption of zeroes with the
/// tag discarded.
pub(crate) fn keystream(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<[u8; KEY_LEN], VaultError> {
    let sealed = build_cipher(key)?
        .encrypt(Nonce::from_slice(nonce), &[0u8; KEY_LEN][..])
        .map_err(|e| VaultError::crypto(format!("keystream failed: {e}")))?;
    let mut stream = [0u8; KEY_LEN];
    stream.copy_from_slice(&sealed[..KEY_LEN]);
    Ok(stream)
}

fn checked_nonce(nonce: &[u8]) -> Result<&Nonce<U12>, VaultError> {
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::crypto(format!(
            "expected {NONCE_LEN}-byte nonce, got {}",
            nonce.len()
        )));
    }
    Ok(Nonce::from_slice(nonce))
}

fn build_cipher(key: &[u8]) -> Result<Aes256Gcm, VaultError> {
    Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::crypto(format!("cipher init failed: {e}")))
}
