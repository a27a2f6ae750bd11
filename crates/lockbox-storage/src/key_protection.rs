//! Strategies for how a record's own key is represented in the persisted record.
//!
//! The record layout is fixed at 32 bytes of key material regardless of strategy, so
//! strategies can be swapped without touching the store or the service contract.

use async_trait::async_trait;
use lockbox_core::{VaultError, KEY_LEN, NONCE_LEN};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    cipher,
    key_provider::{KeyProvider, MasterKey},
};

#[async_trait]
pub trait KeyProtector: Send + Sync {
    /// Short name for logs and configuration.
    fn name(&self) -> &'static str;

    /// Turn a freshly exported record key into the bytes stored in the record.
    async fn protect(
        &self,
        nonce: &[u8; NONCE_LEN],
        key: [u8; KEY_LEN],
    ) -> Result<[u8; KEY_LEN], VaultError>;

    /// Inverse of [`KeyProtector::protect`].
    async fn recover(
        &self,
        nonce: &[u8; NONCE_LEN],
        stored: [u8; KEY_LEN],
    ) -> Result<[u8; KEY_LEN], VaultError>;
}

#[async_trait]
impl<K: KeyProtector + ?Sized> KeyProtector for Box<K> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn protect(
        &self,
        nonce: &[u8; NONCE_LEN],
        key: [u8; KEY_LEN],
    ) -> Result<[u8; KEY_LEN], VaultError> {
        (**self).protect(nonce, key).await
    }

    async fn recover(
        &self,
        nonce: &[u8; NONCE_LEN],
        stored: [u8; KEY_LEN],
    ) -> Result<[u8; KEY_LEN], VaultError> {
        (**self).recover(nonce, stored).await
    }
}

/// Stores the record key verbatim next to its ciphertext.
///
/// Anyone who can read the store can decrypt it; use [`MasterKeyProtector`] when the
/// store itself is not trusted.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineKeys;

#[async_trait]
impl KeyProtector for InlineKeys {
    fn name(&self) -> &'static str {
        "inline"
    }

    async fn protect(
        &self,
        _nonce: &[u8; NONCE_LEN],
        key: [u8; KEY_LEN],
    ) -> Result<[u8; KEY_LEN], VaultError> {
        Ok(key)
    }

    async fn recover(
        &self,
        _nonce: &[u8; NONCE_LEN],
        stored: [u8; KEY_LEN],
    ) -> Result<[u8; KEY_LEN], VaultError> {
        Ok(stored)
    }
}

/// Masks the record key with a keystream derived from a master key and the record's
/// nonce. The master key never touches the store.
///
/// Integrity of the masked key is covered by the record's own authentication tag: a
/// modified mask yields a wrong key, which fails decryption.
///
/// The master key is fetched from the provider once and cached; concurrent first callers
/// wait on the same fetch, so a provider that creates the key on first use creates it once.
pub struct MasterKeyProtector<P: KeyProvider> {
    provider: P,
    master: OnceCell<MasterKey>,
}

impl<P: KeyProvider> MasterKeyProtector<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            master: OnceCell::new(),
        }
    }

    async fn master(&self) -> Result<&MasterKey, VaultError> {
        self.master
            .get_or_try_init(|| async {
                let master = self
                    .provider
                    .get_or_create()
                    .await
                    .map_err(|e| VaultError::crypto(format!("key provider: {e}")))?;
                debug!(key_id = %master.id, "loaded master key");
                Ok(master)
            })
            .await
    }

    async fn mask(
        &self,
        nonce: &[u8; NONCE_LEN],
        input: [u8; KEY_LEN],
    ) -> Result<[u8; KEY_LEN], VaultError> {
        let master = self.master().await?;
        let stream = cipher::keystream(&master.bytes, nonce)?;
        let mut out = input;
        for (byte, pad) in out.iter_mut().zip(stream.iter()) {
            *byte ^= pad;
        }
        Ok(out)
    }
}

#[async_trait]
impl<P: KeyProvider> KeyProtector for MasterKeyProtector<P> {
    fn name(&self) -> &'static str {
        "master-key"
    }

    async fn protect(
        &self,
        nonce: &[u8; NONCE_LEN],
        key: [u8; KEY_LEN],
    ) -> Result<[u8; KEY_LEN], VaultError> {
        self.mask(nonce, key).await
    }

    async fn recover(
        &self,
        nonce: &[u8; NONCE_LEN],
        stored: [u8; KEY_LEN],
    ) -> Result<[u8; KEY_LEN], VaultError> {
        self.mask(nonce, stored).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::key_provider::{InMemoryKeyProvider, KeyError};

    /// Hands out a fixed key, yielding first so concurrent callers overlap, and counts calls.
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl KeyProvider for CountingProvider {
        async fn get_or_create(&self) -> Result<MasterKey, KeyError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_first && call == 0 {
                return Err(KeyError::Keyring("backend unavailable".into()));
            }
            InMemoryKeyProvider::with_key([7u8; KEY_LEN])
                .get_or_create()
                .await
        }
    }

    #[tokio::test]
    async fn inline_is_identity() {
        let key = [8u8; KEY_LEN];
        let stored = InlineKeys.protect(&[0u8; NONCE_LEN], key).await.unwrap();
        assert_eq!(stored, key);
        assert_eq!(InlineKeys.recover(&[0u8; NONCE_LEN], stored).await.unwrap(), key);
    }

    #[tokio::test]
    async fn master_key_masks_and_recovers() {
        let protector = MasterKeyProtector::new(InMemoryKeyProvider::default());
        let nonce = cipher::generate_nonce();
        let key = [0x11u8; KEY_LEN];

        let stored = protector.protect(&nonce, key).await.expect("protect");
        assert_ne!(stored, key);
        assert_eq!(protector.recover(&nonce, stored).await.expect("recover"), key);
    }

    #[tokio::test]
    async fn different_master_key_recovers_garbage() {
        let nonce = cipher::generate_nonce();
        let key = [0x22u8; KEY_LEN];
        let stored = MasterKeyProtector::new(InMemoryKeyProvider::with_key([1u8; KEY_LEN]))
            .protect(&nonce, key)
            .await
            .expect("protect");

        let other = MasterKeyProtector::new(InMemoryKeyProvider::with_key([2u8; KEY_LEN]));
        assert_ne!(other.recover(&nonce, stored).await.expect("recover"), key);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_fetches_master_key_once() {
        let protector = Arc::new(MasterKeyProtector::new(CountingProvider::default()));

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let protector = Arc::clone(&protector);
            handles.push(tokio::spawn(async move {
                let nonce = cipher::generate_nonce();
                let key = [i; KEY_LEN];
                let stored = protector.protect(&nonce, key).await?;
                protector
                    .recover(&nonce, stored)
                    .await
                    .map(|recovered| (key, recovered))
            }));
        }
        for handle in handles {
            let (key, recovered) = handle.await.expect("join").expect("mask");
            assert_eq!(recovered, key);
        }

        assert_eq!(protector.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_master_key_fetch_is_retried() {
        let protector = MasterKeyProtector::new(CountingProvider {
            fail_first: true,
            ..CountingProvider::default()
        });
        let nonce = cipher::generate_nonce();

        let err = protector
            .protect(&nonce, [1u8; KEY_LEN])
            .await
            .expect_err("first fetch fails");
        assert!(matches!(err, VaultError::Crypto { .. }));

        let stored = protector
            .protect(&nonce, [1u8; KEY_LEN])
            .await
            .expect("second fetch succeeds");
        assert_eq!(
            protector.recover(&nonce, stored).await.expect("recover"),
            [1u8; KEY_LEN]
        );
        assert_eq!(protector.provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn boxed_protector_delegates() {
        let boxed: Box<dyn KeyProtector> = Box::new(InlineKeys);
        assert_eq!(boxed.name(), "inline");
        let key = [5u8; KEY_LEN];
        assert_eq!(boxed.protect(&[0u8; NONCE_LEN], key).await.unwrap(), key);
    }
}
