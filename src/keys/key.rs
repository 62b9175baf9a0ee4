// SecureDB: Encryption key handle
//
// SECURITY: the raw key bytes are held in a zeroizing buffer and never
// appear in Debug output or log messages. Handles are cheap to clone and
// share a single copy of the key material.

use std::fmt;
use std::sync::Arc;

use aes_gcm::{Aes256Gcm, Key, KeyInit};
use rand::RngCore;
use zeroize::Zeroizing;

use super::KeyError;

/// Length of the raw key in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Shared handle to the record encryption key.
#[derive(Clone)]
pub struct EncryptionKey {
    inner: Arc<KeyMaterial>,
}

struct KeyMaterial {
    raw: Zeroizing<[u8; KEY_LEN]>,
    cipher: Aes256Gcm,
}

impl EncryptionKey {
    /// Generate a fresh key from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut raw = Zeroizing::new([0u8; KEY_LEN]);
        rand::rng().fill_bytes(&mut raw[..]);
        Self::from_array(raw)
    }

    /// Import a key from its raw exported form.
    pub fn from_raw(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyError::InvalidLength {
                expected: KEY_LEN,
                got: bytes.len(),
            });
        }

        let mut raw = Zeroizing::new([0u8; KEY_LEN]);
        raw.copy_from_slice(bytes);
        Ok(Self::from_array(raw))
    }

    fn from_array(raw: Zeroizing<[u8; KEY_LEN]>) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&raw[..]));
        Self {
            inner: Arc::new(KeyMaterial { raw, cipher }),
        }
    }

    /// Export the raw key bytes for persistence.
    pub fn export_raw(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.inner.raw.to_vec())
    }

    pub(crate) fn cipher(&self) -> &Aes256Gcm {
        &self.inner.cipher
    }
}

impl PartialEq for EncryptionKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.raw[..] == other.inner.raw[..]
    }
}

impl Eq for EncryptionKey {}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("raw", &"[REDACTED]")
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
