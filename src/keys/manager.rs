// SecureDB: Key Manager
//
// Flow:
//   1. `get_or_create_key()` returns the cached handle if this manager has one
//   2. otherwise loads the raw key from the slot and imports it
//   3. otherwise generates a new key and persists it unless another writer
//      already has, then caches whichever key the slot holds
//
// Initialization is single-flight: concurrent first callers wait on the same
// `OnceCell` and all receive the one key that was loaded or generated.

use std::sync::Arc;

use tokio::sync::OnceCell;

use super::{EncryptionKey, KeyError, KeySlot};

pub struct KeyManager {
    slot: Arc<dyn KeySlot>,
    key: OnceCell<EncryptionKey>,
}

impl KeyManager {
    pub fn new(slot: Arc<dyn KeySlot>) -> Self {
        Self {
            slot,
            key: OnceCell::new(),
        }
    }

    /// Return the process key, creating and persisting it on first use.
    pub async fn get_or_create_key(&self) -> Result<EncryptionKey, KeyError> {
        let key = self
            .key
            .get_or_try_init(|| async {
                let slot = Arc::clone(&self.slot);
                tokio::task::spawn_blocking(move || load_or_generate(slot.as_ref()))
                    .await
                    .map_err(|e| KeyError::Task(e.to_string()))?
            })
            .await?;

        Ok(key.clone())
    }

    /// Check whether a key exists, without creating one.
    pub async fn has_key(&self) -> Result<bool, KeyError> {
        if self.key.initialized() {
            return Ok(true);
        }

        let slot = Arc::clone(&self.slot);
        tokio::task::spawn_blocking(move || slot.load().map(|raw| raw.is_some()))
            .await
            .map_err(|e| KeyError::Task(e.to_string()))?
    }
}

fn load_or_generate(slot: &dyn KeySlot) -> Result<EncryptionKey, KeyError> {
    match slot.load()? {
        Some(raw) => {
            let key = EncryptionKey::from_raw(&raw)?;
            tracing::debug!(slot = %slot.name(), "Loaded existing encryption key");
            Ok(key)
        }
        None => {
            tracing::info!(slot = %slot.name(), "No encryption key found, generating a new one");
            let key = EncryptionKey::generate();
            let raw = key.export_raw();
            let stored = slot.store_if_absent(&raw)?;

            if stored.as_slice() == raw.as_slice() {
                tracing::info!(slot = %slot.name(), "Encryption key persisted");
                Ok(key)
            } else {
                // Another process persisted a key first; only the stored one is valid.
                tracing::info!(slot = %slot.name(), "Adopting encryption key persisted concurrently");
                EncryptionKey::from_raw(&stored)
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
