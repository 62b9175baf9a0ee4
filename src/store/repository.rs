// SecureDB: Record Store
//
// CRUD over a transactional backing store. Each operation opens exactly one
// transaction; payloads are encrypted before a write transaction starts and
// decrypted after a read transaction has committed. Backend work runs on
// tokio's blocking pool, so a transaction that has started always runs to
// commit or rollback even if the caller stops waiting.
//
// Policies:
//   - `update` on a missing id creates the record (`UpdateOutcome::Created`).
//   - `read_all` fails as a whole if any record cannot be decrypted and lists
//     every failed id; `read_report` returns successes and failures instead.
//   - `delete` of a missing id is not an error.

use std::sync::Arc;

use serde_json::Value;

use super::backend::{BackingStore, StoreTx};
use super::models::{
    EncryptedRecord, ReadReport, Record, RecordFailure, RecordId, TxMode, UpdateOutcome,
};
use super::StoreError;
use crate::cipher;
use crate::keys::{EncryptionKey, KeyManager};

/// Handle to an encrypted record store: the backing store plus the key
/// manager. Construct once per process and clone it where needed.
pub struct RecordStore<B: BackingStore> {
    backend: Arc<B>,
    keys: Arc<KeyManager>,
}

impl<B: BackingStore> Clone for RecordStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            keys: Arc::clone(&self.keys),
        }
    }
}

impl<B: BackingStore> RecordStore<B> {
    pub fn new(backend: B, keys: KeyManager) -> Self {
        Self {
            backend: Arc::new(backend),
            keys: Arc::new(keys),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.keys
    }

    async fn key(&self) -> Result<EncryptionKey, StoreError> {
        Ok(self.keys.get_or_create_key().await?)
    }

    /// Run one transaction on the blocking pool.
    async fn transact<T, F>(&self, mode: TxMode, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, StoreError> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || backend.transaction(mode, f))
            .await
            .map_err(|e| StoreError::TransactionFailed(format!("transaction task failed: {}", e)))?
    }

    fn seal(key: &EncryptionKey, id: RecordId, payload: &Value) -> Result<EncryptedRecord, StoreError> {
        let sealed = cipher::seal_payload(key, payload).map_err(StoreError::from_seal)?;
        Ok(EncryptedRecord::new(id, sealed))
    }

    /// Encrypt and insert a new record. Fails with `DuplicateId` if the id
    /// is already taken.
    pub async fn add(&self, record: Record) -> Result<(), StoreError> {
        let key = self.key().await?;
        let row = Self::seal(&key, record.id.clone(), &record.payload)?;

        self.transact(TxMode::ReadWrite, move |tx| tx.insert(row)).await?;

        tracing::info!(id = %record.id, "Record added");
        Ok(())
    }

    /// Decrypt every record, collecting per-record failures.
    pub async fn read_report(&self) -> Result<ReadReport, StoreError> {
        let rows = self.transact(TxMode::ReadOnly, |tx| tx.get_all()).await?;

        let mut report = ReadReport::default();
        if rows.is_empty() {
            return Ok(report);
        }

        let key = self.key().await?;
        for row in rows {
            match cipher::open_payload(&key, &row.nonce, &row.data) {
                Ok(payload) => report.records.push((row.id, payload)),
                Err(error) => {
                    tracing::warn!(id = %row.id, %error, "Record could not be read");
                    report.failures.push(RecordFailure { id: row.id, error });
                }
            }
        }

        tracing::debug!(
            read = report.records.len(),
            failed = report.failures.len(),
            "Records read"
        );
        Ok(report)
    }

    /// Decrypt every record, in key order. Fails with `Unreadable` if any
    /// record cannot be decrypted or parsed.
    pub async fn read_all(&self) -> Result<Vec<Value>, StoreError> {
        let report = self.read_report().await?;
        if !report.is_complete() {
            return Err(StoreError::Unreadable {
                failures: report.failures,
            });
        }

        Ok(report.records.into_iter().map(|(_, payload)| payload).collect())
    }

    /// Decrypt a single record, if present.
    pub async fn get(&self, id: &RecordId) -> Result<Option<Value>, StoreError> {
        let lookup = id.clone();
        let row = match self
            .transact(TxMode::ReadOnly, move |tx| tx.get(&lookup))
            .await?
        {
            Some(row) => row,
            None => return Ok(None),
        };

        let key = self.key().await?;
        match cipher::open_payload(&key, &row.nonce, &row.data) {
            Ok(payload) => Ok(Some(payload)),
            Err(error) => Err(RecordFailure { id: row.id, error }.into_error()),
        }
    }

    /// Re-encrypt `payload` under a fresh nonce and store it under `id`,
    /// creating the record if it does not exist.
    pub async fn update(&self, id: RecordId, payload: &Value) -> Result<UpdateOutcome, StoreError> {
        let key = self.key().await?;
        let row = Self::seal(&key, id.clone(), payload)?;

        let replaced = self.transact(TxMode::ReadWrite, move |tx| tx.put(row)).await?;

        if replaced {
            tracing::info!(id = %id, "Record updated");
            Ok(UpdateOutcome::Replaced)
        } else {
            tracing::info!(id = %id, "Record created by update");
            Ok(UpdateOutcome::Created)
        }
    }

    /// Remove a record. Returns true if it existed.
    pub async fn delete(&self, id: &RecordId) -> Result<bool, StoreError> {
        let target = id.clone();
        let existed = self
            .transact(TxMode::ReadWrite, move |tx| tx.delete(&target))
            .await?;

        if existed {
            tracing::info!(id = %id, "Record deleted");
        } else {
            tracing::debug!(id = %id, "Delete of missing record ignored");
        }
        Ok(existed)
    }

    /// Remove every record. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize, StoreError> {
        let removed = self.transact(TxMode::ReadWrite, |tx| tx.clear()).await?;
        tracing::info!(removed, "All records cleared");
        Ok(removed)
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        self.transact(TxMode::ReadOnly, |tx| tx.count()).await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::keys::{KeySlot, MemoryKeySlot};
    use crate::store::{Database, MemoryBackend};

    fn memory_store() -> (RecordStore<MemoryBackend>, Arc<MemoryKeySlot>) {
        let slot = Arc::new(MemoryKeySlot::new());
        let store = RecordStore::new(MemoryBackend::new(), KeyManager::new(slot.clone()));
        (store, slot)
    }

    fn sqlite_store() -> RecordStore<Database> {
        RecordStore::new(
            Database::open_in_memory().unwrap(),
            KeyManager::new(Arc::new(MemoryKeySlot::new())),
        )
    }

    #[tokio::test]
    async fn test_crud_scenario() {
        let store = sqlite_store();

        store.add(Record::new(1, json!({"v": 42}))).await.unwrap();
        assert_eq!(store.read_all().await.unwrap(), vec![json!({"v": 42})]);

        let outcome = store.update(RecordId::from(1), &json!({"v": 99})).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Replaced);
        assert_eq!(store.read_all().await.unwrap(), vec![json!({"v": 99})]);

        assert!(store.delete(&RecordId::from(1)).await.unwrap());
        assert!(store.read_all().await.unwrap().is_empty());

        assert_eq!(store.clear().await.unwrap(), 0, "Clearing an empty store succeeds");
    }

    #[tokio::test]
    async fn test_add_duplicate_id_fails() {
        let store = sqlite_store();

        store.add(Record::new("x", json!({"n": 1}))).await.unwrap();
        let err = store.add(Record::new("x", json!({"n": 2}))).await.unwrap_err();

        assert!(matches!(err, StoreError::DuplicateId(RecordId::Text(ref s)) if s == "x"));
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(
            store.get(&RecordId::from("x")).await.unwrap(),
            Some(json!({"n": 1})),
            "The first record must be unchanged"
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = sqlite_store();
        store.add(Record::new(7, json!("seven"))).await.unwrap();

        assert!(store.delete(&RecordId::from(7)).await.unwrap());
        assert!(!store.delete(&RecordId::from(7)).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_id_creates_record() {
        let (store, _) = memory_store();

        let outcome = store.update(RecordId::from("new"), &json!([1, 2])).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Created);
        assert_eq!(
            store.get(&RecordId::from("new")).await.unwrap(),
            Some(json!([1, 2]))
        );
    }

    #[tokio::test]
    async fn test_update_uses_fresh_nonce() {
        let (store, _) = memory_store();
        let id = RecordId::from(1);

        store.add(Record::new(1, json!({"v": 1}))).await.unwrap();
        let before = store
            .backend()
            .transaction(TxMode::ReadOnly, |tx| tx.get(&RecordId::from(1)))
            .unwrap()
            .unwrap();

        store.update(id.clone(), &json!({"v": 1})).await.unwrap();
        let after = store
            .backend()
            .transaction(TxMode::ReadOnly, |tx| tx.get(&RecordId::from(1)))
            .unwrap()
            .unwrap();

        assert_ne!(before.nonce, after.nonce, "Update must never reuse the old nonce");
        assert_ne!(before.data, after.data);
    }

    #[tokio::test]
    async fn test_rows_hold_no_plaintext() {
        let (store, _) = memory_store();
        store
            .add(Record::new("secret", json!({"password": "hunter2"})))
            .await
            .unwrap();

        let row = store
            .backend()
            .transaction(TxMode::ReadOnly, |tx| tx.get(&RecordId::from("secret")))
            .unwrap()
            .unwrap();
        assert_eq!(row.nonce.len(), cipher::NONCE_LEN);
        let haystack = String::from_utf8_lossy(&row.data);
        assert!(!haystack.contains("hunter2"), "Ciphertext must not contain plaintext");
    }

    #[tokio::test]
    async fn test_read_all_returns_key_order() {
        let (store, _) = memory_store();
        store.add(Record::new("b", json!("b"))).await.unwrap();
        store.add(Record::new(2, json!(2))).await.unwrap();
        store.add(Record::new("a", json!("a"))).await.unwrap();
        store.add(Record::new(1, json!(1))).await.unwrap();

        assert_eq!(
            store.read_all().await.unwrap(),
            vec![json!(1), json!(2), json!("a"), json!("b")]
        );
    }

    #[tokio::test]
    async fn test_read_all_fails_listing_tampered_records() {
        let (store, _) = memory_store();
        store.add(Record::new(1, json!({"ok": true}))).await.unwrap();
        store.add(Record::new(2, json!({"ok": false}))).await.unwrap();

        assert!(store
            .backend()
            .tamper(&RecordId::from(2), |row| row.data[0] ^= 0x01));

        match store.read_all().await.unwrap_err() {
            StoreError::Unreadable { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].id, RecordId::from(2));
                assert!(matches!(
                    failures[0].error,
                    cipher::CipherError::DecryptionFailed
                ));
            }
            other => panic!("Expected Unreadable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_report_keeps_good_records() {
        let (store, _) = memory_store();
        store.add(Record::new(1, json!("good"))).await.unwrap();
        store.add(Record::new(2, json!("bad"))).await.unwrap();
        store.add(Record::new(3, json!("also good"))).await.unwrap();

        store.backend().tamper(&RecordId::from(2), |row| row.nonce[0] ^= 0x80);

        let report = store.read_report().await.unwrap();
        assert!(!report.is_complete());
        assert_eq!(
            report.records,
            vec![
                (RecordId::from(1), json!("good")),
                (RecordId::from(3), json!("also good")),
            ]
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, RecordId::from(2));
    }

    #[tokio::test]
    async fn test_get_reports_decryption_failure() {
        let (store, _) = memory_store();
        store.add(Record::new("t", json!(1))).await.unwrap();
        store.backend().tamper(&RecordId::from("t"), |row| {
            let last = row.data.len() - 1;
            row.data[last] ^= 0x40;
        });

        let err = store.get(&RecordId::from("t")).await.unwrap_err();
        assert!(matches!(err, StoreError::DecryptionFailed(RecordId::Text(ref s)) if s == "t"));
    }

    #[tokio::test]
    async fn test_get_reports_corrupt_payload() {
        let (store, slot) = memory_store();
        store.add(Record::new(1, json!("placeholder"))).await.unwrap();

        // Re-encrypt non-JSON bytes under the real key.
        let key = store.key_manager().get_or_create_key().await.unwrap();
        let sealed = cipher::encrypt(&key, b"\xff not json").unwrap();
        store.backend().tamper(&RecordId::from(1), |row| {
            row.nonce = sealed.nonce.to_vec();
            row.data = sealed.ciphertext.clone();
        });

        let err = store.get(&RecordId::from(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::PayloadCorrupt { .. }));
        assert_eq!(slot.write_count(), 1);
    }

    #[tokio::test]
    async fn test_reads_of_empty_store_do_not_create_key() {
        let (store, slot) = memory_store();

        assert!(store.read_all().await.unwrap().is_empty());
        assert!(store.get(&RecordId::from(1)).await.unwrap().is_none());
        assert!(!store.delete(&RecordId::from(1)).await.unwrap());
        assert_eq!(store.clear().await.unwrap(), 0);

        assert!(slot.load().unwrap().is_none(), "No key should exist before the first write");
    }

    #[tokio::test]
    async fn test_key_unavailable_aborts_write() {
        let slot = Arc::new(MemoryKeySlot::with_raw(vec![0u8; 5]));
        let store = RecordStore::new(MemoryBackend::new(), KeyManager::new(slot));

        let err = store.add(Record::new(1, json!(1))).await.unwrap_err();
        assert!(matches!(err, StoreError::KeyUnavailable(_)));
        assert_eq!(store.count().await.unwrap(), 0, "No row may be written without a key");
    }

    #[tokio::test]
    async fn test_wrong_key_cannot_read_records() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = RecordStore {
            backend: Arc::clone(&backend),
            keys: Arc::new(KeyManager::new(Arc::new(MemoryKeySlot::new()))),
        };
        writer.add(Record::new(1, json!("mine"))).await.unwrap();

        let reader = RecordStore {
            backend,
            keys: Arc::new(KeyManager::new(Arc::new(MemoryKeySlot::new()))),
        };
        let report = reader.read_report().await.unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.failures.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_leave_consistent_row() {
        let store = sqlite_store();
        store.add(Record::new(1, json!({"writer": -1}))).await.unwrap();

        let mut handles = Vec::new();
        for writer in 0..12 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(RecordId::from(1), &json!({"writer": writer}))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let payload = store.get(&RecordId::from(1)).await.unwrap().unwrap();
        let writer = payload["writer"].as_i64().unwrap();
        assert!((0..12).contains(&writer), "Final row must be one complete write");
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
