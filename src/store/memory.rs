// SecureDB: In-memory backing store
//
// An ordered map behind a mutex. A transaction works on a copy of the map
// and swaps it in on commit, so an aborted transaction leaves no trace.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::backend::{ensure_writable, BackingStore, StoreTx};
use super::models::{EncryptedRecord, RecordId, TxMode};
use super::StoreError;

#[derive(Default)]
pub struct MemoryBackend {
    rows: Mutex<BTreeMap<RecordId, EncryptedRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored row directly, bypassing transactions.
    #[cfg(test)]
    pub(crate) fn tamper(&self, id: &RecordId, f: impl FnOnce(&mut EncryptedRecord)) -> bool {
        match self.rows.lock().get_mut(id) {
            Some(row) => {
                f(row);
                true
            }
            None => false,
        }
    }
}

impl BackingStore for MemoryBackend {
    fn transaction<T, F>(&self, mode: TxMode, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, StoreError>,
    {
        let mut committed = self.rows.lock();
        let mut tx = MemoryTx {
            rows: committed.clone(),
            mode,
        };

        let value = f(&mut tx)?;
        if mode == TxMode::ReadWrite {
            *committed = tx.rows;
        }
        Ok(value)
    }
}

struct MemoryTx {
    rows: BTreeMap<RecordId, EncryptedRecord>,
    mode: TxMode,
}

impl StoreTx for MemoryTx {
    fn get(&mut self, id: &RecordId) -> Result<Option<EncryptedRecord>, StoreError> {
        Ok(self.rows.get(id).cloned())
    }

    fn get_all(&mut self) -> Result<Vec<EncryptedRecord>, StoreError> {
        Ok(self.rows.values().cloned().collect())
    }

    fn count(&mut self) -> Result<usize, StoreError> {
        Ok(self.rows.len())
    }

    fn insert(&mut self, row: EncryptedRecord) -> Result<(), StoreError> {
        ensure_writable(self.mode)?;
        if self.rows.contains_key(&row.id) {
            return Err(StoreError::DuplicateId(row.id));
        }
        self.rows.insert(row.id.clone(), row);
        Ok(())
    }

    fn put(&mut self, row: EncryptedRecord) -> Result<bool, StoreError> {
        ensure_writable(self.mode)?;
        Ok(self.rows.insert(row.id.clone(), row).is_some())
    }

    fn delete(&mut self, id: &RecordId) -> Result<bool, StoreError> {
        ensure_writable(self.mode)?;
        Ok(self.rows.remove(id).is_some())
    }

    fn clear(&mut self) -> Result<usize, StoreError> {
        ensure_writable(self.mode)?;
        let removed = self.rows.len();
        self.rows.clear();
        Ok(removed)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
