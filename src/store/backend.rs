// SecureDB: Backing store capability
//
// The record store only needs a transactional key-value table keyed by
// record id. A transaction runs a closure against a `StoreTx`; returning
// `Ok` commits every effect at once, returning `Err` rolls all of them back.

use super::models::{EncryptedRecord, RecordId, TxMode};
use super::StoreError;

/// Operations available inside one transaction.
pub trait StoreTx {
    fn get(&mut self, id: &RecordId) -> Result<Option<EncryptedRecord>, StoreError>;

    /// Every row, in key order.
    fn get_all(&mut self) -> Result<Vec<EncryptedRecord>, StoreError>;

    fn count(&mut self) -> Result<usize, StoreError>;

    /// Insert a new row. Fails with `DuplicateId` if the id exists.
    fn insert(&mut self, row: EncryptedRecord) -> Result<(), StoreError>;

    /// Insert or replace a row. Returns true if a row was replaced.
    fn put(&mut self, row: EncryptedRecord) -> Result<bool, StoreError>;

    /// Remove a row. Returns true if it existed.
    fn delete(&mut self, id: &RecordId) -> Result<bool, StoreError>;

    /// Remove every row. Returns how many were removed.
    fn clear(&mut self) -> Result<usize, StoreError>;
}

/// A store that can run atomic transactions. Transactions are serialized.
pub trait BackingStore: Send + Sync + 'static {
    fn transaction<T, F>(&self, mode: TxMode, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, StoreError>;
}

pub(crate) fn ensure_writable(mode: TxMode) -> Result<(), StoreError> {
    match mode {
        TxMode::ReadWrite => Ok(()),
        TxMode::ReadOnly => Err(StoreError::ReadOnlyTransaction),
    }
}

// ─── Shared backend tests ────────────────────────────────────────────────────

/// Behavioral checks every backend must pass.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;

    fn row(id: impl Into<RecordId>, fill: u8) -> EncryptedRecord {
        EncryptedRecord {
            id: id.into(),
            nonce: vec![fill; 12],
            data: vec![fill; 20],
        }
    }

    pub fn insert_and_get<B: BackingStore>(store: &B) {
        store
            .transaction(TxMode::ReadWrite, |tx| tx.insert(row(1, 1)))
            .unwrap();

        let found = store
            .transaction(TxMode::ReadOnly, |tx| tx.get(&RecordId::from(1)))
            .unwrap();
        assert_eq!(found, Some(row(1, 1)));

        let missing = store
            .transaction(TxMode::ReadOnly, |tx| tx.get(&RecordId::from("1")))
            .unwrap();
        assert!(missing.is_none(), "String id \"1\" must not match numeric id 1");
    }

    pub fn insert_rejects_duplicates<B: BackingStore>(store: &B) {
        store
            .transaction(TxMode::ReadWrite, |tx| tx.insert(row("x", 1)))
            .unwrap();
        let err = store
            .transaction(TxMode::ReadWrite, |tx| tx.insert(row("x", 2)))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(RecordId::Text(ref s)) if s == "x"));

        let (count, kept) = store
            .transaction(TxMode::ReadOnly, |tx| {
                Ok((tx.count()?, tx.get(&RecordId::from("x"))?))
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(kept, Some(row("x", 1)), "The original row must be untouched");
    }

    pub fn put_upserts<B: BackingStore>(store: &B) {
        let replaced = store
            .transaction(TxMode::ReadWrite, |tx| tx.put(row(5, 1)))
            .unwrap();
        assert!(!replaced);

        let replaced = store
            .transaction(TxMode::ReadWrite, |tx| tx.put(row(5, 2)))
            .unwrap();
        assert!(replaced);

        let found = store
            .transaction(TxMode::ReadOnly, |tx| tx.get(&RecordId::from(5)))
            .unwrap();
        assert_eq!(found, Some(row(5, 2)));
    }

    pub fn delete_and_clear<B: BackingStore>(store: &B) {
        store
            .transaction(TxMode::ReadWrite, |tx| {
                tx.insert(row(1, 1))?;
                tx.insert(row(2, 2))?;
                tx.insert(row("a", 3))
            })
            .unwrap();

        assert!(store
            .transaction(TxMode::ReadWrite, |tx| tx.delete(&RecordId::from(1)))
            .unwrap());
        assert!(!store
            .transaction(TxMode::ReadWrite, |tx| tx.delete(&RecordId::from(1)))
            .unwrap());

        let removed = store
            .transaction(TxMode::ReadWrite, |tx| tx.clear())
            .unwrap();
        assert_eq!(removed, 2);

        let removed = store
            .transaction(TxMode::ReadWrite, |tx| tx.clear())
            .unwrap();
        assert_eq!(removed, 0, "Clearing an empty store is not an error");
    }

    pub fn get_all_in_key_order<B: BackingStore>(store: &B) {
        store
            .transaction(TxMode::ReadWrite, |tx| {
                tx.insert(row("b", 1))?;
                tx.insert(row(10, 2))?;
                tx.insert(row("a", 3))?;
                tx.insert(row(-2, 4))
            })
            .unwrap();

        let ids: Vec<RecordId> = store
            .transaction(TxMode::ReadOnly, |tx| tx.get_all())
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                RecordId::from(-2),
                RecordId::from(10),
                RecordId::from("a"),
                RecordId::from("b"),
            ]
        );
    }

    pub fn failed_transaction_rolls_back<B: BackingStore>(store: &B) {
        let result: Result<(), StoreError> = store.transaction(TxMode::ReadWrite, |tx| {
            tx.insert(row(1, 1))?;
            tx.insert(row(2, 2))?;
            Err(StoreError::TransactionFailed("injected".to_string()))
        });
        assert!(result.is_err());

        let count = store
            .transaction(TxMode::ReadOnly, |tx| tx.count())
            .unwrap();
        assert_eq!(count, 0, "No partial write may survive a failed transaction");
    }

    pub fn read_only_rejects_writes<B: BackingStore>(store: &B) {
        let err = store
            .transaction(TxMode::ReadOnly, |tx| tx.put(row(1, 1)))
            .unwrap_err();
        assert!(matches!(err, StoreError::ReadOnlyTransaction));

        let err = store
            .transaction(TxMode::ReadOnly, |tx| tx.clear())
            .unwrap_err();
        assert!(matches!(err, StoreError::ReadOnlyTransaction));
    }
}
