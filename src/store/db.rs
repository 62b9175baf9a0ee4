// SecureDB: SQLite backing store
//
// One table, `records`, keyed by an untyped `id` column. Without a declared
// type the column has no affinity, so integer and text ids keep their own
// storage class: `1` and `'1'` are different keys, and `ORDER BY id` sorts
// integers before text. Encryption happens above this layer; SQLite only
// ever sees nonces and ciphertext.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use super::backend::{ensure_writable, BackingStore, StoreTx};
use super::models::{EncryptedRecord, RecordId, TxMode};
use super::StoreError;

/// A SQLite database holding encrypted records.
///
/// The connection sits behind a mutex, so transactions never interleave.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "Database opened");

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                id     NOT NULL PRIMARY KEY
                       CHECK (typeof(id) IN ('integer', 'text')),
                nonce  BLOB NOT NULL,
                data   BLOB NOT NULL
            );
            ",
        )?;

        tracing::debug!("Database migrations completed successfully");
        Ok(())
    }
}

impl BackingStore for Database {
    fn transaction<T, F>(&self, mode: TxMode, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock();
        let behavior = match mode {
            TxMode::ReadOnly => TransactionBehavior::Deferred,
            TxMode::ReadWrite => TransactionBehavior::Immediate,
        };
        let tx = conn.transaction_with_behavior(behavior)?;

        let result = {
            let mut handle = SqliteTx { conn: &tx, mode };
            f(&mut handle)
        };

        match result {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

struct SqliteTx<'a> {
    conn: &'a Connection,
    mode: TxMode,
}

impl SqliteTx<'_> {
    fn exists(&self, id: &RecordId) -> Result<bool, StoreError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM records WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<EncryptedRecord> {
    Ok(EncryptedRecord {
        id: row.get(0)?,
        nonce: row.get(1)?,
        data: row.get(2)?,
    })
}

impl StoreTx for SqliteTx<'_> {
    fn get(&mut self, id: &RecordId) -> Result<Option<EncryptedRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                "SELECT id, nonce, data FROM records WHERE id = ?1",
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn get_all(&mut self) -> Result<Vec<EncryptedRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, nonce, data FROM records ORDER BY id")?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn count(&mut self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn insert(&mut self, row: EncryptedRecord) -> Result<(), StoreError> {
        ensure_writable(self.mode)?;
        if self.exists(&row.id)? {
            return Err(StoreError::DuplicateId(row.id));
        }

        let result = self.conn.execute(
            "INSERT INTO records (id, nonce, data) VALUES (?1, ?2, ?3)",
            params![row.id, row.nonce, row.data],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateId(row.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, row: EncryptedRecord) -> Result<bool, StoreError> {
        ensure_writable(self.mode)?;
        let existed = self.exists(&row.id)?;

        self.conn.execute(
            "INSERT INTO records (id, nonce, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET nonce = excluded.nonce, data = excluded.data",
            params![row.id, row.nonce, row.data],
        )?;
        Ok(existed)
    }

    fn delete(&mut self, id: &RecordId) -> Result<bool, StoreError> {
        ensure_writable(self.mode)?;
        let affected = self
            .conn
            .execute("DELETE FROM records WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    fn clear(&mut self) -> Result<usize, StoreError> {
        ensure_writable(self.mode)?;
        let affected = self.conn.execute("DELETE FROM records", [])?;
        Ok(affected)
    }
}

// ─── Column mapping ──────────────────────────────────────────────────────────

impl ToSql for RecordId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            RecordId::Number(n) => ToSqlOutput::from(*n),
            RecordId::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

impl FromSql for RecordId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(n) => Ok(RecordId::Number(n)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| RecordId::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
