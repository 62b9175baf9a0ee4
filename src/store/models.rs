// SecureDB: Record data models
//
// `Record` is the caller's view (plaintext payload); `EncryptedRecord` is the
// persisted row. Byte fields serialize as arrays of small integers, so a row
// in JSON form reads `{"id":1,"nonce":[..12 numbers..],"data":[...]}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cipher::{CipherError, Sealed};

/// Caller-supplied record identity: a string or an integer.
///
/// `1` and `"1"` are distinct ids. Ordering matches the backing store's key
/// order: all numeric ids ascending, then all string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    /// Interpret a command-line argument: integers become numeric ids,
    /// anything else is a string id.
    pub fn from_arg(arg: &str) -> Self {
        match arg.parse::<i64>() {
            Ok(n) => RecordId::Number(n),
            Err(_) => RecordId::Text(arg.to_string()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Number(n)
    }
}

impl From<i32> for RecordId {
    fn from(n: i32) -> Self {
        RecordId::Number(i64::from(n))
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::Text(s)
    }
}

/// A logical record: identity plus an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub payload: Value,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}

/// The persisted form of a record.
///
/// `nonce` is kept as a byte vector rather than a fixed array so that a
/// damaged row can still be loaded and reported as undecryptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub id: RecordId,
    pub nonce: Vec<u8>,
    pub data: Vec<u8>,
}

impl EncryptedRecord {
    pub fn new(id: RecordId, sealed: Sealed) -> Self {
        Self {
            id,
            nonce: sealed.nonce.to_vec(),
            data: sealed.ciphertext,
        }
    }
}

/// Access mode of a backing-store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Result of `update`: whether the id already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOutcome {
    Replaced,
    Created,
}

/// A stored record that could not be turned back into a payload.
#[derive(Debug)]
pub struct RecordFailure {
    pub id: RecordId,
    pub error: CipherError,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.error)
    }
}

/// Outcome of reading every record: decrypted payloads plus the rows that
/// failed, each reported individually.
#[derive(Debug, Default)]
pub struct ReadReport {
    pub records: Vec<(RecordId, Value)>,
    pub failures: Vec<RecordFailure>,
}

impl ReadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
