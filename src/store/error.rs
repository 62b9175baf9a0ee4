// SecureDB: Store error types
//
// The error taxonomy of every record operation. Nothing here is retried
// internally; each variant reaches the direct caller.

use thiserror::Error;

use super::models::{RecordFailure, RecordId};
use crate::cipher::CipherError;
use crate::keys::KeyError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Encryption key unavailable: {0}")]
    KeyUnavailable(#[from] KeyError),

    #[error("Decryption failed for record {0}")]
    DecryptionFailed(RecordId),

    #[error("Payload of record {id} is corrupt: {reason}")]
    PayloadCorrupt { id: RecordId, reason: String },

    #[error("Duplicate record id: {0}")]
    DuplicateId(RecordId),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("{} record(s) could not be read: {}", .failures.len(), join_failures(.failures))]
    Unreadable { failures: Vec<RecordFailure> },

    #[error("Write attempted in a read-only transaction")]
    ReadOnlyTransaction,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::TransactionFailed(e.to_string())
    }
}

impl StoreError {
    /// Map an encryption-side cipher error.
    pub(crate) fn from_seal(e: CipherError) -> Self {
        match e {
            CipherError::Serialization(e) => StoreError::Serialization(e),
            other => StoreError::EncryptionFailed(other.to_string()),
        }
    }
}

impl RecordFailure {
    /// Convert a per-record failure into the error of a single-record read.
    pub fn into_error(self) -> StoreError {
        match self.error {
            CipherError::DecryptionFailed => StoreError::DecryptionFailed(self.id),
            CipherError::PayloadCorrupt(reason) => StoreError::PayloadCorrupt {
                id: self.id,
                reason,
            },
            CipherError::EncryptionFailed(reason) => StoreError::EncryptionFailed(reason),
            CipherError::Serialization(e) => StoreError::Serialization(e),
        }
    }
}

fn join_failures(failures: &[RecordFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
