// SecureDB: Store Module
//
// Encrypted record storage. Payloads are sealed with AES-256-GCM before they
// reach a backing store; backends hold only ids, nonces, and ciphertext.

mod backend;
mod db;
mod error;
mod memory;
mod models;
mod repository;

pub use backend::{BackingStore, StoreTx};
pub use db::Database;
pub use error::StoreError;
pub use memory::MemoryBackend;
pub use models::{
    EncryptedRecord, ReadReport, Record, RecordFailure, RecordId, TxMode, UpdateOutcome,
};
pub use repository::RecordStore;
