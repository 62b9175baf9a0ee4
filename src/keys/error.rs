// SecureDB: Key management error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Key slot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored key is malformed: {0}")]
    Malformed(String),

    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Key initialization task failed: {0}")]
    Task(String),
}
