// SecureDB: Top-level error types
//
// Aggregates the module errors into one enum for the application boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecureDbError {
    #[error("Key error: {0}")]
    Key(#[from] crate::keys::KeyError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Feed error: {0}")]
    Feed(#[from] crate::feed::FeedError),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SecureDbError>;
