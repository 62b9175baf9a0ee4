// SecureDB: Feed error types
//
// Everything that can stop the live feed bridge.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed document is not valid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to bind feed server: {0}")]
    Bind(String),

    #[error("Feed task failed: {0}")]
    Task(String),
}
