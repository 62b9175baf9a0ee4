// SecureDB: Library root
//
// Re-exports the key, cipher, store, feed, gateway, and CLI modules.

pub mod cipher;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod keys;
pub mod store;

pub use error::{Result, SecureDbError};
