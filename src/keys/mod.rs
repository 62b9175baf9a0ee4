// SecureDB: Key Module
//
// Owns the lifecycle of the single AES-256 record key: generation on first
// use, persistence of the raw bytes in a durable key slot, and loading on
// every later start. The key is never rotated or deleted here.

mod error;
mod key;
mod manager;
mod slot;

pub use error::KeyError;
pub use key::{EncryptionKey, KEY_LEN};
pub use manager::KeyManager;
pub use slot::{
    FileKeySlot, KeySlot, KeyringKeySlot, MemoryKeySlot, DEFAULT_KEY_SLOT, KEYRING_SERVICE,
};
