// SecureDB: Cipher error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Authentication tag did not verify: tampered data, wrong key, or wrong nonce.
    #[error("Decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    /// Decryption succeeded but the plaintext is not UTF-8 JSON.
    #[error("Payload corrupt: {0}")]
    PayloadCorrupt(String),

    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
