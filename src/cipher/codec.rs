// SecureDB: Cipher Codec
//
// Byte convention: the plaintext of a record is the UTF-8 encoding of the
// JSON serialization of its payload. Decryption is all-or-nothing; a tag
// failure never yields partial plaintext.

use aes_gcm::aead::Aead;
use aes_gcm::Nonce;
use rand::RngCore;
use serde_json::Value;
use zeroize::Zeroizing;

use super::CipherError;
use crate::keys::EncryptionKey;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Output of one encryption: the nonce it used and the ciphertext with tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Generate a random 12-byte nonce.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` under `key` with a fresh nonce.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<Sealed, CipherError> {
    let nonce = generate_nonce();
    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    Ok(Sealed { nonce, ciphertext })
}

/// Decrypt and authenticate `ciphertext` (tag appended) under `key` and `nonce`.
pub fn decrypt(
    key: &EncryptionKey,
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    if nonce.len() != NONCE_LEN || ciphertext.len() < TAG_LEN {
        return Err(CipherError::DecryptionFailed);
    }

    key.cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CipherError::DecryptionFailed)
}

pub fn encode_payload(payload: &Value) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    Ok(Zeroizing::new(serde_json::to_vec(payload)?))
}

pub fn decode_payload(bytes: &[u8]) -> Result<Value, CipherError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| CipherError::PayloadCorrupt(format!("invalid UTF-8: {}", e)))?;
    serde_json::from_str(text)
        .map_err(|e| CipherError::PayloadCorrupt(format!("invalid JSON: {}", e)))
}

/// Serialize and encrypt a JSON payload.
pub fn seal_payload(key: &EncryptionKey, payload: &Value) -> Result<Sealed, CipherError> {
    let plaintext = encode_payload(payload)?;
    encrypt(key, &plaintext)
}

/// Decrypt and parse a JSON payload.
pub fn open_payload(
    key: &EncryptionKey,
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Value, CipherError> {
    let plaintext = decrypt(key, nonce, ciphertext)?;
    decode_payload(&plaintext)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
