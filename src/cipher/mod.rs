// SecureDB: Cipher Module
//
// Stateless AES-256-GCM transform. Every encryption draws a fresh random
// 96-bit nonce; the 16-byte tag is appended to the ciphertext.

mod codec;
mod error;

pub use codec::{
    decode_payload, decrypt, encode_payload, encrypt, generate_nonce, open_payload,
    seal_payload, Sealed, NONCE_LEN, TAG_LEN,
};
pub use error::CipherError;
