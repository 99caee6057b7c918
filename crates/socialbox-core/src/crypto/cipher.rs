// ============================================
// File: crates/socialbox-core/src/crypto/cipher.rs
// ============================================
//! # Envelope Encryption
//!
//! ## Creation Reason
//! Every RPC body after the DHE step is opaque ciphertext. This module is
//! the single place that seals and opens those bodies.
//!
//! ## Ciphertext Format
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │ Nonce (24 bytes, random)                           │
//! ├────────────────────────────────────────────────────┤
//! │ XChaCha20 ciphertext (variable)                    │
//! │ └─ Poly1305 tag (16 bytes)                         │
//! └────────────────────────────────────────────────────┘
//! AAD = session id bytes (binds the body to its session)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Keys of any length other than 32 bytes are rejected, never padded
//! - A decryption failure is session-fatal at the server
//!
//! ## Last Modified
//! v0.1.0 - Initial envelope cipher

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;

use super::{POLY1305_TAG_SIZE, SESSION_KEY_SIZE, XCHACHA_NONCE_SIZE};
use crate::error::{CoreError, Result};

/// Bytes added to every plaintext by [`encrypt`].
pub const ENCRYPTION_OVERHEAD: usize = XCHACHA_NONCE_SIZE + POLY1305_TAG_SIZE;

fn cipher_for(key: &[u8]) -> Result<XChaCha20Poly1305> {
    if key.len() != SESSION_KEY_SIZE {
        return Err(CoreError::invalid_key(format!(
            "session key: expected {SESSION_KEY_SIZE} bytes, got {}",
            key.len()
        )));
    }
    XChaCha20Poly1305::new_from_slice(key).map_err(|_| CoreError::invalid_key("session key"))
}

/// Encrypts `plaintext` under `key`, authenticating `aad`.
///
/// # Errors
/// - `InvalidKey`: key is not 32 bytes
/// - `Encryption`: the AEAD refused the input
///
/// # Example
/// ```
/// use socialbox_core::crypto::{decrypt, encrypt};
///
/// let key = [3u8; 32];
/// let sealed = encrypt(&key, b"hello", b"session").unwrap();
/// assert_eq!(decrypt(&key, &sealed, b"session").unwrap(), b"hello");
/// ```
pub fn encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CoreError::Encryption {
            context: "XChaCha20-Poly1305 encryption failed".into(),
        })?;

    let mut out = Vec::with_capacity(XCHACHA_NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts data produced by [`encrypt`].
///
/// # Errors
/// - `InvalidKey`: key is not 32 bytes
/// - `Decryption`: truncated input, tampered data, wrong key or wrong AAD
pub fn decrypt(key: &[u8], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;
    if sealed.len() < ENCRYPTION_OVERHEAD {
        return Err(CoreError::Decryption);
    }
    let (nonce, ciphertext) = sealed.split_at(XCHACHA_NONCE_SIZE);
    cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CoreError::Decryption)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = [0x42u8; 32];
        let sealed = encrypt(&key, b"secret rpc body", b"aad").unwrap();
        assert_eq!(sealed.len(), b"secret rpc body".len() + ENCRYPTION_OVERHEAD);
        assert_eq!(decrypt(&key, &sealed, b"aad").unwrap(), b"secret rpc body");
    }

    #[test]
    fn test_nonce_is_random() {
        let key = [1u8; 32];
        let a = encrypt(&key, b"same", b"").unwrap();
        let b = encrypt(&key, b"same", b"").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tamper_detected() {
        let key = [0x42u8; 32];
        let mut sealed = encrypt(&key, b"payload", b"aad").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(decrypt(&key, &sealed, b"aad"), Err(CoreError::Decryption)));
    }

    #[test]
    fn test_wrong_key_or_aad_rejected() {
        let sealed = encrypt(&[1u8; 32], b"payload", b"aad").unwrap();
        assert!(decrypt(&[2u8; 32], &sealed, b"aad").is_err());
        assert!(decrypt(&[1u8; 32], &sealed, b"other").is_err());
    }

    #[test]
    fn test_bad_key_length() {
        assert!(matches!(
            encrypt(&[0u8; 16], b"x", b""),
            Err(CoreError::InvalidKey { .. })
        ));
        assert!(matches!(
            decrypt(&[0u8; 33], &[0u8; 64], b""),
            Err(CoreError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_truncated_input() {
        assert!(matches!(
            decrypt(&[0u8; 32], &[0u8; 10], b""),
            Err(CoreError::Decryption)
        ));
    }
}
