// ============================================
// File: crates/socialbox-core/src/crypto/password.rs
// ============================================
//! # Password Hashing
//!
//! ## Creation Reason
//! Peers never send a plaintext password. The client first reduces it to
//! `sha512_hex(password)`; that digest is what gets Argon2id-hashed when a
//! password is set and what is presented when authenticating.
//!
//! ## Main Functionality
//! - `hash_password` / `verify_password`: Argon2id PHC strings
//! - `sha512_hex`: client-side pre-hash
//! - `is_sha512_hex` / `is_password_hash`: validators for hash strings
//!   received as RPC parameters
//!
//! ## ⚠️ Important Note for Next Developer
//! - Stored hashes are PHC strings (`$argon2id$v=19$...`); the salt and
//!   parameters travel inside the string
//!
//! ## Last Modified
//! v0.1.0 - Argon2id hashing

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sha2::{Digest, Sha512};

use crate::error::{CoreError, Result};

/// Length of a hex encoded SHA-512 digest.
pub const SHA512_HEX_LEN: usize = 128;

/// Hashes `password` into an Argon2id PHC string with a random salt.
///
/// # Errors
/// Returns `PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::password_hash(e.to_string()))
}

/// Verifies `password` against a stored PHC string.
///
/// Returns `Ok(false)` on a mismatch.
///
/// # Errors
/// Returns `PasswordHash` if the stored hash cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| CoreError::password_hash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CoreError::password_hash(e.to_string())),
    }
}

/// Returns the lowercase hex SHA-512 digest of `input`.
#[must_use]
pub fn sha512_hex(input: &str) -> String {
    hex::encode(Sha512::digest(input.as_bytes()))
}

/// Checks that `value` looks like a hex SHA-512 digest.
#[must_use]
pub fn is_sha512_hex(value: &str) -> bool {
    value.len() == SHA512_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Checks that `value` is a PHC string from the Argon2 family.
#[must_use]
pub fn is_password_hash(value: &str) -> bool {
    PasswordHash::new(value).is_ok_and(|hash| hash.algorithm.as_str().starts_with("argon2"))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let digest = sha512_hex("correct horse");
        let stored = hash_password(&digest).unwrap();

        assert!(is_password_hash(&stored));
        assert!(verify_password(&digest, &stored).unwrap());
        assert!(!verify_password(&sha512_hex("wrong"), &stored).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(verify_password("x", "not a phc string").is_err());
    }

    #[test]
    fn test_sha512_validator() {
        let digest = sha512_hex("password");
        assert_eq!(digest.len(), SHA512_HEX_LEN);
        assert!(is_sha512_hex(&digest));
        assert!(is_sha512_hex(&digest.to_uppercase()));
        assert!(!is_sha512_hex(&digest[1..]));
        assert!(!is_sha512_hex(&format!("{}zz", &digest[2..])));
    }

    #[test]
    fn test_password_hash_validator() {
        assert!(!is_password_hash(&sha512_hex("x")));
        assert!(!is_password_hash("$pbkdf2-sha256$i=1000$c2FsdA$aGFzaA"));
    }
}
