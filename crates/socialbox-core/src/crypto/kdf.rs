// ============================================
// File: crates/socialbox-core/src/crypto/kdf.rs
// ============================================
//! # Key Derivation Functions
//!
//! ## Main Functionality
//! - `derive_session_key`: HKDF-SHA256 over the X25519 shared secret, bound
//!   to the session id so a key can never be replayed onto another session
//!
//! ## Last Modified
//! v0.1.0 - Session-bound derivation

use hkdf::Hkdf;
use sha2::Sha256;
use tracing::trace;

use socialbox_common::SessionId;

use super::{HKDF_INFO_PREFIX, HKDF_SALT, SESSION_KEY_SIZE};
use crate::crypto::SessionKey;
use crate::error::{CoreError, Result};

/// Derives a session key from the X25519 shared secret.
///
/// # Arguments
/// * `shared_secret` - 32-byte Diffie-Hellman output
/// * `session_id` - Session the key belongs to (part of the HKDF info)
///
/// # Errors
/// Returns `KeyDerivation` if HKDF expansion fails.
pub fn derive_session_key(shared_secret: &[u8; 32], session_id: &SessionId) -> Result<SessionKey> {
    let mut info = Vec::with_capacity(HKDF_INFO_PREFIX.len() + 16);
    info.extend_from_slice(HKDF_INFO_PREFIX);
    info.extend_from_slice(session_id.as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), shared_secret);
    let mut key_bytes = [0u8; SESSION_KEY_SIZE];
    hk.expand(&info, &mut key_bytes)
        .map_err(|_| CoreError::KeyDerivation {
            reason: "HKDF expansion failed".into(),
        })?;

    trace!(session_id = %session_id, "Session key derived");
    Ok(SessionKey::from_bytes(key_bytes))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let id = SessionId::generate();
        let a = derive_session_key(&[7u8; 32], &id).unwrap();
        let b = derive_session_key(&[7u8; 32], &id).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derivation_bound_to_session() {
        let secret = [9u8; 32];
        let a = derive_session_key(&secret, &SessionId::generate()).unwrap();
        let b = derive_session_key(&secret, &SessionId::generate()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_derivation_depends_on_secret() {
        let id = SessionId::generate();
        let a = derive_session_key(&[1u8; 32], &id).unwrap();
        let b = derive_session_key(&[2u8; 32], &id).unwrap();
        assert_ne!(a, b);
    }
}
