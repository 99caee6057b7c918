// ============================================
// File: crates/socialbox-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Key types used by the Socialbox handshake with proper security
//! properties (zeroize on drop, redacted `Debug`, constant-time equality).
//!
//! ## Main Functionality
//! - `IdentityKeyPair` / `IdentityPublicKey`: long-term Ed25519 keys. The
//!   public half of a server identity is the trust key published in the
//!   domain's discovery record (`sig:<base64url>`).
//! - `ExchangeKeyPair`: X25519 key pair for the DHE step
//! - `SessionKey`: symmetric key derived from the exchange
//! - `derive_shared_secret`: raw Diffie-Hellman on byte arrays
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  IdentityKeyPair (Long-term)                               │
//! │  ├─ Server: loaded from the key file, advertised via DNS   │
//! │  └─ Client: signs the session initiation request           │
//! │                                                            │
//! │  ExchangeKeyPair (Per DHE run)                             │
//! │  ├─ Generated fresh for every DHE (including re-keying)    │
//! │  └─ Dropped once the session key is derived                │
//! │                                                            │
//! │  SessionKey (Per session key epoch)                        │
//! │  └─ Encrypts every RPC body until the next DHE             │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private keys must never be logged or serialized carelessly
//! - `ExchangeKeyPair` keeps a `StaticSecret` so DH can be repeated with the
//!   same pair; callers still generate a new pair per exchange
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD};
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{
    ED25519_PUBLIC_KEY_SIZE, ED25519_SIGNATURE_SIZE, SESSION_KEY_SIZE, SIGNING_KEY_ALGORITHM,
    X25519_PUBLIC_KEY_SIZE,
};
use crate::error::{CoreError, Result};

// ============================================
// Byte helpers
// ============================================

/// Copies a slice into a fixed-size array, rejecting wrong lengths.
pub(crate) fn to_array<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        CoreError::invalid_key(format!("{what}: expected {N} bytes, got {}", bytes.len()))
    })
}

/// Decodes base64 in either the standard or the URL-safe alphabet.
pub(crate) fn decode_base64_any(text: &str) -> Result<Vec<u8>> {
    let trimmed = text.trim().trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| BASE64.decode(text.trim()))
        .map_err(|e| socialbox_common::CommonError::from(e).into())
}

// ============================================
// IdentityKeyPair (Ed25519)
// ============================================

/// Long-term Ed25519 identity key pair for signing.
///
/// # Example
/// ```
/// use socialbox_core::crypto::IdentityKeyPair;
///
/// let identity = IdentityKeyPair::generate();
/// let signature = identity.sign(b"hello");
/// assert!(identity.public_key().verify(b"hello", &signature).is_ok());
/// ```
pub struct IdentityKeyPair {
    signing_key: SigningKey,
}

impl IdentityKeyPair {
    /// Generates a new random identity key pair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Creates an identity key pair from a 32-byte private seed.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the length is wrong.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut seed: [u8; 32] = to_array(bytes, "Ed25519 private key")?;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self { signing_key })
    }

    /// Returns the public key component.
    #[must_use]
    pub fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey(self.signing_key.verifying_key())
    }

    /// Signs a message using this identity.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; ED25519_SIGNATURE_SIZE] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Exports the private seed for secure storage.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Clone for IdentityKeyPair {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

// ============================================
// IdentityPublicKey
// ============================================

/// Public component of an Ed25519 identity key.
///
/// Serialized as standard base64 in JSON payloads and as
/// `sig:<base64url-no-pad>` inside discovery records.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IdentityPublicKey(VerifyingKey);

impl IdentityPublicKey {
    /// Creates a public key from raw bytes.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the bytes are not a valid Ed25519 point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; ED25519_PUBLIC_KEY_SIZE] = to_array(bytes, "Ed25519 public key")?;
        VerifyingKey::from_bytes(&arr)
            .map(Self)
            .map_err(|_| CoreError::invalid_key("Ed25519 public key is not a valid point"))
    }

    /// Parses a standard or URL-safe base64 encoded key.
    ///
    /// # Errors
    /// Returns an error if decoding fails or the key is invalid.
    pub fn from_base64(text: &str) -> Result<Self> {
        Self::from_bytes(&decode_base64_any(text)?)
    }

    /// Parses the `<algorithm>:<key>` form used by discovery records.
    ///
    /// # Errors
    /// Returns `InvalidKey` for an unsupported algorithm or bad key bytes.
    pub fn from_record_key(text: &str) -> Result<Self> {
        let (algorithm, key) = text
            .split_once(':')
            .ok_or_else(|| CoreError::invalid_key("record key is missing '<algorithm>:'"))?;
        if algorithm != SIGNING_KEY_ALGORITHM {
            return Err(CoreError::invalid_key(format!(
                "unsupported record key algorithm '{algorithm}'"
            )));
        }
        Self::from_base64(key)
    }

    /// Formats the key as `sig:<base64url-no-pad>` for a discovery record.
    #[must_use]
    pub fn to_record_key(&self) -> String {
        format!(
            "{SIGNING_KEY_ALGORITHM}:{}",
            URL_SAFE_NO_PAD.encode(self.0.as_bytes())
        )
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ED25519_PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    /// Verifies a signature against this public key.
    ///
    /// # Errors
    /// Returns `SignatureVerification` if verification fails.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let sig: [u8; ED25519_SIGNATURE_SIZE] =
            signature.try_into().map_err(|_| CoreError::SignatureVerification)?;
        self.0
            .verify(message, &Signature::from_bytes(&sig))
            .map_err(|_| CoreError::SignatureVerification)
    }
}

impl fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.as_bytes();
        write!(
            f,
            "IdentityPublicKey({:02x}{:02x}{:02x}{:02x}...)",
            bytes[0], bytes[1], bytes[2], bytes[3]
        )
    }
}

impl fmt::Display for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE64.encode(self.0.as_bytes()))
    }
}

impl Serialize for IdentityPublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&BASE64.encode(self.0.as_bytes()))
    }
}

impl<'de> Deserialize<'de> for IdentityPublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Self::from_base64(&text).map_err(serde::de::Error::custom)
    }
}

// ============================================
// ExchangeKeyPair (X25519)
// ============================================

/// X25519 key pair for the Diffie-Hellman exchange.
///
/// # Example
/// ```
/// use socialbox_core::crypto::ExchangeKeyPair;
///
/// let alice = ExchangeKeyPair::generate();
/// let bob = ExchangeKeyPair::generate();
///
/// let a = alice.diffie_hellman(&bob.public_key_bytes()).unwrap();
/// let b = bob.diffie_hellman(&alice.public_key_bytes()).unwrap();
/// assert_eq!(a, b);
/// ```
pub struct ExchangeKeyPair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl ExchangeKeyPair {
    /// Generates a new random exchange key pair.
    #[must_use]
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuilds a key pair from its 32-byte private scalar.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the length is wrong.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self> {
        let mut raw: [u8; 32] = to_array(bytes, "X25519 private key")?;
        let secret = StaticSecret::from(raw);
        raw.zeroize();
        let public = X25519PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    /// Returns the public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; X25519_PUBLIC_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// Returns the private scalar bytes.
    #[must_use]
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Computes the shared secret with a peer's public key.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the peer key is a low-order point (the result
    /// would be all zeros and independent of our secret).
    pub fn diffie_hellman(&self, peer_public: &[u8]) -> Result<[u8; 32]> {
        let peer: [u8; X25519_PUBLIC_KEY_SIZE] = to_array(peer_public, "X25519 public key")?;
        let shared = self.secret.diffie_hellman(&X25519PublicKey::from(peer));
        if !shared.was_contributory() {
            return Err(CoreError::invalid_key("X25519 public key is a low-order point"));
        }
        Ok(*shared.as_bytes())
    }
}

impl fmt::Debug for ExchangeKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.public.as_bytes();
        f.debug_struct("ExchangeKeyPair")
            .field(
                "public",
                &format_args!(
                    "{:02x}{:02x}{:02x}{:02x}...",
                    bytes[0], bytes[1], bytes[2], bytes[3]
                ),
            )
            .finish_non_exhaustive()
    }
}

/// Derives the Diffie-Hellman shared secret from raw key bytes.
///
/// # Errors
/// Returns `InvalidKey` for wrong lengths or a low-order peer key.
pub fn derive_shared_secret(own_private: &[u8], peer_public: &[u8]) -> Result<[u8; 32]> {
    ExchangeKeyPair::from_private_bytes(own_private)?.diffie_hellman(peer_public)
}

// ============================================
// SessionKey
// ============================================

/// Symmetric session key for RPC envelope encryption.
///
/// # Derivation
/// ```text
/// shared_secret = X25519(client_exchange, server_exchange)
/// session_key   = HKDF-SHA256(
///     ikm:  shared_secret,
///     salt: "socialbox-v1",
///     info: "socialbox-session-key" || session_id
/// )
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Creates a session key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a session key from a slice, rejecting wrong lengths.
    ///
    /// # Errors
    /// Returns `InvalidKey` if `bytes` is not 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        to_array(bytes, "session key").map(Self)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SessionKey {}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_sign_verify() {
        let kp = IdentityKeyPair::generate();
        let signature = kp.sign(b"test message");
        assert!(kp.public_key().verify(b"test message", &signature).is_ok());
        assert!(kp.public_key().verify(b"wrong message", &signature).is_err());
        assert!(kp.public_key().verify(b"test message", &signature[..10]).is_err());
    }

    #[test]
    fn test_identity_keypair_roundtrip() {
        let kp = IdentityKeyPair::generate();
        let restored = IdentityKeyPair::from_bytes(&kp.to_bytes()).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
        assert!(IdentityKeyPair::from_bytes(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_record_key_roundtrip() {
        let kp = IdentityKeyPair::generate();
        let text = kp.public_key().to_record_key();
        assert!(text.starts_with("sig:"));
        assert!(!text.contains('='));
        assert_eq!(IdentityPublicKey::from_record_key(&text).unwrap(), kp.public_key());
    }

    #[test]
    fn test_base64_alphabets_accepted() {
        let raw = decode_base64_any("g59Cf8j1wmQmRg1MkveYbpdiZ-1-_hFU9eRRJmQAwmc").unwrap();
        assert_eq!(raw.len(), 32);

        let standard = BASE64.encode(&raw);
        assert_eq!(decode_base64_any(&standard).unwrap(), raw);
    }

    #[test]
    fn test_record_key_rejects_bad_input() {
        assert!(IdentityPublicKey::from_record_key("g59Cf8j1wmQmRg1Mkve").is_err());
        assert!(IdentityPublicKey::from_record_key("rsa:AAAA").is_err());
        assert!(IdentityPublicKey::from_record_key("sig:AAAA").is_err());
    }

    #[test]
    fn test_dh_symmetry_with_reused_pairs() {
        let alice = ExchangeKeyPair::generate();
        let bob = ExchangeKeyPair::generate();

        let first_a = alice.diffie_hellman(&bob.public_key_bytes()).unwrap();
        let first_b = bob.diffie_hellman(&alice.public_key_bytes()).unwrap();
        let second_a = alice.diffie_hellman(&bob.public_key_bytes()).unwrap();
        let second_b = bob.diffie_hellman(&alice.public_key_bytes()).unwrap();

        assert_eq!(first_a, first_b);
        assert_eq!(first_a, second_a);
        assert_eq!(second_a, second_b);
    }

    #[test]
    fn test_derive_shared_secret_from_bytes() {
        let alice = ExchangeKeyPair::generate();
        let bob = ExchangeKeyPair::generate();
        let via_bytes =
            derive_shared_secret(&alice.private_key_bytes(), &bob.public_key_bytes()).unwrap();
        assert_eq!(via_bytes, bob.diffie_hellman(&alice.public_key_bytes()).unwrap());
    }

    #[test]
    fn test_low_order_point_rejected() {
        let kp = ExchangeKeyPair::generate();
        assert!(kp.diffie_hellman(&[0u8; 32]).is_err());
        assert!(kp.diffie_hellman(&[1u8; 16]).is_err());
    }

    #[test]
    fn test_session_key_debug_redacted() {
        let key = SessionKey::from_bytes([0x42; 32]);
        assert_eq!(format!("{key:?}"), "SessionKey([REDACTED])");
        assert_eq!(key, SessionKey::from_slice(&[0x42; 32]).unwrap());
        assert!(SessionKey::from_slice(&[0x42; 16]).is_err());
    }

    #[test]
    fn test_identity_public_key_serialization() {
        let public = IdentityKeyPair::generate().public_key();
        let json = serde_json::to_string(&public).unwrap();
        let restored: IdentityPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(public, restored);
    }
}
