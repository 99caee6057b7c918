// ============================================
// File: crates/socialbox-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes the cryptographic primitives of the Socialbox session layer,
//! built on audited RustCrypto / dalek implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: Ed25519 identity keys, X25519 exchange keys, session keys
//! - [`kdf`]: HKDF-SHA256 session key derivation bound to the session id
//! - [`cipher`]: XChaCha20-Poly1305 envelope encryption
//! - [`handshake`]: signed transcripts for session initiation and DHE
//! - [`password`]: Argon2id password hashing and hash-string validators
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                          │
//! │  Client                                        Server       │
//! │    │  init: identity key + timestamp, signed ───► │         │
//! │    │ ◄──────────────────────────── session id     │         │
//! │    │  dhe: X25519 exchange key ─────────────────► │         │
//! │    │ ◄──── X25519 exchange key + server signature │         │
//! │    │                                              │         │
//! │    │   X25519 ──► HKDF-SHA256(session id) ──► Session Key   │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    RPC Phase                                │
//! │  Session Key + random nonce ──► XChaCha20-Poly1305 ──► body │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER roll your own crypto
//! - ALL secret key types implement Zeroize
//! - Random nonces are only safe because XChaCha has a 192-bit nonce;
//!   do not switch to the 96-bit ChaCha20-Poly1305 without counters
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod cipher;
pub mod handshake;
pub mod kdf;
pub mod keys;
pub mod password;

pub use cipher::{decrypt, encrypt};
pub use handshake::{DefaultHandshakeCrypto, HandshakeCrypto};
pub use kdf::derive_session_key;
pub use keys::{ExchangeKeyPair, IdentityKeyPair, IdentityPublicKey, SessionKey};

// ============================================
// Constants
// ============================================

/// Size of Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of Ed25519 signature in bytes.
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Size of X25519 public key in bytes.
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of the symmetric session key in bytes.
pub const SESSION_KEY_SIZE: usize = 32;

/// Size of XChaCha20-Poly1305 nonce in bytes.
pub const XCHACHA_NONCE_SIZE: usize = 24;

/// Size of Poly1305 authentication tag in bytes.
pub const POLY1305_TAG_SIZE: usize = 16;

/// HKDF salt for session key derivation.
pub const HKDF_SALT: &[u8] = b"socialbox-v1";

/// HKDF info prefix for session key derivation.
pub const HKDF_INFO_PREFIX: &[u8] = b"socialbox-session-key";

/// Algorithm tag used when publishing an Ed25519 key in a discovery record.
pub const SIGNING_KEY_ALGORITHM: &str = "sig";
