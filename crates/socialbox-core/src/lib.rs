// ============================================
// File: crates/socialbox-core/src/lib.rs
// ============================================
//! # Socialbox Core - Protocol & Cryptography Library
//!
//! ## Creation Reason
//! Provides the protocol definitions and cryptographic operations shared by
//! every Socialbox server and client: the handshake primitives, the RPC
//! envelope, peer addressing and the session flag model.
//!
//! ## Main Functionality
//!
//! ### Crypto Module ([`crypto`])
//! - Key types (`IdentityKeyPair`, `ExchangeKeyPair`, `SessionKey`)
//! - Handshake cryptography (INIT signatures, signed DHE replies)
//! - Envelope encryption (XChaCha20-Poly1305)
//! - Key derivation (HKDF-SHA256) and password hashing (Argon2id)
//!
//! ### Protocol Module ([`protocol`])
//! - Request types and handshake payloads
//! - RPC request/response envelope and standard error codes
//! - `SecureCodec` sealing RPC batches under a session key
//!
//! ### Addressing & Flags
//! - [`address`]: `PeerAddress` (`username@domain`)
//! - [`flags`]: `SessionFlag` and the completion predicate
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              socialbox-server                       │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │   socialbox-client ──► socialbox-transport          │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │             socialbox-core   ◄── You are here       │
//! │                    ▼                                │
//! │             socialbox-common                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Guarantees
//! - **Confidentiality**: XChaCha20-Poly1305 authenticated encryption
//! - **Session binding**: the session id is the AEAD associated data
//! - **Authenticity**: Ed25519 signatures on INIT and DHE
//! - **Forward Secrecy**: fresh X25519 exchange keys per DHE
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses audited RustCrypto/dalek implementations
//! - NEVER implement custom crypto primitives
//! - ALL secret key types MUST implement Zeroize
//! - Wire changes MUST bump `PROTOCOL_VERSION`
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod address;
pub mod crypto;
pub mod error;
pub mod flags;
pub mod protocol;

// Re-export commonly used items
pub use address::PeerAddress;
pub use crypto::{
    ExchangeKeyPair, HandshakeCrypto, IdentityKeyPair, IdentityPublicKey, SessionKey,
};
pub use error::{CoreError, Result};
pub use flags::{is_complete, FlagSet, SessionFlag};
pub use protocol::{
    RequestType, RpcError, RpcRequest, RpcResponse, SecureCodec, StandardError,
    PROTOCOL_VERSION,
};
