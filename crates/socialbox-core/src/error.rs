// ============================================
// File: crates/socialbox-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Error types for cryptography, peer addressing and protocol framing in
//! the Socialbox core crate.
//!
//! ## Error Categories
//! 1. **Crypto Errors**: key handling, signatures, AEAD, password hashing
//! 2. **Address Errors**: `username@domain` grammar violations
//! 3. **Protocol Errors**: unknown request types, malformed payloads,
//!    stale handshake timestamps
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material or password hashes in error messages
//! - `is_session_fatal()` decides whether the server tears the session
//!   down; keep it in sync when adding crypto variants
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use socialbox_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for protocol and cryptographic operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Key material has the wrong size or is not a valid point.
    #[error("Invalid key: {context}")]
    InvalidKey {
        /// Which key was rejected
        context: String,
    },

    /// Signature verification failed.
    #[error("Signature verification failed")]
    SignatureVerification,

    /// Encryption operation failed.
    #[error("Encryption failed: {context}")]
    Encryption {
        /// What was being encrypted
        context: String,
    },

    /// Decryption operation failed (tampered data or wrong key).
    #[error("Decryption failed: authentication error")]
    Decryption,

    /// Key derivation failed.
    #[error("Key derivation failed: {reason}")]
    KeyDerivation {
        /// Why derivation failed
        reason: String,
    },

    /// Password hashing or hash parsing failed.
    #[error("Password hash error: {reason}")]
    PasswordHash {
        /// Why hashing failed
        reason: String,
    },

    // ========================================
    // Address Errors
    // ========================================

    /// Text is not a valid `username@domain` peer address.
    #[error("Invalid peer address '{input}': {reason}")]
    InvalidAddress {
        /// The rejected input
        input: String,
        /// What's wrong with it
        reason: String,
    },

    // ========================================
    // Protocol Errors
    // ========================================

    /// Unknown or unsupported request type discriminator.
    #[error("Unknown request type: '{0}'")]
    UnknownRequestType(String),

    /// Message is malformed or has an unexpected shape.
    #[error("Malformed message: {reason}")]
    MalformedMessage {
        /// What's wrong with the message
        reason: String,
    },

    /// Timestamp validation failed.
    #[error("Invalid timestamp: {reason}")]
    InvalidTimestamp {
        /// Why timestamp is invalid
        reason: String,
    },

    /// Unknown session flag name.
    #[error("Unknown session flag: '{0}'")]
    UnknownFlag(String),

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    /// Creates an `InvalidKey` error.
    pub fn invalid_key(context: impl Into<String>) -> Self {
        Self::InvalidKey {
            context: context.into(),
        }
    }

    /// Creates a `MalformedMessage` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidAddress` error.
    pub fn invalid_address(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidTimestamp` error.
    pub fn invalid_timestamp(reason: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            reason: reason.into(),
        }
    }

    /// Creates a `PasswordHash` error.
    pub fn password_hash(reason: impl Into<String>) -> Self {
        Self::PasswordHash {
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this is a cryptographic error.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKey { .. }
                | Self::SignatureVerification
                | Self::Encryption { .. }
                | Self::Decryption
                | Self::KeyDerivation { .. }
                | Self::PasswordHash { .. }
        )
    }

    /// Returns `true` if this error was caused by malformed caller input.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. }
                | Self::UnknownRequestType(_)
                | Self::MalformedMessage { .. }
                | Self::UnknownFlag(_)
        )
    }

    /// Returns `true` if a session that produced this error must be closed.
    ///
    /// Tampered ciphertext and bad signatures mean the channel can no
    /// longer be trusted.
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        matches!(self, Self::SignatureVerification | Self::Decryption)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(format!("JSON: {err}"))
    }
}

// ============================================
// Tests
// ============================================
