// ============================================
// File: crates/socialbox-client/src/error.rs
// ============================================
//! # Client Error Types
//!
//! ## Creation Reason
//! Separates the ways a call can fail on the client side: the peer's domain
//! could not be resolved or trusted, the handshake broke, the server
//! answered with a standard error, or the transport gave up.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Rpc` carries the server's error untouched; use `rpc_code()` to branch
//! - Nothing here is retried automatically
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use socialbox_common::CommonError;
use socialbox_core::{CoreError, RpcError, StandardError};
use socialbox_transport::TransportError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error types.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A discovery record could not be parsed.
    #[error("Invalid discovery record: {reason}")]
    InvalidRecord {
        /// Why the record was rejected
        reason: String,
    },

    /// A domain could not be resolved to a trusted endpoint.
    #[error("Failed to resolve {domain}: {reason}")]
    Resolution {
        /// Domain being resolved
        domain: String,
        /// Why resolution failed
        reason: String,
    },

    /// The server rejected the handshake or answered it incorrectly.
    #[error("Handshake with {endpoint} failed: {reason}")]
    Handshake {
        /// Endpoint being contacted
        endpoint: String,
        /// What went wrong
        reason: String,
    },

    /// The server answered a call with a standard error.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// A batch reply did not contain the response for a request id.
    #[error("No response for request {id}")]
    MissingResponse {
        /// Request id
        id: u32,
    },

    /// A result did not have the expected shape.
    #[error("Unexpected result from {method}: {reason}")]
    UnexpectedResult {
        /// Method called
        method: String,
        /// What was wrong with it
        reason: String,
    },

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Cryptographic or protocol failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from the common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ClientError {
    /// Creates an `InvalidRecord` error.
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// Creates a `Resolution` error.
    pub fn resolution(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Handshake` error.
    pub fn handshake(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Handshake {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `UnexpectedResult` error.
    pub fn unexpected(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnexpectedResult {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failure happened while resolving or trusting
    /// a domain.
    #[must_use]
    pub const fn is_resolution_error(&self) -> bool {
        matches!(self, Self::Resolution { .. } | Self::InvalidRecord { .. })
    }

    /// Returns the standard error code if the server produced this error.
    #[must_use]
    pub const fn rpc_code(&self) -> Option<StandardError> {
        match self {
            Self::Rpc(err) => Some(err.code),
            _ => None,
        }
    }

    /// Converts this error into the standard error reported to a caller
    /// further up a federation chain.
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::Rpc(err) => err.clone(),
            Self::Resolution { .. } | Self::InvalidRecord { .. } | Self::Handshake { .. } => {
                RpcError::new(StandardError::ResolutionFailed, self.to_string())
            }
            Self::Core(err) if err.is_crypto_error() => {
                RpcError::new(StandardError::CryptographicError, self.to_string())
            }
            Self::Transport(_) => RpcError::new(StandardError::ServerUnavailable, self.to_string()),
            Self::MissingResponse { .. }
            | Self::UnexpectedResult { .. }
            | Self::Core(_)
            | Self::Common(_) => RpcError::new(StandardError::Unknown, self.to_string()),
        }
    }
}

// ============================================
// Tests
// ============================================
