// ============================================
// File: crates/socialbox-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types specific to moving frames between a client and a
//! server: header parsing, HTTP exchange failures and listener setup.
//!
//! ## Error Categories
//! 1. **Frame Errors**: missing/invalid headers, oversized bodies
//! 2. **Network Errors**: connect/send/receive failures
//! 3. **Listener Errors**: bind failures, shutdown
//!
//! ## ⚠️ Important Note for Next Developer
//! - Frame errors are the caller's fault and map to HTTP 400
//! - Network errors are reported, never retried here
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use socialbox_common::CommonError;
use socialbox_core::CoreError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Frame Errors
    // ========================================
    /// A required header is absent.
    #[error("Missing header: {name}")]
    MissingHeader {
        /// Header name
        name: &'static str,
    },

    /// A header is present but unusable.
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The body exceeds the configured limit.
    #[error("Payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge {
        /// Actual body size
        size: usize,
        /// Configured limit
        limit: usize,
    },

    // ========================================
    // Network Errors
    // ========================================
    /// The endpoint could not be reached.
    #[error("Failed to reach {endpoint}: {reason}")]
    ConnectFailed {
        /// Endpoint URL
        endpoint: String,
        /// Why the exchange failed
        reason: String,
    },

    /// The endpoint answered but the body could not be read.
    #[error("Failed to receive from {endpoint}: {reason}")]
    ReceiveFailed {
        /// Endpoint URL
        endpoint: String,
        /// Why reading failed
        reason: String,
    },

    /// No transport is registered for the endpoint.
    #[error("No route to endpoint {endpoint}")]
    NoRoute {
        /// Endpoint URL
        endpoint: String,
    },

    // ========================================
    // Listener Errors
    // ========================================
    /// Failed to bind the listener.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: SocketAddr,
        /// Why binding failed
        reason: String,
    },

    /// Transport is shutting down.
    #[error("Transport is shutting down")]
    ShuttingDown,

    // ========================================
    // Wrapped Errors
    // ========================================
    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error from the core crate.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from the common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `InvalidHeader` error.
    pub fn invalid_header(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidHeader {
            name,
            reason: reason.into(),
        }
    }

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ReceiveFailed` error.
    pub fn receive_failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReceiveFailed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if the frame itself was malformed.
    #[must_use]
    pub const fn is_frame_error(&self) -> bool {
        matches!(
            self,
            Self::MissingHeader { .. } | Self::InvalidHeader { .. } | Self::PayloadTooLarge { .. }
        )
    }

    /// Returns `true` if this is a network-related error.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. }
                | Self::ReceiveFailed { .. }
                | Self::NoRoute { .. }
                | Self::BindFailed { .. }
        )
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::connect_failed("https://rpc.teapot.com/", "connection refused");
        assert!(err.to_string().contains("rpc.teapot.com"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_classification() {
        let missing = TransportError::MissingHeader {
            name: "Request-Type",
        };
        assert!(missing.is_frame_error());
        assert!(!missing.is_network_error());

        let net = TransportError::NoRoute {
            endpoint: "https://nowhere/".into(),
        };
        assert!(net.is_network_error());
        assert!(!net.is_frame_error());
    }
}
