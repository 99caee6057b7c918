// ============================================
// File: crates/socialbox-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! ## Creation Reason
//! Every failure inside the server, from a bad config file to a refused
//! method call, is a `ServerError`. Method handlers return it, and the
//! dispatcher turns it into the wire-level `RpcError` in exactly one place.
//!
//! ## Wire Mapping
//! ```text
//! ServerError                      StandardError
//! ───────────────────────────────  ─────────────────────────
//! MethodNotFound                   RPC_METHOD_NOT_FOUND
//! InvalidArguments                 RPC_INVALID_ARGUMENTS
//! BadRequest, Core(input)          RPC_BAD_REQUEST
//! Core(crypto)                     CRYPTOGRAPHIC_ERROR
//! Session*                         SESSION_*
//! Unauthorized / Forbidden         UNAUTHORIZED / FORBIDDEN
//! NotFound / Captcha*              NOT_FOUND / CAPTCHA_*
//! Federation(..)                   from the client error
//! SessionLimitReached, Transport   SERVER_UNAVAILABLE
//! everything else                  INTERNAL_SERVER_ERROR (redacted)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Internal detail only reaches the wire when
//!   `security.display_internal_exceptions` is on
//! - Storage failures are always internal; never leak them as policy errors
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use socialbox_client::ClientError;
use socialbox_common::{CommonError, SessionId};
use socialbox_core::{CoreError, RpcError, StandardError};
use socialbox_transport::TransportError;

use crate::storage::StorageError;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// File path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// Configuration value is out of range.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Dotted field name
        field: String,
        /// Why it is invalid
        reason: String,
    },

    /// Server key file could not be read or written.
    #[error("Key file '{path}': {reason}")]
    KeyFile {
        /// File path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// Server failed to start.
    #[error("Server failed to start: {reason}")]
    StartupFailed {
        /// Why startup failed
        reason: String,
    },

    /// No method registered under this name.
    #[error("Method '{method}' does not exist")]
    MethodNotFound {
        /// Requested method
        method: String,
    },

    /// Parameters missing or of the wrong type.
    #[error("{reason}")]
    InvalidArguments {
        /// What is wrong with the parameters
        reason: String,
    },

    /// Request frame could not be understood.
    #[error("Bad request: {reason}")]
    BadRequest {
        /// What is wrong with the request
        reason: String,
    },

    /// No session with this id.
    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    /// Session exists but has no key yet.
    #[error("Session {0} has not completed the key exchange")]
    SessionNotEstablished(SessionId),

    /// Session was closed while the request was running.
    #[error("Session {0} was closed")]
    SessionClosed(SessionId),

    /// Too many live sessions.
    #[error("Session limit reached: max {limit} sessions")]
    SessionLimitReached {
        /// Configured maximum
        limit: usize,
    },

    /// Caller is not authenticated.
    #[error("{reason}")]
    Unauthorized {
        /// Why the call was refused
        reason: String,
    },

    /// Session state does not allow the call.
    #[error("{reason}")]
    Forbidden {
        /// Why the call was refused
        reason: String,
    },

    /// Requested entity does not exist.
    #[error("{what} was not found")]
    NotFound {
        /// What was looked up
        what: String,
    },

    /// No captcha to answer.
    #[error("No captcha is available for this peer")]
    CaptchaNotAvailable,

    /// Captcha is older than its lifetime.
    #[error("The captcha has expired")]
    CaptchaExpired,

    /// Unexpected internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Detail, redacted on the wire by default
        message: String,
    },

    /// Persistence port failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Federation client failure.
    #[error(transparent)]
    Federation(#[from] ClientError),

    /// Error from the common crate.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Cryptographic or protocol failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `KeyFile` error.
    pub fn key_file(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::KeyFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `StartupFailed` error.
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidArguments` error.
    pub fn invalid_arguments(reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            reason: reason.into(),
        }
    }

    /// Creates a `BadRequest` error.
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }

    /// Creates an `Unauthorized` error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Creates a `Forbidden` error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Creates a `NotFound` error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // ========================================
    // Classification
    // ========================================

    /// Returns `true` for configuration and key file errors.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigInvalid { .. } | Self::KeyFile { .. }
        )
    }

    /// Returns `true` if the server cannot keep running.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::KeyFile { .. } | Self::StartupFailed { .. }
        )
    }

    /// Returns `true` if the session that produced this error must be closed.
    #[must_use]
    pub const fn should_close_session(&self) -> bool {
        matches!(self, Self::Core(err) if err.is_session_fatal())
    }

    /// Returns `true` for failures the caller cannot fix by changing input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self.standard_error(),
            StandardError::InternalServerError | StandardError::Unknown
        )
    }

    /// Returns the standard error code for this error.
    #[must_use]
    pub const fn standard_error(&self) -> StandardError {
        match self {
            Self::MethodNotFound { .. } => StandardError::RpcMethodNotFound,
            Self::InvalidArguments { .. } => StandardError::RpcInvalidArguments,
            Self::BadRequest { .. } => StandardError::RpcBadRequest,
            Self::SessionNotFound(_) => StandardError::SessionNotFound,
            Self::SessionNotEstablished(_) => StandardError::SessionNotEstablished,
            Self::SessionClosed(_) => StandardError::SessionClosed,
            Self::SessionLimitReached { .. } | Self::Transport(_) => {
                StandardError::ServerUnavailable
            }
            Self::Unauthorized { .. } => StandardError::Unauthorized,
            Self::Forbidden { .. } => StandardError::Forbidden,
            Self::NotFound { .. } => StandardError::NotFound,
            Self::CaptchaNotAvailable => StandardError::CaptchaNotAvailable,
            Self::CaptchaExpired => StandardError::CaptchaExpired,
            Self::Core(err) if err.is_crypto_error() => StandardError::CryptographicError,
            Self::Core(err) if err.is_input_error() => StandardError::RpcBadRequest,
            Self::Federation(_) => StandardError::ResolutionFailed,
            Self::Core(_)
            | Self::ConfigLoad { .. }
            | Self::ConfigInvalid { .. }
            | Self::KeyFile { .. }
            | Self::StartupFailed { .. }
            | Self::Internal { .. }
            | Self::Storage(_)
            | Self::Common(_)
            | Self::Io(_) => StandardError::InternalServerError,
        }
    }

    /// Converts this error into the wire error sent to the client.
    ///
    /// Internal failures carry the generic message unless
    /// `display_internal` is set.
    #[must_use]
    pub fn to_rpc_error(&self, display_internal: bool) -> RpcError {
        if let Self::Federation(err) = self {
            return err.to_rpc_error();
        }
        let code = self.standard_error();
        if code == StandardError::InternalServerError && !display_internal {
            return RpcError::from_code(code);
        }
        RpcError::new(code, self.to_string())
    }
}

// ============================================
// Tests
// ============================================
