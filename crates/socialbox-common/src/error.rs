// ============================================
// File: crates/socialbox-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Base error vocabulary shared by the Socialbox crates. Higher layers wrap
//! `CommonError` transparently instead of re-declaring decoding errors.
//!
//! ## Main Functionality
//! - `CommonError`: decoding failures of shared identifiers and base64
//! - `Result<T>`: alias using `CommonError`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never put key material or password hashes into error messages
//! - Messages may reach a remote caller when internal diagnostics are
//!   enabled, so keep them short and factual
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

// ============================================
// CommonError
// ============================================

/// Common error types shared across Socialbox crates.
///
/// # Example
/// ```
/// use socialbox_common::error::{CommonError, Result};
/// use socialbox_common::SessionId;
///
/// fn parse(text: &str) -> Result<SessionId> {
///     text.parse()
/// }
///
/// assert!(matches!(parse("nope"), Err(CommonError::Decoding { .. })));
/// ```
#[derive(Error, Debug)]
pub enum CommonError {
    /// Failed to decode/deserialize data.
    #[error("Decoding error: {context}: {details}")]
    Decoding {
        /// What was being decoded
        context: String,
        /// Error details
        details: String,
    },
}

impl CommonError {
    /// Creates a `Decoding` error.
    pub fn decoding(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Decoding {
            context: context.into(),
            details: details.into(),
        }
    }
}

impl From<base64::DecodeError> for CommonError {
    fn from(err: base64::DecodeError) -> Self {
        Self::decoding("base64", err.to_string())
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
        let err = CommonError::decoding("session id", "bad length");
        assert_eq!(err.to_string(), "Decoding error: session id: bad length");
    }

    #[test]
    fn test_base64_error_conversion() {
        use base64::Engine;
        let err = base64::engine::general_purpose::STANDARD
            .decode("!!!")
            .unwrap_err();
        let common: CommonError = err.into();
        assert!(matches!(common, CommonError::Decoding { .. }));
    }
}
