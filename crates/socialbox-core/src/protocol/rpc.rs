// ============================================
// File: crates/socialbox-core/src/protocol/rpc.rs
// ============================================
//! # RPC Envelope
//!
//! ## Creation Reason
//! The decrypted content of an `rpc` request: a batch of method calls, and
//! the batch of responses that answers it.
//!
//! ## Main Functionality
//! - `RpcRequest`: `{method, id, parameters}`
//! - `RpcResponse`: `{id, result}` or `{id, error}`, never both
//! - `RpcError`: `{code, message}`
//! - `StandardError`: the numeric error taxonomy
//!
//! ## JSON Shapes
//! ```text
//! request : {"method":"ping","id":3735928559,"parameters":{}}
//! success : {"id":3735928559,"result":true}
//! failure : {"id":3735928559,"error":{"code":-1001,"message":"..."}}
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `id` is a caller-chosen correlation id, not a security token
//! - Error codes are part of the wire contract; never renumber them
//!
//! ## Last Modified
//! v0.1.0 - Initial envelope definitions

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ============================================
// StandardError
// ============================================

/// Standard error codes surfaced to RPC callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardError {
    /// Unclassified failure (also used for unknown codes).
    Unknown,
    /// Method name is not registered.
    RpcMethodNotFound,
    /// A parameter is missing or malformed.
    RpcInvalidArguments,
    /// The request envelope itself is malformed.
    RpcBadRequest,
    /// Uncaught server-side failure.
    InternalServerError,
    /// The server cannot serve the request right now.
    ServerUnavailable,
    /// Decryption/signature failure.
    CryptographicError,
    /// Discovery record could not be resolved or trusted.
    ResolutionFailed,
    /// RPC attempted before the DHE step completed.
    SessionNotEstablished,
    /// Unknown session id.
    SessionNotFound,
    /// Session was closed while the request was in flight.
    SessionClosed,
    /// Session is not authenticated.
    Unauthorized,
    /// Session state forbids the call.
    Forbidden,
    /// Requested entity does not exist.
    NotFound,
    /// No captcha has been issued for this peer.
    CaptchaNotAvailable,
    /// The captcha answer window has passed.
    CaptchaExpired,
}

impl StandardError {
    const ALL: [Self; 16] = [
        Self::Unknown,
        Self::RpcMethodNotFound,
        Self::RpcInvalidArguments,
        Self::RpcBadRequest,
        Self::InternalServerError,
        Self::ServerUnavailable,
        Self::CryptographicError,
        Self::ResolutionFailed,
        Self::SessionNotEstablished,
        Self::SessionNotFound,
        Self::SessionClosed,
        Self::Unauthorized,
        Self::Forbidden,
        Self::NotFound,
        Self::CaptchaNotAvailable,
        Self::CaptchaExpired,
    ];

    /// Returns the numeric wire code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Unknown => -1,
            Self::RpcMethodNotFound => -1000,
            Self::RpcInvalidArguments => -1001,
            Self::RpcBadRequest => -1002,
            Self::InternalServerError => -2000,
            Self::ServerUnavailable => -2001,
            Self::CryptographicError => -3000,
            Self::ResolutionFailed => -4000,
            Self::SessionNotEstablished => -5000,
            Self::SessionNotFound => -5001,
            Self::SessionClosed => -5002,
            Self::Unauthorized => -6000,
            Self::Forbidden => -6001,
            Self::NotFound => -6002,
            Self::CaptchaNotAvailable => -7000,
            Self::CaptchaExpired => -7001,
        }
    }

    /// Maps a wire code back to the enum; unknown codes become `Unknown`.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|e| e.code() == code)
            .unwrap_or(Self::Unknown)
    }

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::RpcMethodNotFound => "RPC_METHOD_NOT_FOUND",
            Self::RpcInvalidArguments => "RPC_INVALID_ARGUMENTS",
            Self::RpcBadRequest => "RPC_BAD_REQUEST",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::ServerUnavailable => "SERVER_UNAVAILABLE",
            Self::CryptographicError => "CRYPTOGRAPHIC_ERROR",
            Self::ResolutionFailed => "RESOLUTION_FAILED",
            Self::SessionNotEstablished => "SESSION_NOT_ESTABLISHED",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::SessionClosed => "SESSION_CLOSED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::CaptchaNotAvailable => "CAPTCHA_NOT_AVAILABLE",
            Self::CaptchaExpired => "CAPTCHA_EXPIRED",
        }
    }

    /// Generic message used when no specific one is supplied.
    #[must_use]
    pub const fn default_message(&self) -> &'static str {
        match self {
            Self::Unknown => "An unknown error occurred",
            Self::RpcMethodNotFound => "The requested method does not exist",
            Self::RpcInvalidArguments => "Invalid arguments",
            Self::RpcBadRequest => "Bad request",
            Self::InternalServerError => "Internal server error",
            Self::ServerUnavailable => "Server unavailable",
            Self::CryptographicError => "Cryptographic error",
            Self::ResolutionFailed => "Failed to resolve the requested peer",
            Self::SessionNotEstablished => "Session key has not been established",
            Self::SessionNotFound => "Session not found",
            Self::SessionClosed => "Session was closed",
            Self::Unauthorized => "Session is not authenticated",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not found",
            Self::CaptchaNotAvailable => "No captcha is available",
            Self::CaptchaExpired => "The captcha has expired",
        }
    }
}

impl fmt::Display for StandardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for StandardError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for StandardError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i32::deserialize(deserializer).map(Self::from_code)
    }
}

// ============================================
// RpcError
// ============================================

/// Error half of an RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{} ({}): {}", .code.name(), .code.code(), .message)]
pub struct RpcError {
    /// Standard error code.
    pub code: StandardError,
    /// Human readable message.
    pub message: String,
}

impl RpcError {
    /// Creates an error with an explicit message.
    pub fn new(code: StandardError, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an error carrying the code's default message.
    #[must_use]
    pub fn from_code(code: StandardError) -> Self {
        Self::new(code, code.default_message())
    }

    /// Shorthand for `RPC_INVALID_ARGUMENTS`.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(StandardError::RpcInvalidArguments, message)
    }

    /// Shorthand for `FORBIDDEN`.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StandardError::Forbidden, message)
    }
}

impl From<StandardError> for RpcError {
    fn from(code: StandardError) -> Self {
        Self::from_code(code)
    }
}

// ============================================
// RpcRequest
// ============================================

/// A single method call inside an RPC batch.
///
/// # Example
/// ```
/// use socialbox_core::protocol::RpcRequest;
///
/// let req = RpcRequest::new("resolvePeer", 7).with_param("peer", "bob@teapot.com");
/// assert_eq!(req.param_str("peer"), Some("bob@teapot.com"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Method name.
    pub method: String,
    /// Caller-chosen correlation id.
    pub id: u32,
    /// Named parameters.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl RpcRequest {
    /// Creates a request with no parameters.
    pub fn new(method: impl Into<String>, id: u32) -> Self {
        Self {
            method: method.into(),
            id,
            parameters: Map::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Returns a parameter value.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Returns a parameter if it is a string.
    #[must_use]
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(Value::as_str)
    }

    /// Builds a success response correlated to this request.
    #[must_use]
    pub fn respond(&self, result: Value) -> RpcResponse {
        RpcResponse::success(self.id, result)
    }

    /// Builds an error response correlated to this request.
    #[must_use]
    pub fn fail(&self, error: RpcError) -> RpcResponse {
        RpcResponse::failure(self.id, error)
    }
}

// ============================================
// RpcResponse
// ============================================

/// Outcome carried by an [`RpcResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcOutcome {
    /// Successful result value.
    #[serde(rename = "result")]
    Result(Value),
    /// Error value.
    #[serde(rename = "error")]
    Error(RpcError),
}

/// Response to a single [`RpcRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Id copied verbatim from the request.
    pub id: u32,
    /// Exactly one of result or error.
    #[serde(flatten)]
    pub outcome: RpcOutcome,
}

impl RpcResponse {
    /// Creates a success response.
    #[must_use]
    pub const fn success(id: u32, result: Value) -> Self {
        Self {
            id,
            outcome: RpcOutcome::Result(result),
        }
    }

    /// Creates an error response.
    #[must_use]
    pub const fn failure(id: u32, error: RpcError) -> Self {
        Self {
            id,
            outcome: RpcOutcome::Error(error),
        }
    }

    /// Returns `true` for an error response.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.outcome, RpcOutcome::Error(_))
    }

    /// Returns the error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&RpcError> {
        match &self.outcome {
            RpcOutcome::Error(e) => Some(e),
            RpcOutcome::Result(_) => None,
        }
    }

    /// Converts into a standard `Result`.
    ///
    /// # Errors
    /// Returns the carried `RpcError` for an error response.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.outcome {
            RpcOutcome::Result(v) => Ok(v),
            RpcOutcome::Error(e) => Err(e),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_error_codes_unique() {
        let mut codes: Vec<i32> = StandardError::ALL.iter().map(StandardError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), StandardError::ALL.len());
    }

    #[test]
    fn test_standard_error_from_code() {
        assert_eq!(StandardError::from_code(-1001), StandardError::RpcInvalidArguments);
        assert_eq!(StandardError::from_code(12345), StandardError::Unknown);
    }

    #[test]
    fn test_request_json() {
        let req: RpcRequest =
            serde_json::from_value(json!({"method": "ping", "id": 42})).unwrap();
        assert_eq!(req.method, "ping");
        assert_eq!(req.id, 42);
        assert!(req.parameters.is_empty());
    }

    #[test]
    fn test_success_response_json() {
        let resp = RpcResponse::success(9, json!(true));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value, json!({"id": 9, "result": true}));

        let back: RpcResponse = serde_json::from_value(value).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn test_error_response_json() {
        let resp = RpcResponse::failure(
            1,
            RpcError::new(StandardError::CaptchaExpired, "too late"),
        );
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            value,
            json!({"id": 1, "error": {"code": -7001, "message": "too late"}})
        );
        let back: RpcResponse = serde_json::from_value(value).unwrap();
        assert!(back.is_error());
        assert_eq!(back.error().unwrap().code, StandardError::CaptchaExpired);
    }

    #[test]
    fn test_null_result_is_success() {
        let back: RpcResponse = serde_json::from_value(json!({"id": 3, "result": null})).unwrap();
        assert_eq!(back.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_rpc_error_display() {
        let err = RpcError::from_code(StandardError::Forbidden);
        assert_eq!(err.to_string(), "FORBIDDEN (-6001): Forbidden");
    }
}
