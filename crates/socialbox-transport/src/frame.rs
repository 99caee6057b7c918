// ============================================
// File: crates/socialbox-transport/src/frame.rs
// ============================================
//! # Frames
//!
//! ## Creation Reason
//! A Socialbox exchange is one request frame answered by one response
//! frame. Framing metadata travels in two headers so the body can stay
//! opaque (clear JSON for handshake steps, sealed bytes for `rpc`).
//!
//! ## Wire Mapping (HTTP)
//! ```text
//! POST <sb-rpc endpoint>
//! Request-Type: init | dhe | rpc | info | ping
//! Session-UUID: <uuid>            (dhe, rpc)
//!
//! <body>
//! ```
//! A non-2xx status carries a JSON `{code, message}` error body.
//!
//! ## Last Modified
//! v0.1.0 - Initial frame definitions

use bytes::Bytes;
use serde::Serialize;

use socialbox_common::SessionId;
use socialbox_core::{RequestType, RpcError, StandardError};

use crate::error::{Result, TransportError};

/// Header carrying the request type.
pub const REQUEST_TYPE_HEADER: &str = "Request-Type";

/// Header carrying the session id.
pub const SESSION_HEADER: &str = "Session-UUID";

/// HTTP status codes used by the frame layer.
pub mod status {
    /// Success.
    pub const OK: u16 = 200;
    /// Malformed frame or arguments.
    pub const BAD_REQUEST: u16 = 400;
    /// Session is not authenticated.
    pub const UNAUTHORIZED: u16 = 401;
    /// Policy rejected the request.
    pub const FORBIDDEN: u16 = 403;
    /// Unknown session or entity.
    pub const NOT_FOUND: u16 = 404;
    /// Session closed or not yet keyed.
    pub const CONFLICT: u16 = 409;
    /// Body exceeds the configured limit.
    pub const PAYLOAD_TOO_LARGE: u16 = 413;
    /// Unhandled server failure.
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    /// Upstream resolution failed.
    pub const BAD_GATEWAY: u16 = 502;
    /// Server cannot take the request.
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

// ============================================
// RequestFrame
// ============================================

/// One request to a Socialbox endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    /// Request discriminator.
    pub request_type: RequestType,
    /// Session the request belongs to.
    pub session_id: Option<SessionId>,
    /// Opaque body.
    pub body: Bytes,
}

impl RequestFrame {
    /// Creates a frame without a session.
    #[must_use]
    pub fn new(request_type: RequestType, body: impl Into<Bytes>) -> Self {
        Self {
            request_type,
            session_id: None,
            body: body.into(),
        }
    }

    /// Creates a frame whose body is `value` as JSON.
    ///
    /// # Errors
    /// Returns `Core(MalformedMessage)` if serialization fails.
    pub fn json<T: Serialize>(request_type: RequestType, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(socialbox_core::CoreError::from)?;
        Ok(Self::new(request_type, body))
    }

    /// Attaches a session id.
    #[must_use]
    pub const fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Builds a frame from raw header values.
    ///
    /// # Errors
    /// - `MissingHeader` if the request type is absent, or the session id is
    ///   absent for a type that needs one
    /// - `InvalidHeader` if a header does not parse
    pub fn from_parts(
        request_type: Option<&str>,
        session_id: Option<&str>,
        body: Bytes,
    ) -> Result<Self> {
        let request_type = request_type
            .ok_or(TransportError::MissingHeader {
                name: REQUEST_TYPE_HEADER,
            })?
            .parse::<RequestType>()
            .map_err(|e| TransportError::invalid_header(REQUEST_TYPE_HEADER, e.to_string()))?;

        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<SessionId>)
            .transpose()
            .map_err(|e| TransportError::invalid_header(SESSION_HEADER, e.to_string()))?;

        if request_type.requires_session() && session_id.is_none() {
            return Err(TransportError::MissingHeader {
                name: SESSION_HEADER,
            });
        }

        Ok(Self {
            request_type,
            session_id,
            body,
        })
    }
}

// ============================================
// ResponseFrame
// ============================================

/// Reply to a [`RequestFrame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// HTTP-style status.
    pub status: u16,
    /// Body bytes.
    pub body: Bytes,
}

impl ResponseFrame {
    /// Creates a `200` response.
    #[must_use]
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: status::OK,
            body: body.into(),
        }
    }

    /// Creates a `200` response with `value` as JSON.
    ///
    /// # Errors
    /// Returns `Core(MalformedMessage)` if serialization fails.
    pub fn ok_json<T: Serialize>(value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(socialbox_core::CoreError::from)?;
        Ok(Self::ok(body))
    }

    /// Creates an error response whose status follows the error code.
    #[must_use]
    pub fn error(error: &RpcError) -> Self {
        // A two-field struct of string and integer always serializes.
        let body = serde_json::to_vec(error).unwrap_or_default();
        Self {
            status: status_for(error.code),
            body: body.into(),
        }
    }

    /// Returns `true` for a 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decodes the error carried by a non-2xx response.
    ///
    /// Bodies that are not an error object become `UNKNOWN` with the
    /// status in the message.
    #[must_use]
    pub fn to_error(&self) -> Option<RpcError> {
        if self.is_success() {
            return None;
        }
        Some(serde_json::from_slice(&self.body).unwrap_or_else(|_| {
            RpcError::new(
                StandardError::Unknown,
                format!("endpoint answered with status {}", self.status),
            )
        }))
    }
}

/// Maps an error code to the status of the frame carrying it.
#[must_use]
pub const fn status_for(code: StandardError) -> u16 {
    match code {
        StandardError::RpcMethodNotFound
        | StandardError::RpcInvalidArguments
        | StandardError::RpcBadRequest
        | StandardError::CryptographicError => status::BAD_REQUEST,
        StandardError::Unauthorized => status::UNAUTHORIZED,
        StandardError::Forbidden => status::FORBIDDEN,
        StandardError::SessionNotFound
        | StandardError::NotFound
        | StandardError::CaptchaNotAvailable => status::NOT_FOUND,
        StandardError::SessionNotEstablished
        | StandardError::SessionClosed
        | StandardError::CaptchaExpired => status::CONFLICT,
        StandardError::ResolutionFailed => status::BAD_GATEWAY,
        StandardError::ServerUnavailable => status::SERVICE_UNAVAILABLE,
        StandardError::Unknown | StandardError::InternalServerError => {
            status::INTERNAL_SERVER_ERROR
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
    fn test_from_parts_requires_type() {
        let err = RequestFrame::from_parts(None, None, Bytes::new()).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MissingHeader {
                name: REQUEST_TYPE_HEADER
            }
        ));

        let err = RequestFrame::from_parts(Some("hello"), None, Bytes::new()).unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { .. }));
    }

    #[test]
    fn test_from_parts_session_rules() {
        let frame = RequestFrame::from_parts(Some("init"), None, Bytes::new()).unwrap();
        assert_eq!(frame.request_type, RequestType::InitiateSession);
        assert!(frame.session_id.is_none());

        let err = RequestFrame::from_parts(Some("rpc"), None, Bytes::new()).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MissingHeader {
                name: SESSION_HEADER
            }
        ));

        let err = RequestFrame::from_parts(Some("rpc"), Some("not-a-uuid"), Bytes::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { .. }));

        let id = SessionId::generate();
        let frame =
            RequestFrame::from_parts(Some("RPC"), Some(&id.to_string()), Bytes::new()).unwrap();
        assert_eq!(frame.session_id, Some(id));
    }

    #[test]
    fn test_error_frame_roundtrip() {
        let err = RpcError::from_code(StandardError::SessionNotEstablished);
        let frame = ResponseFrame::error(&err);
        assert_eq!(frame.status, status::CONFLICT);
        assert!(!frame.is_success());
        assert_eq!(frame.to_error(), Some(err));
    }

    #[test]
    fn test_garbage_error_body_is_unknown() {
        let frame = ResponseFrame {
            status: 502,
            body: Bytes::from_static(b"<html>bad gateway</html>"),
        };
        let err = frame.to_error().unwrap();
        assert_eq!(err.code, StandardError::Unknown);
        assert!(err.message.contains("502"));

        assert!(ResponseFrame::ok("pong").to_error().is_none());
    }
}
