// ============================================
// File: crates/socialbox-core/src/protocol/messages.rs
// ============================================
//! # Protocol Messages
//!
//! ## Creation Reason
//! The request-type discriminator and the clear-text payloads of the
//! handshake request types.
//!
//! ## Main Functionality
//! - `RequestType`: `ping`, `info`, `init`, `dhe`, `rpc`
//! - `InitiateSessionRequest` / `InitiateSessionResponse`
//! - `DheRequest` / `DheResponse`
//! - `ServerInformation`: reply to `info`
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use socialbox_common::{SessionId, Timestamp};

use super::base64_bytes;
use crate::crypto::handshake::{client_exchange_sign_data, initiate_sign_data};
use crate::crypto::keys::{ExchangeKeyPair, IdentityKeyPair, IdentityPublicKey};
use crate::error::CoreError;

// ============================================
// RequestType
// ============================================

/// Transport-level request discriminator.
///
/// # Ordering
/// `info` and `ping` are stateless. A session must go through `init` then
/// `dhe` before any `rpc` request is serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    /// Liveness probe, no session needed.
    Ping,
    /// Stateless capability query.
    Info,
    /// INITIATE_SESSION: allocates a session.
    #[serde(rename = "init")]
    InitiateSession,
    /// DHE_EXCHANGE: negotiates the session key.
    #[serde(rename = "dhe")]
    DheExchange,
    /// Encrypted RPC batch.
    Rpc,
}

impl RequestType {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Info => "info",
            Self::InitiateSession => "init",
            Self::DheExchange => "dhe",
            Self::Rpc => "rpc",
        }
    }

    /// Returns `true` if the request must carry a session id.
    #[must_use]
    pub const fn requires_session(&self) -> bool {
        matches!(self, Self::DheExchange | Self::Rpc)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ping" => Ok(Self::Ping),
            "info" => Ok(Self::Info),
            "init" => Ok(Self::InitiateSession),
            "dhe" => Ok(Self::DheExchange),
            "rpc" => Ok(Self::Rpc),
            _ => Err(CoreError::UnknownRequestType(s.to_string())),
        }
    }
}

// ============================================
// INITIATE_SESSION
// ============================================

/// Body of an `init` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateSessionRequest {
    /// Peer address the client claims (`username@domain`).
    pub identify_as: String,
    /// Client software name.
    pub client_name: String,
    /// Client software version.
    pub client_version: String,
    /// Client Ed25519 identity key.
    #[serde(rename = "client_public_key")]
    pub public_key: IdentityPublicKey,
    /// Unix time the request was signed.
    pub timestamp: Timestamp,
    /// Signature over `identify_as || public_key || timestamp`.
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl InitiateSessionRequest {
    /// Builds a request signed with `identity`.
    #[must_use]
    pub fn signed(
        identity: &IdentityKeyPair,
        identify_as: impl Into<String>,
        client_name: impl Into<String>,
        client_version: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        let identify_as = identify_as.into();
        let public_key = identity.public_key();
        let signature = identity
            .sign(&initiate_sign_data(&identify_as, &public_key, timestamp))
            .to_vec();
        Self {
            identify_as,
            client_name: client_name.into(),
            client_version: client_version.into(),
            public_key,
            timestamp,
            signature,
        }
    }
}

/// Reply to an `init` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateSessionResponse {
    /// The newly allocated session.
    pub session_id: SessionId,
}

// ============================================
// DHE_EXCHANGE
// ============================================

/// Body of a `dhe` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DheRequest {
    /// Client X25519 exchange key.
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    /// Unix time the request was signed.
    pub timestamp: Timestamp,
    /// Signature by the INIT identity key over
    /// `session_id || public_key || timestamp`.
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl DheRequest {
    /// Builds a request for `session_id` signed with the INIT `identity`.
    #[must_use]
    pub fn signed(
        identity: &IdentityKeyPair,
        session_id: &SessionId,
        exchange: &ExchangeKeyPair,
        timestamp: Timestamp,
    ) -> Self {
        let public_key = exchange.public_key_bytes().to_vec();
        let signature = identity
            .sign(&client_exchange_sign_data(session_id, &public_key, timestamp))
            .to_vec();
        Self {
            public_key,
            timestamp,
            signature,
        }
    }
}

/// Reply to a `dhe` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DheResponse {
    /// Server X25519 exchange key.
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    /// Server identity signature over the exchange transcript.
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

// ============================================
// INFO
// ============================================

/// Reply to an `info` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInformation {
    /// Human readable server name.
    pub server_name: String,
    /// Domain the server is authoritative for.
    pub domain: String,
    /// Protocol version spoken.
    pub protocol_version: u8,
    /// Trust key in discovery record form (`sig:...`).
    pub public_key: String,
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_type_parse() {
        for rt in [
            RequestType::Ping,
            RequestType::Info,
            RequestType::InitiateSession,
            RequestType::DheExchange,
            RequestType::Rpc,
        ] {
            assert_eq!(rt.as_str().parse::<RequestType>().unwrap(), rt);
        }
        assert_eq!("RPC".parse::<RequestType>().unwrap(), RequestType::Rpc);
        assert!(matches!(
            "handshake".parse::<RequestType>(),
            Err(CoreError::UnknownRequestType(_))
        ));
    }

    #[test]
    fn test_request_type_session_requirement() {
        assert!(RequestType::Rpc.requires_session());
        assert!(RequestType::DheExchange.requires_session());
        assert!(!RequestType::InitiateSession.requires_session());
        assert!(!RequestType::Info.requires_session());
    }

    #[test]
    fn test_request_type_serde_names() {
        assert_eq!(
            serde_json::to_string(&RequestType::InitiateSession).unwrap(),
            "\"init\""
        );
        assert_eq!(serde_json::to_string(&RequestType::DheExchange).unwrap(), "\"dhe\"");
    }

    #[test]
    fn test_initiate_request_json_shape() {
        let identity = IdentityKeyPair::generate();
        let msg = InitiateSessionRequest::signed(
            &identity,
            "alice@coffee.com",
            "socialbox-rs",
            "0.1.0",
            Timestamp::from_secs(1_700_000_000),
        );
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["identify_as"], "alice@coffee.com");
        assert_eq!(json["timestamp"], 1_700_000_000);
        assert!(json["client_public_key"].is_string());
        assert!(json["signature"].is_string());

        let back: InitiateSessionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }
}
