// ============================================
// File: crates/socialbox-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the Socialbox wire protocol: the request-type discriminator, the
//! clear-text handshake payloads and the encrypted RPC envelope.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`messages`]: `RequestType` and handshake payloads
//! - [`rpc`]: `RpcRequest`, `RpcResponse`, `RpcError`, `StandardError`
//! - [`objects`]: result objects shared by server and client
//! - [`codec`]: sealing/opening RPC batches with a session key
//! - [`version`]: protocol version constants
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase (clear text JSON)        │
//! │  Client ──── info (optional) ─────────────────────► Server  │
//! │  Client ──── init  {identify_as, key, signature} ──► Server │
//! │  Client ◄─── {session_id} ────────────────────────── Server │
//! │  Client ──── dhe   {public_key} ───────────────────► Server │
//! │  Client ◄─── {public_key, signature} ─────────────── Server │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    RPC Phase                                │
//! │  Client ════ rpc  seal([RpcRequest, ...]) ═════════► Server │
//! │  Client ◄═══ seal([RpcResponse, ...]) ══════════════ Server │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ANY wire change requires a protocol version bump
//! - Binary fields in JSON payloads are standard base64
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod messages;
pub mod objects;
pub mod rpc;
pub mod version;

pub use codec::{Codec, SecureCodec};
pub use messages::{
    DheRequest, DheResponse, InitiateSessionRequest, InitiateSessionResponse, RequestType,
    ServerInformation,
};
pub use objects::{CaptchaChallenge, PeerView, SessionState};
pub use rpc::{RpcError, RpcOutcome, RpcRequest, RpcResponse, StandardError};
pub use version::{PROTOCOL_VERSION, RECORD_VERSION};

/// Serde adapter encoding byte vectors as standard base64 strings.
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        BASE64.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}
