// ============================================
// File: crates/socialbox-core/src/protocol/codec.rs
// ============================================
//! # Protocol Codec
//!
//! ## Creation Reason
//! Seals RPC batches into the opaque body of an `rpc` frame and opens them
//! again, binding every ciphertext to the session it belongs to.
//!
//! ## Main Functionality
//! - `Codec` trait: generic encode/decode interface
//! - `SecureCodec`: JSON batch + XChaCha20-Poly1305 under the session key
//!
//! ## Wire Format
//! ```text
//! ┌──────────────┬──────────────────────────────┬───────────┐
//! │ nonce (24 B) │ ciphertext(JSON array)       │ tag (16 B)│
//! └──────────────┴──────────────────────────────┴───────────┘
//!   AAD = session id bytes
//! ```
//!
//! ## Decoding Strategy
//! 1. Authenticate and decrypt (length checked by the cipher)
//! 2. Parse the JSON array
//! 3. Reject empty batches
//!
//! ## ⚠️ Important Note for Next Developer
//! - A decryption failure is session-fatal; callers close the session
//! - A single JSON object is accepted as a batch of one when decoding
//!   requests, for clients that do not batch
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use socialbox_common::SessionId;

use crate::crypto::cipher::{decrypt, encrypt};
use crate::crypto::keys::SessionKey;
use crate::error::{CoreError, Result};
use crate::protocol::rpc::{RpcRequest, RpcResponse};

// ============================================
// Codec Trait
// ============================================

/// Trait for encoding and decoding protocol messages.
///
/// # Type Parameters
/// * `T` - The message type to encode/decode
pub trait Codec<T> {
    /// Encodes a message into a byte buffer.
    ///
    /// # Errors
    /// Returns an error if the message cannot be serialized or sealed.
    fn encode(&self, msg: &T, buf: &mut BytesMut) -> Result<()>;

    /// Decodes a message from bytes.
    ///
    /// # Errors
    /// Returns an error if the bytes do not authenticate or do not parse.
    fn decode(&self, buf: &Bytes) -> Result<T>;
}

// ============================================
// SecureCodec
// ============================================

/// Codec sealing RPC batches under one session's key.
pub struct SecureCodec {
    key: SessionKey,
    session_id: SessionId,
}

impl SecureCodec {
    /// Creates a codec for `session_id` using `key`.
    #[must_use]
    pub fn new(key: SessionKey, session_id: SessionId) -> Self {
        Self { key, session_id }
    }

    /// Returns the session this codec is bound to.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Serializes `value` as JSON and seals it.
    ///
    /// # Errors
    /// Returns `MalformedMessage` on serialization failure or `Encryption`
    /// if sealing fails.
    pub fn seal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let plaintext = serde_json::to_vec(value)?;
        encrypt(self.key.as_bytes(), &plaintext, self.session_id.as_bytes())
    }

    /// Opens `sealed` and parses the JSON inside.
    ///
    /// # Errors
    /// Returns `Decryption` if the frame does not authenticate under this
    /// session, `MalformedMessage` if the plaintext is not the expected JSON.
    pub fn open<T: DeserializeOwned>(&self, sealed: &[u8]) -> Result<T> {
        let plaintext = self.open_raw(sealed)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    fn open_raw(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        decrypt(self.key.as_bytes(), sealed, self.session_id.as_bytes())
    }
}

impl std::fmt::Debug for SecureCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureCodec")
            .field("session_id", &self.session_id)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl Codec<Vec<RpcRequest>> for SecureCodec {
    fn encode(&self, msg: &Vec<RpcRequest>, buf: &mut BytesMut) -> Result<()> {
        buf.put_slice(&self.seal(msg)?);
        Ok(())
    }

    fn decode(&self, buf: &Bytes) -> Result<Vec<RpcRequest>> {
        let plaintext = self.open_raw(buf)?;
        let batch = match serde_json::from_slice::<Value>(&plaintext)? {
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<std::result::Result<Vec<RpcRequest>, _>>()?,
            single @ Value::Object(_) => vec![serde_json::from_value(single)?],
            _ => return Err(CoreError::malformed("rpc body is not a request batch")),
        };
        if batch.is_empty() {
            return Err(CoreError::malformed("rpc batch is empty"));
        }
        Ok(batch)
    }
}

impl Codec<Vec<RpcResponse>> for SecureCodec {
    fn encode(&self, msg: &Vec<RpcResponse>, buf: &mut BytesMut) -> Result<()> {
        buf.put_slice(&self.seal(msg)?);
        Ok(())
    }

    fn decode(&self, buf: &Bytes) -> Result<Vec<RpcResponse>> {
        self.open(buf)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::rpc::{RpcError, StandardError};

    fn codec() -> SecureCodec {
        SecureCodec::new(SessionKey::from_bytes([7u8; 32]), SessionId::generate())
    }

    #[test]
    fn test_request_batch_sealed_and_opened() {
        let codec = codec();
        let batch = vec![
            RpcRequest::new("ping", 1),
            RpcRequest::new("settingsSetDisplayName", 2).with_param("name", "Alice"),
        ];

        let mut buf = BytesMut::new();
        codec.encode(&batch, &mut buf).unwrap();
        assert!(!buf.windows(4).any(|w| w == b"ping"));

        let decoded: Vec<RpcRequest> = codec.decode(&buf.freeze()).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_single_request_object_is_a_batch_of_one() {
        let codec = codec();
        let sealed = codec.seal(&RpcRequest::new("ping", 9)).unwrap();
        let decoded: Vec<RpcRequest> = codec.decode(&Bytes::from(sealed)).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, 9);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let codec = codec();
        let sealed = codec.seal(&Vec::<RpcRequest>::new()).unwrap();
        let result: Result<Vec<RpcRequest>> = codec.decode(&Bytes::from(sealed));
        assert!(matches!(result, Err(CoreError::MalformedMessage { .. })));
    }

    #[test]
    fn test_other_session_cannot_open() {
        let key = SessionKey::from_bytes([7u8; 32]);
        let a = SecureCodec::new(key.clone(), SessionId::generate());
        let b = SecureCodec::new(key, SessionId::generate());

        let sealed = a.seal(&vec![RpcRequest::new("ping", 1)]).unwrap();
        let result: Result<Vec<RpcRequest>> = b.decode(&Bytes::from(sealed));
        assert!(matches!(result, Err(CoreError::Decryption)));
    }

    #[test]
    fn test_short_or_tampered_frame_rejected() {
        let codec = codec();
        let short: Result<Vec<RpcResponse>> = codec.decode(&Bytes::from_static(b"abc"));
        assert!(matches!(short, Err(CoreError::Decryption)));

        let mut sealed = codec
            .seal(&vec![RpcResponse::failure(
                1,
                RpcError::from_code(StandardError::Forbidden),
            )])
            .unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        let tampered: Result<Vec<RpcResponse>> = codec.decode(&Bytes::from(sealed));
        assert!(matches!(tampered, Err(CoreError::Decryption)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", codec());
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("[7, 7"));
    }
}
