// ============================================
// File: crates/socialbox-core/src/crypto/handshake.rs
// ============================================
//! # Handshake Cryptography
//!
//! ## Creation Reason
//! Cryptographic operations of the INITIATE_SESSION and DHE_EXCHANGE steps:
//! signing/verifying the initiation request and producing the server's
//! signed exchange reply.
//!
//! ## Main Functionality
//! - `HandshakeCrypto`: server-side trait
//! - `DefaultHandshakeCrypto`: production implementation
//! - `initiate_sign_data` / `client_exchange_sign_data` / `exchange_sign_data`:
//!   exact signed transcripts
//! - `complete_exchange`: client-side verification + key derivation
//!
//! ## Handshake Flow
//! ```text
//! Client                                          Server
//!   │  init                                         │
//!   │  ├─ identify_as, client name/version          │
//!   │  ├─ client identity key (Ed25519)             │
//!   │  ├─ timestamp                                 │
//!   │  └─ signature ─────────────────────────────►  │
//!   │                     verify signature + skew   │
//!   │  ◄──────────────────────────────── session id │
//!   │                                               │
//!   │  dhe                                          │
//!   │  ├─ client exchange key (X25519)              │
//!   │  ├─ timestamp                                 │
//!   │  └─ signature (INIT identity key) ─────────►  │
//!   │                     verify against INIT key   │
//!   │                     generate exchange pair    │
//!   │                     derive session key        │
//!   │  ◄──── server exchange key + signature        │
//!   │  verify signature with the trust key          │
//!   │  derive session key                           │
//!   │ ═══════════ Encrypted RPC ═══════════════════ │
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Signature data must be constructed in exact order on both sides
//! - The DHE signature is what authenticates the server; skipping its
//!   verification on the client defeats federation trust entirely
//! - The client signs its DHE request with the key it presented at INIT.
//!   Without that, anyone who learns a session id could re-key the session
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake crypto implementation
//! v0.1.1 - DHE requests are signed by the INIT identity

use tracing::debug;

use socialbox_common::{SessionId, Timestamp};

use crate::crypto::kdf::derive_session_key;
use crate::crypto::keys::{ExchangeKeyPair, IdentityKeyPair, IdentityPublicKey, SessionKey};
use crate::error::{CoreError, Result};
use crate::protocol::messages::{DheRequest, DheResponse, InitiateSessionRequest};

/// Domain separation tag for the initiation signature.
const INIT_SIGN_TAG: &[u8] = b"socialbox-init";

/// Domain separation tag for the server's exchange signature.
const DHE_SIGN_TAG: &[u8] = b"socialbox-dhe";

/// Domain separation tag for the client's exchange signature.
const DHE_CLIENT_SIGN_TAG: &[u8] = b"socialbox-dhe-client";

// ============================================
// Signed transcripts
// ============================================

/// Builds the bytes signed by the client in a session initiation request.
///
/// # Wire Format
/// ```text
/// "socialbox-init" ||
/// identify_as (UTF-8) || 0x00 ||
/// client_public_key (32 bytes) ||
/// timestamp (8 bytes, big-endian)
/// ```
#[must_use]
pub fn initiate_sign_data(
    identify_as: &str,
    public_key: &IdentityPublicKey,
    timestamp: Timestamp,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(INIT_SIGN_TAG.len() + identify_as.len() + 41);
    data.extend_from_slice(INIT_SIGN_TAG);
    data.extend_from_slice(identify_as.as_bytes());
    data.push(0);
    data.extend_from_slice(public_key.as_bytes());
    data.extend_from_slice(&timestamp.to_be_bytes());
    data
}

/// Builds the bytes signed by the client in a DHE request.
///
/// # Wire Format
/// ```text
/// "socialbox-dhe-client" ||
/// session_id (16 bytes) ||
/// client_exchange_key (32 bytes) ||
/// timestamp (8 bytes, big-endian)
/// ```
#[must_use]
pub fn client_exchange_sign_data(
    session_id: &SessionId,
    client_key: &[u8],
    timestamp: Timestamp,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(DHE_CLIENT_SIGN_TAG.len() + 56);
    data.extend_from_slice(DHE_CLIENT_SIGN_TAG);
    data.extend_from_slice(session_id.as_bytes());
    data.extend_from_slice(client_key);
    data.extend_from_slice(&timestamp.to_be_bytes());
    data
}

/// Builds the bytes signed by the server in a DHE reply.
///
/// # Wire Format
/// ```text
/// "socialbox-dhe" ||
/// session_id (16 bytes) ||
/// client_exchange_key (32 bytes) ||
/// server_exchange_key (32 bytes)
/// ```
#[must_use]
pub fn exchange_sign_data(session_id: &SessionId, client_key: &[u8], server_key: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(DHE_SIGN_TAG.len() + 80);
    data.extend_from_slice(DHE_SIGN_TAG);
    data.extend_from_slice(session_id.as_bytes());
    data.extend_from_slice(client_key);
    data.extend_from_slice(server_key);
    data
}

// ============================================
// HandshakeCrypto Trait
// ============================================

/// Server-side handshake cryptography.
pub trait HandshakeCrypto: Send + Sync {
    /// Returns the server's identity public key (the published trust key).
    fn public_key(&self) -> IdentityPublicKey;

    /// Verifies the signature and timestamp of an initiation request.
    ///
    /// # Errors
    /// - `InvalidTimestamp`: timestamp outside the allowed skew
    /// - `SignatureVerification`: signature does not match
    fn verify_initiate(&self, msg: &InitiateSessionRequest, now: Timestamp) -> Result<()>;

    /// Runs the server half of the DHE step.
    ///
    /// `client_key` is the identity key the session was opened with; the
    /// request must be signed by it before any key material is derived.
    ///
    /// # Returns
    /// The signed reply and the session key derived for `session_id`.
    ///
    /// # Errors
    /// - `InvalidTimestamp`: timestamp outside the allowed skew
    /// - `SignatureVerification`: not signed by `client_key`
    /// - `InvalidKey`: unusable client exchange key
    fn process_exchange(
        &self,
        session_id: &SessionId,
        msg: &DheRequest,
        client_key: &IdentityPublicKey,
        now: Timestamp,
    ) -> Result<(DheResponse, SessionKey)>;
}

// ============================================
// DefaultHandshakeCrypto
// ============================================

/// Default production implementation of handshake cryptography.
#[derive(Debug)]
pub struct DefaultHandshakeCrypto {
    identity: IdentityKeyPair,
    max_timestamp_skew: u64,
}

impl DefaultHandshakeCrypto {
    /// Creates a new handshake crypto instance around the server identity.
    #[must_use]
    pub fn new(identity: IdentityKeyPair) -> Self {
        Self {
            identity,
            max_timestamp_skew: socialbox_common::time::MAX_CLOCK_SKEW_SECS,
        }
    }

    /// Sets the maximum allowed timestamp skew in seconds.
    #[must_use]
    pub const fn with_timestamp_skew(mut self, seconds: u64) -> Self {
        self.max_timestamp_skew = seconds;
        self
    }
}

impl HandshakeCrypto for DefaultHandshakeCrypto {
    fn public_key(&self) -> IdentityPublicKey {
        self.identity.public_key()
    }

    fn verify_initiate(&self, msg: &InitiateSessionRequest, now: Timestamp) -> Result<()> {
        if !msg.timestamp.is_within(now, self.max_timestamp_skew) {
            return Err(CoreError::invalid_timestamp(format!(
                "timestamp {} is not within {}s of {}",
                msg.timestamp, self.max_timestamp_skew, now
            )));
        }

        let data = initiate_sign_data(&msg.identify_as, &msg.public_key, msg.timestamp);
        msg.public_key.verify(&data, &msg.signature)?;
        debug!(identify_as = %msg.identify_as, "Initiation signature verified");
        Ok(())
    }

    fn process_exchange(
        &self,
        session_id: &SessionId,
        msg: &DheRequest,
        client_key: &IdentityPublicKey,
        now: Timestamp,
    ) -> Result<(DheResponse, SessionKey)> {
        if !msg.timestamp.is_within(now, self.max_timestamp_skew) {
            return Err(CoreError::invalid_timestamp(format!(
                "exchange timestamp {} is not within {}s of {}",
                msg.timestamp, self.max_timestamp_skew, now
            )));
        }
        let data = client_exchange_sign_data(session_id, &msg.public_key, msg.timestamp);
        client_key.verify(&data, &msg.signature)?;

        let server_pair = ExchangeKeyPair::generate();
        let shared = server_pair.diffie_hellman(&msg.public_key)?;
        let session_key = derive_session_key(&shared, session_id)?;

        let server_public = server_pair.public_key_bytes();
        let signature = self
            .identity
            .sign(&exchange_sign_data(session_id, &msg.public_key, &server_public));

        Ok((
            DheResponse {
                public_key: server_public.to_vec(),
                signature: signature.to_vec(),
            },
            session_key,
        ))
    }
}

// ============================================
// Client side
// ============================================

/// Completes the client half of the DHE step.
///
/// Verifies the server's signature against `trust_key` before deriving the
/// session key, so a reply from anyone but the domain's key holder fails.
///
/// # Errors
/// - `SignatureVerification`: reply not signed by `trust_key`
/// - `InvalidKey`: unusable server exchange key
pub fn complete_exchange(
    client_pair: &ExchangeKeyPair,
    session_id: &SessionId,
    response: &DheResponse,
    trust_key: &IdentityPublicKey,
) -> Result<SessionKey> {
    let data = exchange_sign_data(
        session_id,
        &client_pair.public_key_bytes(),
        &response.public_key,
    );
    trust_key.verify(&data, &response.signature)?;

    let shared = client_pair.diffie_hellman(&response.public_key)?;
    derive_session_key(&shared, session_id)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_request(identity: &IdentityKeyPair, timestamp: Timestamp) -> InitiateSessionRequest {
        InitiateSessionRequest::signed(identity, "alice@coffee.com", "test", "1.0", timestamp)
    }

    #[test]
    fn test_verify_initiate_ok() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();
        let now = Timestamp::from_secs(1_700_000_000);

        assert!(server.verify_initiate(&signed_request(&client, now), now).is_ok());
    }

    #[test]
    fn test_verify_initiate_rejects_skew() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();
        let now = Timestamp::from_secs(1_700_000_000);
        let stale = signed_request(&client, now.plus_secs(-120));

        assert!(matches!(
            server.verify_initiate(&stale, now),
            Err(CoreError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_verify_initiate_rejects_tampered_identity() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();
        let now = Timestamp::from_secs(1_700_000_000);
        let mut msg = signed_request(&client, now);
        msg.identify_as = "mallory@coffee.com".into();

        assert!(matches!(
            server.verify_initiate(&msg, now),
            Err(CoreError::SignatureVerification)
        ));
    }

    #[test]
    fn test_exchange_agreement() {
        let identity = IdentityKeyPair::generate();
        let trust_key = identity.public_key();
        let server = DefaultHandshakeCrypto::new(identity);
        let client = IdentityKeyPair::generate();
        let session_id = SessionId::generate();
        let now = Timestamp::from_secs(1_700_000_000);

        let client_pair = ExchangeKeyPair::generate();
        let request = DheRequest::signed(&client, &session_id, &client_pair, now);
        let (response, server_key) = server
            .process_exchange(&session_id, &request, &client.public_key(), now)
            .unwrap();
        let client_key =
            complete_exchange(&client_pair, &session_id, &response, &trust_key).unwrap();

        assert_eq!(server_key, client_key);
    }

    #[test]
    fn test_exchange_rejects_untrusted_server() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let impostor_trust = IdentityKeyPair::generate().public_key();
        let client = IdentityKeyPair::generate();
        let session_id = SessionId::generate();
        let now = Timestamp::from_secs(1_700_000_000);

        let client_pair = ExchangeKeyPair::generate();
        let request = DheRequest::signed(&client, &session_id, &client_pair, now);
        let (response, _) = server
            .process_exchange(&session_id, &request, &client.public_key(), now)
            .unwrap();

        assert!(matches!(
            complete_exchange(&client_pair, &session_id, &response, &impostor_trust),
            Err(CoreError::SignatureVerification)
        ));
    }

    #[test]
    fn test_exchange_requires_session_owner_signature() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let owner = IdentityKeyPair::generate();
        let intruder = IdentityKeyPair::generate();
        let session_id = SessionId::generate();
        let now = Timestamp::from_secs(1_700_000_000);

        let request =
            DheRequest::signed(&intruder, &session_id, &ExchangeKeyPair::generate(), now);
        assert!(matches!(
            server.process_exchange(&session_id, &request, &owner.public_key(), now),
            Err(CoreError::SignatureVerification)
        ));

        // signed for another session
        let request = DheRequest::signed(
            &owner,
            &SessionId::generate(),
            &ExchangeKeyPair::generate(),
            now,
        );
        assert!(matches!(
            server.process_exchange(&session_id, &request, &owner.public_key(), now),
            Err(CoreError::SignatureVerification)
        ));
    }

    #[test]
    fn test_exchange_rejects_stale_request() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();
        let session_id = SessionId::generate();
        let now = Timestamp::from_secs(1_700_000_000);

        let request = DheRequest::signed(
            &client,
            &session_id,
            &ExchangeKeyPair::generate(),
            now.plus_secs(-120),
        );
        assert!(matches!(
            server.process_exchange(&session_id, &request, &client.public_key(), now),
            Err(CoreError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_exchange_rejects_bad_client_key() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();
        let session_id = SessionId::generate();
        let now = Timestamp::from_secs(1_700_000_000);

        let public_key = vec![0u8; 5];
        let signature = client
            .sign(&client_exchange_sign_data(&session_id, &public_key, now))
            .to_vec();
        let request = DheRequest {
            public_key,
            timestamp: now,
            signature,
        };
        assert!(server
            .process_exchange(&session_id, &request, &client.public_key(), now)
            .is_err());
    }
}
