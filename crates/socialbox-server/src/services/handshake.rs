// ============================================
// File: crates/socialbox-server/src/services/handshake.rs
// ============================================
//! # Handshake Service
//!
//! ## Creation Reason
//! Orchestrates `init` and `dhe`, coordinating the handshake cryptography,
//! peer records, federation trust and the session manager.
//!
//! ## Main Functionality
//! - `HandshakeService::initiate`: verify the signed INIT, decide the
//!   initial flags, create the session
//! - `HandshakeService::exchange`: run the server half of DHE and install
//!   the session key
//! - `HandshakeService::information`: the `info` reply
//!
//! ## Handshake Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    HandshakeService                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  init                                                        │
//! │  1. Verify timestamp and signature (HandshakeCrypto)         │
//! │  2. Parse identify_as                                        │
//! │     ├─ local user    → load / create PeerRecord, pick flags  │
//! │     └─ host@remote   → resolve remote, pin client key        │
//! │  3. Create session (SessionManager)                          │
//! │                                                              │
//! │  dhe                                                         │
//! │  4. Look up session                                          │
//! │  5. Verify the request against the INIT identity key         │
//! │     Ephemeral X25519, derive key, sign transcript            │
//! │  6. Install codec on the session (rotates if keyed)          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Initial Flags
//! | peer                         | flags                                      |
//! |------------------------------|--------------------------------------------|
//! | local, unknown               | REGISTRATION_REQUIRED + configured steps   |
//! | local, registering           | REGISTRATION_REQUIRED + steps not yet done |
//! | local, enabled, has password | AUTHENTICATION_REQUIRED + VER_PASSWORD     |
//! | local, enabled, no password  | none, authenticated                        |
//! | host@other-domain            | none, authenticated                        |
//!
//! ## ⚠️ Important Note for Next Developer
//! - `host@<our domain>` is reserved and always refused
//! - External peers other than `host` cannot open sessions here
//! - A failed INIT must not leave a session behind
//! - A DHE request not signed by the INIT key must leave the session and
//!   its current key untouched
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake service

use std::sync::Arc;

use tracing::{debug, info, warn};

use socialbox_client::FederationResolver;
use socialbox_common::{Clock, SessionId, Timestamp};
use socialbox_core::crypto::HandshakeCrypto;
use socialbox_core::protocol::{
    DheRequest, DheResponse, InitiateSessionRequest, ServerInformation, PROTOCOL_VERSION,
};
use socialbox_core::{is_complete, FlagSet, PeerAddress, SecureCodec, SessionFlag};

use crate::config::{RegistrationConfig, ServerSection};
use crate::error::{Result, ServerError};
use crate::services::{Session, SessionManager};
use crate::storage::{PeerRecord, SessionRecord, Storage};

/// High-level handshake orchestration service.
pub struct HandshakeService {
    crypto: Arc<dyn HandshakeCrypto>,
    sessions: Arc<SessionManager>,
    storage: Arc<dyn Storage>,
    resolver: Arc<FederationResolver>,
    clock: Arc<dyn Clock>,
    server: ServerSection,
    registration: RegistrationConfig,
}

impl HandshakeService {
    /// Creates a new handshake service.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        crypto: Arc<dyn HandshakeCrypto>,
        sessions: Arc<SessionManager>,
        storage: Arc<dyn Storage>,
        resolver: Arc<FederationResolver>,
        clock: Arc<dyn Clock>,
        server: ServerSection,
        registration: RegistrationConfig,
    ) -> Self {
        Self {
            crypto,
            sessions,
            storage,
            resolver,
            clock,
            server,
            registration,
        }
    }

    /// Returns the `info` reply.
    #[must_use]
    pub fn information(&self) -> ServerInformation {
        ServerInformation {
            server_name: self.server.name.clone(),
            domain: self.server.domain.clone(),
            protocol_version: PROTOCOL_VERSION,
            public_key: self.crypto.public_key().to_record_key(),
        }
    }

    // ========================================
    // INITIATE_SESSION
    // ========================================

    /// Processes an `init` request and creates the session.
    ///
    /// # Errors
    /// - `Core` for a bad signature, stale timestamp or malformed address
    /// - `Forbidden` for reserved or non-federating identities, or a key
    ///   that does not match the remote trust key
    /// - `Federation` if a remote domain cannot be resolved
    /// - `SessionLimitReached`, `Storage`
    pub async fn initiate(&self, msg: &InitiateSessionRequest) -> Result<Arc<Session>> {
        let now = self.clock.now();
        self.crypto.verify_initiate(msg, now)?;

        let address = PeerAddress::parse(&msg.identify_as)?;
        let (peer, flags, authenticated) = if address.is_local(&self.server.domain) {
            self.local_peer(&address, now).await?
        } else {
            self.federated_peer(&address, msg, now).await?
        };

        let record = SessionRecord {
            id: SessionId::generate(),
            peer_id: peer.id,
            identified_as: address,
            client_public_key: msg.public_key,
            client_name: msg.client_name.clone(),
            client_version: msg.client_version.clone(),
            flags,
            authenticated,
            created: now,
        };
        let session = self.sessions.create(record).await?;

        info!(
            session_id = %session.id(),
            peer = %session.identified_as(),
            client = %msg.client_name,
            authenticated,
            "Session initiated"
        );
        Ok(session)
    }

    async fn local_peer(
        &self,
        address: &PeerAddress,
        now: Timestamp,
    ) -> Result<(PeerRecord, FlagSet, bool)> {
        if address.is_host() {
            return Err(ServerError::forbidden(
                "The host identity is reserved for this server",
            ));
        }

        match self.storage.load_peer_record(address).await? {
            Some(peer) if peer.enabled => {
                let mut flags = FlagSet::new();
                if peer.password_hash.is_some() {
                    flags.insert(SessionFlag::AuthenticationRequired);
                    flags.insert(SessionFlag::VerPassword);
                }
                let authenticated = flags.is_empty();
                debug!(peer = %address, authenticated, "Returning peer");
                Ok((peer, flags, authenticated))
            }
            Some(mut peer) => {
                let flags = self.remaining_registration(&peer);
                if is_complete(&flags) {
                    peer.enabled = true;
                    self.storage.save_peer_record(&peer).await?;
                    info!(peer = %address, "Registration completed on reconnect");
                    return Ok((peer, FlagSet::new(), true));
                }
                debug!(peer = %address, "Peer resumes registration");
                Ok((peer, flags, false))
            }
            None => {
                let mut peer = PeerRecord::new(address.clone(), now);
                let mut flags = self.registration.registration_flags();
                if is_complete(&flags) {
                    peer.enabled = true;
                    self.storage.save_peer_record(&peer).await?;
                    info!(peer = %address, peer_id = %peer.id, "Peer registered without steps");
                    return Ok((peer, FlagSet::new(), true));
                }
                self.storage.save_peer_record(&peer).await?;
                flags.insert(SessionFlag::RegistrationRequired);
                debug!(peer = %address, peer_id = %peer.id, "New peer registering");
                Ok((peer, flags, false))
            }
        }
    }

    /// Registration steps still outstanding for a peer that never finished.
    fn remaining_registration(&self, peer: &PeerRecord) -> FlagSet {
        let mut flags = self.registration.registration_flags();
        if peer.password_hash.is_some() {
            flags.remove(&SessionFlag::SetPassword);
        }
        if peer.display_name.is_some() {
            flags.remove(&SessionFlag::SetDisplayName);
        }
        if peer.display_picture.is_some() {
            flags.remove(&SessionFlag::SetDisplayPicture);
        }
        flags.insert(SessionFlag::RegistrationRequired);
        flags
    }

    async fn federated_peer(
        &self,
        address: &PeerAddress,
        msg: &InitiateSessionRequest,
        now: Timestamp,
    ) -> Result<(PeerRecord, FlagSet, bool)> {
        if !address.is_host() {
            return Err(ServerError::forbidden(format!(
                "External peer '{address}' cannot open a session on {}",
                self.server.domain
            )));
        }

        let record = self.resolver.resolve(address.domain()).await?;
        if record.is_key_expired(now) {
            return Err(ServerError::forbidden(format!(
                "The trust key of {} has expired",
                address.domain()
            )));
        }
        if record.trust_key() != &msg.public_key {
            warn!(
                domain = %address.domain(),
                "Federation INIT key does not match the discovery record"
            );
            return Err(ServerError::forbidden(format!(
                "Client key does not match the trust key of {}",
                address.domain()
            )));
        }

        let peer = match self.storage.load_peer_record(address).await? {
            Some(peer) if peer.enabled => peer,
            existing => {
                let mut peer =
                    existing.unwrap_or_else(|| PeerRecord::new(address.clone(), now));
                peer.enabled = true;
                self.storage.save_peer_record(&peer).await?;
                peer
            }
        };

        info!(domain = %address.domain(), "Federated server session accepted");
        Ok((peer, FlagSet::new(), true))
    }

    // ========================================
    // DHE_EXCHANGE
    // ========================================

    /// Runs the key exchange for `session_id` and installs the new key.
    ///
    /// Re-running on a keyed session rotates the key; flags are untouched.
    ///
    /// # Errors
    /// - `SessionNotFound` if the session does not exist
    /// - `Core` if the request is not signed by the session's INIT key, is
    ///   stale, or carries an unusable exchange key
    pub async fn exchange(&self, session_id: SessionId, msg: &DheRequest) -> Result<DheResponse> {
        let session = self.sessions.resume(&session_id).await?;
        let (response, key) = self
            .crypto
            .process_exchange(&session_id, msg, session.client_public_key(), self.clock.now())
            .map_err(|e| {
                warn!(session_id = %session_id, error = %e, "Key exchange refused");
                e
            })?;
        session.install_codec(SecureCodec::new(key, session_id));
        session.touch();
        debug!(session_id = %session_id, "Key exchange completed");
        Ok(response)
    }
}

impl std::fmt::Debug for HandshakeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeService")
            .field("domain", &self.server.domain)
            .field("public_key", &self.crypto.public_key())
            .field("sessions", &self.sessions.count())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use socialbox_client::StaticRecordLookup;
    use socialbox_common::ManualClock;
    use socialbox_core::crypto::handshake::complete_exchange;
    use socialbox_core::crypto::{DefaultHandshakeCrypto, ExchangeKeyPair};
    use socialbox_core::IdentityKeyPair;

    use crate::storage::MemoryStorage;

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        service: HandshakeService,
        storage: Arc<MemoryStorage>,
        server_identity: IdentityKeyPair,
        resolver: Arc<FederationResolver>,
    }

    fn fixture(registration: RegistrationConfig) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let server_identity = IdentityKeyPair::generate();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(NOW));
        let resolver = Arc::new(
            FederationResolver::new(Arc::new(StaticRecordLookup::new()))
                .with_clock(Arc::clone(&clock)),
        );
        let sessions = Arc::new(SessionManager::new(
            storage.clone(),
            16,
            Duration::from_secs(3600),
        ));
        let server = ServerSection {
            domain: "coffee.com".to_string(),
            ..ServerSection::default()
        };
        let service = HandshakeService::new(
            Arc::new(DefaultHandshakeCrypto::new(server_identity.clone())),
            sessions,
            storage.clone(),
            Arc::clone(&resolver),
            clock,
            server,
            registration,
        );
        Fixture {
            service,
            storage,
            server_identity,
            resolver,
        }
    }

    fn init(identity: &IdentityKeyPair, identify_as: &str) -> InitiateSessionRequest {
        InitiateSessionRequest::signed(
            identity,
            identify_as,
            "test",
            "1.0",
            Timestamp::from_secs(NOW),
        )
    }

    #[tokio::test]
    async fn test_new_peer_gets_registration_flags() {
        let fx = fixture(RegistrationConfig::default());
        let session = fx
            .service
            .initiate(&init(&IdentityKeyPair::generate(), "alice@coffee.com"))
            .await
            .unwrap();

        let state = session.snapshot().await;
        assert!(!state.authenticated);
        assert!(state.contains_flag(SessionFlag::RegistrationRequired));
        assert!(state.contains_flag(SessionFlag::SetPassword));
        assert!(state.contains_flag(SessionFlag::SetDisplayName));
        assert_eq!(fx.storage.peer_count(), 1);
    }

    #[tokio::test]
    async fn test_returning_peer_needs_password() {
        let fx = fixture(RegistrationConfig::default());
        let address = PeerAddress::parse("alice@coffee.com").unwrap();
        let mut peer = PeerRecord::new(address, Timestamp::from_secs(NOW - 100));
        peer.enabled = true;
        peer.password_hash = Some("$argon2id$stub".to_string());
        fx.storage.save_peer_record(&peer).await.unwrap();

        let session = fx
            .service
            .initiate(&init(&IdentityKeyPair::generate(), "alice@coffee.com"))
            .await
            .unwrap();
        let state = session.snapshot().await;
        assert!(state.contains_flag(SessionFlag::AuthenticationRequired));
        assert!(state.contains_flag(SessionFlag::VerPassword));
        assert_eq!(session.peer_id(), peer.id);
    }

    #[tokio::test]
    async fn test_reserved_and_external_identities_refused() {
        let fx = fixture(RegistrationConfig::default());
        let identity = IdentityKeyPair::generate();

        let err = fx
            .service
            .initiate(&init(&identity, "host@coffee.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Forbidden { .. }));

        let err = fx
            .service
            .initiate(&init(&identity, "bob@teapot.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_federated_host_must_match_trust_key() {
        let fx = fixture(RegistrationConfig::default());
        let remote = IdentityKeyPair::generate();
        fx.resolver.add_mock(
            "teapot.com",
            format!(
                "v=socialbox;sb-rpc=https://rpc.teapot.com/;sb-key={};sb-exp=0",
                remote.public_key().to_record_key()
            ),
        );

        let err = fx
            .service
            .initiate(&init(&IdentityKeyPair::generate(), "host@teapot.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Forbidden { .. }));

        let session = fx
            .service
            .initiate(&init(&remote, "host@teapot.com"))
            .await
            .unwrap();
        let state = session.snapshot().await;
        assert!(state.authenticated);
        assert!(state.flags.is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_creates_nothing() {
        let fx = fixture(RegistrationConfig::default());
        let mut msg = init(&IdentityKeyPair::generate(), "alice@coffee.com");
        msg.identify_as = "mallory@coffee.com".to_string();

        let err = fx.service.initiate(&msg).await.unwrap_err();
        assert!(err.to_rpc_error(false).code == socialbox_core::StandardError::CryptographicError);
        assert_eq!(fx.storage.peer_count(), 0);
        assert_eq!(fx.storage.session_count(), 0);
    }

    fn dhe(
        identity: &IdentityKeyPair,
        session_id: SessionId,
        pair: &ExchangeKeyPair,
    ) -> DheRequest {
        DheRequest::signed(identity, &session_id, pair, Timestamp::from_secs(NOW))
    }

    #[tokio::test]
    async fn test_exchange_installs_and_rotates_key() {
        let fx = fixture(RegistrationConfig::default());
        let client_identity = IdentityKeyPair::generate();
        let session = fx
            .service
            .initiate(&init(&client_identity, "alice@coffee.com"))
            .await
            .unwrap();
        assert!(session.codec().is_none());
        let flags_before = session.snapshot().await.flags;

        let client = ExchangeKeyPair::generate();
        let response = fx
            .service
            .exchange(session.id(), &dhe(&client_identity, session.id(), &client))
            .await
            .unwrap();
        let key = complete_exchange(
            &client,
            &session.id(),
            &response,
            &fx.server_identity.public_key(),
        )
        .unwrap();

        let client_codec = SecureCodec::new(key, session.id());
        let sealed = client_codec.seal(&"hello").unwrap();
        let server_codec = session.codec().unwrap();
        assert_eq!(server_codec.open::<String>(&sealed).unwrap(), "hello");

        let second = ExchangeKeyPair::generate();
        fx.service
            .exchange(session.id(), &dhe(&client_identity, session.id(), &second))
            .await
            .unwrap();
        assert!(session.codec().unwrap().open::<String>(&sealed).is_err());
        assert_eq!(session.snapshot().await.flags, flags_before);
    }

    #[tokio::test]
    async fn test_exchange_by_other_identity_is_refused() {
        let fx = fixture(RegistrationConfig::default());
        let owner = IdentityKeyPair::generate();
        let session = fx
            .service
            .initiate(&init(&owner, "alice@coffee.com"))
            .await
            .unwrap();
        let owner_pair = ExchangeKeyPair::generate();
        let response = fx
            .service
            .exchange(session.id(), &dhe(&owner, session.id(), &owner_pair))
            .await
            .unwrap();
        let key = complete_exchange(
            &owner_pair,
            &session.id(),
            &response,
            &fx.server_identity.public_key(),
        )
        .unwrap();
        let sealed = SecureCodec::new(key, session.id()).seal(&"still mine").unwrap();

        // someone who learned the session id tries to re-key it
        let intruder = IdentityKeyPair::generate();
        let err = fx
            .service
            .exchange(
                session.id(),
                &dhe(&intruder, session.id(), &ExchangeKeyPair::generate()),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_rpc_error(false).code,
            socialbox_core::StandardError::CryptographicError
        );

        // an unsigned request is refused the same way
        let mut unsigned = dhe(&owner, session.id(), &ExchangeKeyPair::generate());
        unsigned.signature = vec![0; 64];
        assert!(fx.service.exchange(session.id(), &unsigned).await.is_err());

        let codec = session.codec().unwrap();
        assert_eq!(codec.open::<String>(&sealed).unwrap(), "still mine");
    }

    #[tokio::test]
    async fn test_exchange_unknown_session() {
        let fx = fixture(RegistrationConfig::default());
        let id = SessionId::generate();
        let err = fx
            .service
            .exchange(
                id,
                &dhe(&IdentityKeyPair::generate(), id, &ExchangeKeyPair::generate()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::SessionNotFound(_)));
    }

    #[test]
    fn test_information() {
        let fx = fixture(RegistrationConfig::default());
        let info = fx.service.information();
        assert_eq!(info.domain, "coffee.com");
        assert_eq!(info.public_key, fx.server_identity.public_key().to_record_key());
    }
}
