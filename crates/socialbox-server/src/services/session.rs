// ============================================
// File: crates/socialbox-server/src/services/session.rs
// ============================================
//! # Session Management Service
//!
//! ## Creation Reason
//! Owns every live session: its flag state machine, its key, its idle
//! clock and its close signal. Flag changes go through here so they are
//! serialized per session and persisted before they take effect.
//!
//! ## Main Functionality
//! - `Session`: one session, mutations return the new `SessionState`
//! - `SessionManager`: lifecycle, lookup, resume from storage, expiry
//!
//! ## Session Lifecycle
//! ```text
//! ┌──────────┐   init    ┌──────────┐   dhe    ┌─────────────┐
//! │  (none)  │ ────────► │ Created  │ ───────► │   Keyed     │◄──┐ dhe
//! └──────────┘           └────┬─────┘          └──────┬──────┘───┘ (rekey)
//!                             │                       │
//!                             │       flags cleared   ▼
//!                             │               ┌───────────────┐
//!                             │               │ Authenticated │
//!                             │               └───────┬───────┘
//!                             │  expiry / close /     │
//!                             │  decryption failure   │
//!                             └──────────┬────────────┘
//!                                        ▼
//!                                  ┌──────────┐
//!                                  │  Closed  │
//!                                  └──────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Sessions are stored in a DashMap for concurrent access
//! - Every mutation writes to storage first; on failure the in-memory
//!   state is untouched and the caller gets the storage error
//! - The state mutex is a tokio mutex because it is held across the
//!   storage await
//! - Closing wakes everyone waiting in `Session::closed()`
//!
//! ## Last Modified
//! v0.1.0 - Initial session management

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use socialbox_common::time::AtomicInstant;
use socialbox_common::{PeerId, SessionId};
use socialbox_core::flags::is_complete;
use socialbox_core::protocol::SessionState;
use socialbox_core::{IdentityPublicKey, PeerAddress, SecureCodec, SessionFlag};

use crate::error::{Result, ServerError};
use crate::storage::{SessionRecord, Storage};

// ============================================
// Session
// ============================================

/// A live session.
pub struct Session {
    id: SessionId,
    peer_id: PeerId,
    identified_as: PeerAddress,
    client_public_key: IdentityPublicKey,
    record: Mutex<SessionRecord>,
    codec: RwLock<Option<Arc<SecureCodec>>>,
    last_activity: AtomicInstant,
    closed: watch::Sender<bool>,
    storage: Arc<dyn Storage>,
}

impl Session {
    fn new(record: SessionRecord, storage: Arc<dyn Storage>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: record.id,
            peer_id: record.peer_id,
            identified_as: record.identified_as.clone(),
            client_public_key: record.client_public_key,
            record: Mutex::new(record),
            codec: RwLock::new(None),
            last_activity: AtomicInstant::now(),
            closed,
            storage,
        }
    }

    /// Returns the session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the owning peer.
    #[must_use]
    pub const fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Returns the address claimed at `init`.
    #[must_use]
    pub const fn identified_as(&self) -> &PeerAddress {
        &self.identified_as
    }

    /// Returns the identity key presented at `init`.
    #[must_use]
    pub const fn client_public_key(&self) -> &IdentityPublicKey {
        &self.client_public_key
    }

    /// Returns the current state.
    pub async fn snapshot(&self) -> SessionState {
        self.record.lock().await.to_state()
    }

    /// Returns `true` if `flag` is outstanding.
    pub async fn has_flag(&self, flag: SessionFlag) -> bool {
        self.record.lock().await.flags.contains(&flag)
    }

    // ========================================
    // State Machine
    // ========================================

    /// Adds `flags`; already present flags are ignored.
    ///
    /// # Errors
    /// Returns `Storage` if the new flag set cannot be persisted.
    pub async fn add_flags(&self, flags: &[SessionFlag]) -> Result<SessionState> {
        let mut record = self.record.lock().await;
        let mut next = record.flags.clone();
        next.extend(flags.iter().copied());
        if next != record.flags {
            self.storage.save_session_flags(self.id, &next).await?;
            record.flags = next;
            debug!(session_id = %self.id, flags = ?flags, "Flags added");
        }
        Ok(record.to_state())
    }

    /// Removes `flags`; absent flags are ignored.
    ///
    /// # Errors
    /// Returns `Storage` if the new flag set cannot be persisted.
    pub async fn remove_flags(&self, flags: &[SessionFlag]) -> Result<SessionState> {
        let mut record = self.record.lock().await;
        let mut next = record.flags.clone();
        for flag in flags {
            next.remove(flag);
        }
        if next != record.flags {
            self.storage.save_session_flags(self.id, &next).await?;
            record.flags = next;
            debug!(session_id = %self.id, flags = ?flags, "Flags removed");
        }
        Ok(record.to_state())
    }

    /// Sets the authenticated bit.
    ///
    /// Authenticating also drops `REGISTRATION_REQUIRED` and
    /// `AUTHENTICATION_REQUIRED`.
    ///
    /// # Errors
    /// - `Forbidden` if authenticating while gating flags remain
    /// - `Storage` if the change cannot be persisted
    pub async fn set_authenticated(&self, authenticated: bool) -> Result<SessionState> {
        let mut record = self.record.lock().await;

        if !authenticated {
            if record.authenticated {
                self.storage.save_authenticated(self.id, false).await?;
                record.authenticated = false;
            }
            return Ok(record.to_state());
        }

        if !is_complete(&record.flags) {
            return Err(ServerError::forbidden(
                "Cannot authenticate while verification steps remain",
            ));
        }

        let mut next = record.clone();
        next.authenticated = true;
        next.flags.remove(&SessionFlag::RegistrationRequired);
        next.flags.remove(&SessionFlag::AuthenticationRequired);
        if next != *record {
            self.storage.save_session(&next).await?;
            *record = next;
            info!(
                session_id = %self.id,
                peer = %self.identified_as,
                "Session authenticated"
            );
        }
        Ok(record.to_state())
    }

    // ========================================
    // Key Material
    // ========================================

    /// Returns the codec of the current key, `None` before DHE.
    #[must_use]
    pub fn codec(&self) -> Option<Arc<SecureCodec>> {
        self.codec.read().clone()
    }

    /// Installs a new key, replacing any previous one.
    pub fn install_codec(&self, codec: SecureCodec) {
        let rotated = self.codec.write().replace(Arc::new(codec)).is_some();
        debug!(session_id = %self.id, rotated, "Session key installed");
    }

    // ========================================
    // Activity / Close
    // ========================================

    /// Marks the session as used now.
    pub fn touch(&self) {
        self.last_activity.touch();
    }

    /// Returns how long the session has been idle.
    #[must_use]
    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Returns `true` if idle for longer than `ttl`.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_activity.has_elapsed(ttl)
    }

    /// Returns `true` once the session is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Closes the session and wakes every waiter.
    pub fn close(&self) {
        self.closed.send_replace(true);
        self.codec.write().take();
    }

    /// Resolves once the session is closed.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("identified_as", &self.identified_as)
            .field("keyed", &self.codec.read().is_some())
            .field("closed", &self.is_closed())
            .field("idle_time", &self.idle_time())
            .finish_non_exhaustive()
    }
}

// ============================================
// Session Manager
// ============================================

/// Manages all live sessions.
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<Session>>,
    storage: Arc<dyn Storage>,
    max_sessions: usize,
    session_ttl: Duration,
}

impl SessionManager {
    /// Creates a manager persisting through `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, max_sessions: usize, session_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            storage,
            max_sessions,
            session_ttl,
        }
    }

    /// Persists and registers a new session.
    ///
    /// # Errors
    /// - `SessionLimitReached` if the manager is full
    /// - `Storage` if the record cannot be saved
    pub async fn create(&self, record: SessionRecord) -> Result<Arc<Session>> {
        if self.sessions.len() >= self.max_sessions {
            return Err(ServerError::SessionLimitReached {
                limit: self.max_sessions,
            });
        }

        self.storage.save_session(&record).await?;

        let session = Arc::new(Session::new(record, Arc::clone(&self.storage)));
        self.sessions.insert(session.id(), Arc::clone(&session));

        info!(
            session_id = %session.id(),
            peer = %session.identified_as(),
            "Session created"
        );
        Ok(session)
    }

    /// Returns a live session.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Returns a live session, or `SessionNotFound`.
    ///
    /// # Errors
    /// Returns `SessionNotFound` if no live session has this id.
    pub fn get_or_error(&self, id: &SessionId) -> Result<Arc<Session>> {
        self.get(id).ok_or(ServerError::SessionNotFound(*id))
    }

    /// Returns a live session or brings a persisted one back without a key.
    ///
    /// # Errors
    /// - `SessionNotFound` if neither memory nor storage knows the id
    /// - `Storage` if the lookup fails
    pub async fn resume(&self, id: &SessionId) -> Result<Arc<Session>> {
        if let Some(session) = self.get(id) {
            return Ok(session);
        }
        let record = self
            .storage
            .load_session(*id)
            .await?
            .ok_or(ServerError::SessionNotFound(*id))?;

        let session = Arc::new(Session::new(record, Arc::clone(&self.storage)));
        let session = Arc::clone(self.sessions.entry(*id).or_insert(session).value());
        debug!(session_id = %id, "Session resumed from storage");
        Ok(session)
    }

    /// Closes and forgets a session.
    pub async fn close(&self, id: &SessionId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(id)?;
        session.close();
        if let Err(e) = self.storage.delete_session(*id).await {
            warn!(session_id = %id, error = %e, "Failed to delete closed session");
        }
        info!(session_id = %id, "Session closed");
        Some(session)
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Closes every session idle for longer than the TTL.
    pub async fn cleanup_expired(&self) -> Vec<SessionId> {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired(self.session_ttl))
            .map(|entry| *entry.key())
            .collect();

        for id in &expired {
            debug!(session_id = %id, "Session expired");
            self.close(id).await;
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Cleaned up expired sessions");
        }
        expired
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.count())
            .field("max_sessions", &self.max_sessions)
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use socialbox_common::Timestamp;
    use socialbox_core::{FlagSet, IdentityKeyPair, SessionKey};

    fn record(flags: &[SessionFlag]) -> SessionRecord {
        SessionRecord {
            id: SessionId::generate(),
            peer_id: PeerId::generate(),
            identified_as: PeerAddress::parse("alice@coffee.com").unwrap(),
            client_public_key: IdentityKeyPair::generate().public_key(),
            client_name: "test".to_string(),
            client_version: "1.0".to_string(),
            flags: flags.iter().copied().collect(),
            authenticated: false,
            created: Timestamp::from_secs(1_000),
        }
    }

    fn manager(storage: &Arc<MemoryStorage>) -> SessionManager {
        SessionManager::new(storage.clone(), 8, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_flag_mutations_persist_and_return_state() {
        let storage = Arc::new(MemoryStorage::new());
        let sessions = manager(&storage);
        let session = sessions
            .create(record(&[SessionFlag::RegistrationRequired]))
            .await
            .unwrap();

        let state = session
            .add_flags(&[SessionFlag::SetPassword, SessionFlag::SetPassword])
            .await
            .unwrap();
        assert!(state.contains_flag(SessionFlag::SetPassword));

        let stored = storage.load_session(session.id()).await.unwrap().unwrap();
        assert!(stored.flags.contains(&SessionFlag::SetPassword));

        let state = session
            .remove_flags(&[SessionFlag::SetPassword, SessionFlag::VerOtp])
            .await
            .unwrap();
        assert!(!state.contains_flag(SessionFlag::SetPassword));
    }

    #[tokio::test]
    async fn test_set_authenticated_requires_completion() {
        let storage = Arc::new(MemoryStorage::new());
        let sessions = manager(&storage);
        let session = sessions
            .create(record(&[
                SessionFlag::RegistrationRequired,
                SessionFlag::SetDisplayName,
            ]))
            .await
            .unwrap();

        let err = session.set_authenticated(true).await.unwrap_err();
        assert!(matches!(err, ServerError::Forbidden { .. }));
        assert!(!session.snapshot().await.authenticated);

        session
            .remove_flags(&[SessionFlag::SetDisplayName])
            .await
            .unwrap();
        let state = session.set_authenticated(true).await.unwrap();
        assert!(state.authenticated);
        assert!(state.flags.is_empty());

        let stored = storage.load_session(session.id()).await.unwrap().unwrap();
        assert!(stored.authenticated);
        assert_eq!(stored.flags, FlagSet::new());
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_state_unchanged() {
        let storage = Arc::new(MemoryStorage::new());
        let sessions = manager(&storage);
        let session = sessions
            .create(record(&[SessionFlag::VerPrivacyPolicy]))
            .await
            .unwrap();

        storage.set_fail_writes(true);
        let err = session
            .remove_flags(&[SessionFlag::VerPrivacyPolicy])
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Storage(_)));
        assert!(session.has_flag(SessionFlag::VerPrivacyPolicy).await);
    }

    #[tokio::test]
    async fn test_session_limit() {
        let storage = Arc::new(MemoryStorage::new());
        let sessions = SessionManager::new(storage, 1, Duration::from_secs(60));
        sessions.create(record(&[])).await.unwrap();
        assert!(matches!(
            sessions.create(record(&[])).await,
            Err(ServerError::SessionLimitReached { limit: 1 })
        ));
    }

    #[tokio::test]
    async fn test_close_wakes_waiters_and_drops_key() {
        let storage = Arc::new(MemoryStorage::new());
        let sessions = manager(&storage);
        let session = sessions.create(record(&[])).await.unwrap();
        session.install_codec(SecureCodec::new(
            SessionKey::from_bytes([1u8; 32]),
            session.id(),
        ));

        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.closed().await })
        };

        sessions.close(&session.id()).await.unwrap();
        waiter.await.unwrap();
        assert!(session.is_closed());
        assert!(session.codec().is_none());
        assert!(sessions.get(&session.id()).is_none());
        assert_eq!(storage.session_count(), 0);
    }

    #[tokio::test]
    async fn test_resume_from_storage_without_key() {
        let storage = Arc::new(MemoryStorage::new());
        let rec = record(&[SessionFlag::SetPassword]);
        storage.save_session(&rec).await.unwrap();

        let sessions = manager(&storage);
        let session = sessions.resume(&rec.id).await.unwrap();
        assert!(session.codec().is_none());
        assert!(session.has_flag(SessionFlag::SetPassword).await);

        let missing = sessions.resume(&SessionId::generate()).await;
        assert!(matches!(missing, Err(ServerError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let storage = Arc::new(MemoryStorage::new());
        let sessions = SessionManager::new(storage, 8, Duration::ZERO);
        let session = sessions.create(record(&[])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let expired = sessions.cleanup_expired().await;
        assert_eq!(expired, vec![session.id()]);
        assert!(session.is_closed());
        assert!(sessions.is_empty());
    }
}
