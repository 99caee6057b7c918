// ============================================
// File: crates/socialbox-server/src/storage/mod.rs
// ============================================
//! # Persistence Port
//!
//! ## Creation Reason
//! Sessions, peers and captchas must outlive a single request, but the
//! server does not own a storage engine. Everything that persists goes
//! through the [`Storage`] trait, injected where it is needed.
//!
//! ## Main Functionality
//! - `Storage`: the persistence port
//! - `SessionRecord`, `PeerRecord`, `CaptchaRecord`: persisted shapes
//! - `StorageError`: port failure, always reported as internal
//! - [`memory`]: in-memory adapter with write-failure injection
//!
//! ## ⚠️ Important Note for Next Developer
//! - Session key material is never persisted; a session loaded back from
//!   storage must redo the key exchange
//! - Callers write first and only then update in-memory state
//!
//! ## Last Modified
//! v0.1.0 - Initial persistence port

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use socialbox_common::{PeerId, SessionId, Timestamp};
use socialbox_core::protocol::{PeerView, SessionState};
use socialbox_core::{FlagSet, IdentityPublicKey, PeerAddress};

pub use memory::MemoryStorage;

/// Result type for persistence operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Persistence port failure.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// A storage operation failed.
    #[error("Database operation '{operation}' failed: {reason}")]
    Operation {
        /// Port method that failed
        operation: &'static str,
        /// Backend detail
        reason: String,
    },
}

impl StorageError {
    /// Creates an `Operation` error.
    pub fn operation(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            reason: reason.into(),
        }
    }
}

// ============================================
// Records
// ============================================

/// Persisted session, without key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session id
    pub id: SessionId,
    /// Peer the session belongs to
    pub peer_id: PeerId,
    /// Address claimed at `init`
    pub identified_as: PeerAddress,
    /// Identity key presented at `init`
    pub client_public_key: IdentityPublicKey,
    /// Reported client name
    pub client_name: String,
    /// Reported client version
    pub client_version: String,
    /// Outstanding flags
    pub flags: FlagSet,
    /// Whether the session is authenticated
    pub authenticated: bool,
    /// Creation time
    pub created: Timestamp,
}

impl SessionRecord {
    /// Returns the RPC view of this record.
    #[must_use]
    pub fn to_state(&self) -> SessionState {
        SessionState {
            id: self.id,
            identified_as: self.identified_as.clone(),
            authenticated: self.authenticated,
            flags: self.flags.iter().copied().collect(),
            created: self.created,
        }
    }
}

/// Persisted peer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Peer id
    pub id: PeerId,
    /// Address
    pub address: PeerAddress,
    /// Display name
    pub display_name: Option<String>,
    /// Display picture, base64
    pub display_picture: Option<String>,
    /// Argon2id PHC string
    pub password_hash: Option<String>,
    /// `false` until registration completes
    pub enabled: bool,
    /// Creation time
    pub created: Timestamp,
}

impl PeerRecord {
    /// Creates a disabled record for a peer that is about to register.
    #[must_use]
    pub fn new(address: PeerAddress, created: Timestamp) -> Self {
        Self {
            id: PeerId::generate(),
            address,
            display_name: None,
            display_picture: None,
            password_hash: None,
            enabled: false,
            created,
        }
    }

    /// Returns the public view of this peer.
    #[must_use]
    pub fn to_view(&self) -> PeerView {
        PeerView {
            address: self.address.clone(),
            display_name: self.display_name.clone(),
            display_picture: self.display_picture.clone(),
            registered: self.created,
        }
    }
}

/// Captcha lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaptchaStatus {
    /// Waiting for an answer
    Unsolved,
    /// Answered correctly
    Solved,
}

/// Persisted captcha, one per peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaRecord {
    /// Owning peer
    pub peer_id: PeerId,
    /// Expected answer
    pub answer: String,
    /// Status
    pub status: CaptchaStatus,
    /// Creation time
    pub created: Timestamp,
    /// Time of the correct answer
    pub answered: Option<Timestamp>,
}

// ============================================
// Storage
// ============================================

/// Persistence port.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Loads a session.
    async fn load_session(&self, id: SessionId) -> StorageResult<Option<SessionRecord>>;

    /// Inserts or replaces a session.
    async fn save_session(&self, record: &SessionRecord) -> StorageResult<()>;

    /// Replaces the flags of a session.
    async fn save_session_flags(&self, id: SessionId, flags: &FlagSet) -> StorageResult<()>;

    /// Replaces the authenticated bit of a session.
    async fn save_authenticated(&self, id: SessionId, authenticated: bool) -> StorageResult<()>;

    /// Deletes a session.
    async fn delete_session(&self, id: SessionId) -> StorageResult<()>;

    /// Loads a peer by address.
    async fn load_peer_record(&self, address: &PeerAddress) -> StorageResult<Option<PeerRecord>>;

    /// Loads a peer by id.
    async fn load_peer_by_id(&self, id: PeerId) -> StorageResult<Option<PeerRecord>>;

    /// Inserts or replaces a peer.
    async fn save_peer_record(&self, record: &PeerRecord) -> StorageResult<()>;

    /// Loads the captcha of a peer.
    async fn load_captcha_record(&self, peer_id: PeerId) -> StorageResult<Option<CaptchaRecord>>;

    /// Inserts or replaces the captcha of a peer.
    async fn save_captcha_record(&self, record: &CaptchaRecord) -> StorageResult<()>;
}
