// ============================================
// File: crates/socialbox-core/src/protocol/objects.rs
// ============================================
//! # Result Objects
//!
//! Typed RPC results understood by both the server methods that produce
//! them and the client wrappers that decode them.

use serde::{Deserialize, Serialize};

use socialbox_common::{SessionId, Timestamp};

use crate::address::PeerAddress;
use crate::flags::SessionFlag;

/// Result of `getSessionState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Session id.
    pub id: SessionId,
    /// Peer the session identified as.
    pub identified_as: PeerAddress,
    /// Whether the session is authenticated.
    pub authenticated: bool,
    /// Outstanding flags, sorted.
    pub flags: Vec<SessionFlag>,
    /// Creation time.
    pub created: Timestamp,
}

impl SessionState {
    /// Returns `true` if `flag` is outstanding.
    #[must_use]
    pub fn contains_flag(&self, flag: SessionFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Public view of a peer returned by `resolvePeer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerView {
    /// Peer address.
    pub address: PeerAddress,
    /// Display name, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Display picture (opaque encoded data), if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_picture: Option<String>,
    /// Registration time.
    pub registered: Timestamp,
}

/// Result of `verificationGetImageCaptcha`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaChallenge {
    /// Time after which answers are rejected.
    pub expires: Timestamp,
    /// Rendered challenge content.
    pub content: String,
}
