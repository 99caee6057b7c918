// ============================================
// File: crates/socialbox-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Typed identifiers for sessions and peers. Both are UUIDs on the wire, but
//! keeping them as distinct newtypes stops a peer id being used where a
//! session id is expected (the storage port takes both).
//!
//! ## Main Functionality
//! - `SessionId`: server-allocated session identifier (random v4 UUID)
//! - `PeerId`: stable identifier of a registered peer record
//!
//! ## ⚠️ Important Note for Next Developer
//! - `SessionId` is a bearer reference to encrypted state; always generate
//!   it from the OS RNG (`Uuid::new_v4`)
//! - The hyphenated lowercase form is the canonical wire form
//!
//! ## Last Modified
//! v0.1.0 - UUID based identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CommonError;

// ============================================
// Identifier macro
// ============================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the 16 raw bytes of the identifier.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = CommonError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| CommonError::decoding($label, e.to_string()))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

uuid_id!(
    /// Unique identifier of a server-side session.
    ///
    /// # Example
    /// ```
    /// use socialbox_common::types::SessionId;
    ///
    /// let id = SessionId::generate();
    /// let parsed: SessionId = id.to_string().parse().unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    SessionId,
    "SessionId"
);

uuid_id!(
    /// Unique identifier of a registered peer.
    PeerId,
    "PeerId"
);

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_generation() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_bytes().len(), 16);
    }

    #[test]
    fn test_session_id_string_roundtrip() {
        let id = SessionId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text.parse::<SessionId>().unwrap(), id);
    }

    #[test]
    fn test_invalid_id_rejected() {
        let err = "not-a-uuid".parse::<PeerId>().unwrap_err();
        assert!(matches!(err, CommonError::Decoding { .. }));
    }

    #[test]
    fn test_id_json_is_plain_string() {
        let id = PeerId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
