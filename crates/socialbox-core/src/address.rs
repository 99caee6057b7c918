// ============================================
// File: crates/socialbox-core/src/address.rs
// ============================================
//! # Peer Addresses
//!
//! ## Creation Reason
//! Every peer is named `username@domain`. The domain part decides whether a
//! request is served locally or has to go through federation, so parsing is
//! strict and produces a single canonical form.
//!
//! ## Grammar
//! ```text
//! address  = username "@" domain
//! username = 1*64( ALPHA / DIGIT / "_" / "." / "+" / "-" ), not starting with "."
//! domain   = label *( "." label ), total length <= 253
//! label    = 1*63( ALPHA / DIGIT / "-" ), not starting or ending with "-"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Parsing lower-cases both parts; equality is therefore case-insensitive
//! - `host` is the reserved username a server uses when it calls another
//!   server; never let a peer register it
//!
//! ## Last Modified
//! v0.1.0 - Initial address parsing

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};

/// Reserved username identifying a server acting as a federation client.
pub const HOST_USERNAME: &str = "host";

const MAX_USERNAME_LEN: usize = 64;
const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

// ============================================
// PeerAddress
// ============================================

/// A validated `username@domain` peer address.
///
/// # Example
/// ```
/// use socialbox_core::address::PeerAddress;
///
/// let alice: PeerAddress = "Alice@Coffee.com".parse().unwrap();
/// assert_eq!(alice.to_string(), "alice@coffee.com");
/// assert!(alice.is_local("coffee.com"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress {
    username: String,
    domain: String,
}

impl PeerAddress {
    /// Parses and validates an address.
    ///
    /// # Errors
    /// Returns `InvalidAddress` unless the text is exactly one valid
    /// username and one valid domain separated by a single `@`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split('@');
        let (Some(username), Some(domain), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CoreError::invalid_address(text, "expected exactly one '@'"));
        };

        validate_username(username).map_err(|reason| CoreError::invalid_address(text, reason))?;
        validate_domain(domain).map_err(|reason| CoreError::invalid_address(text, reason))?;

        Ok(Self {
            username: username.to_ascii_lowercase(),
            domain: domain.to_ascii_lowercase(),
        })
    }

    /// Builds the `host@domain` address of a server.
    ///
    /// # Errors
    /// Returns `InvalidAddress` if `domain` is not a valid hostname.
    pub fn host(domain: &str) -> Result<Self> {
        Self::parse(&format!("{HOST_USERNAME}@{domain}"))
    }

    /// Returns the username part.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the domain part.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns `true` if this address belongs to `server_domain`.
    #[must_use]
    pub fn is_local(&self, server_domain: &str) -> bool {
        self.domain.eq_ignore_ascii_case(server_domain)
    }

    /// Returns `true` for the reserved server identity.
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.username == HOST_USERNAME
    }
}

fn validate_username(username: &str) -> std::result::Result<(), &'static str> {
    if username.is_empty() {
        return Err("username is empty");
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err("username is too long");
    }
    if username.starts_with('.') {
        return Err("username cannot start with '.'");
    }
    if !username
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'+' | b'-'))
    {
        return Err("username contains invalid characters");
    }
    Ok(())
}

/// Validates a hostname.
///
/// # Errors
/// Returns a static reason when `domain` is not a valid hostname.
pub fn validate_domain(domain: &str) -> std::result::Result<(), &'static str> {
    if domain.is_empty() {
        return Err("domain is empty");
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err("domain is too long");
    }
    for label in domain.split('.') {
        if label.is_empty() {
            return Err("domain has an empty label");
        }
        if label.len() > MAX_LABEL_LEN {
            return Err("domain label is too long");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("domain label cannot start or end with '-'");
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err("domain contains invalid characters");
        }
    }
    Ok(())
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.domain)
    }
}

impl FromStr for PeerAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for PeerAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeerAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_canonical() {
        for text in [
            "alice@coffee.com",
            "bob@teapot.com",
            "john.doe+tag@mail.example.org",
            "x_y-z@a-b.c",
            "host@localhost",
        ] {
            let parsed = PeerAddress::parse(text).unwrap();
            assert_eq!(parsed.to_string(), text);
            assert_eq!(PeerAddress::parse(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn test_case_normalized() {
        let a = PeerAddress::parse("Alice@COFFEE.com").unwrap();
        assert_eq!(a, PeerAddress::parse("alice@coffee.com").unwrap());
        assert_eq!(a.username(), "alice");
        assert_eq!(a.domain(), "coffee.com");
    }

    #[test]
    fn test_rejects_malformed() {
        for text in [
            "",
            "alice",
            "@coffee.com",
            "alice@",
            "alice@@coffee.com",
            "alice@bob@coffee.com",
            "al ice@coffee.com",
            ".alice@coffee.com",
            "alice@-coffee.com",
            "alice@coffee..com",
            "alice@coffee.com-",
            "alice@cof_fee.com",
        ] {
            assert!(
                matches!(PeerAddress::parse(text), Err(CoreError::InvalidAddress { .. })),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_overlong() {
        let long_user = format!("{}@coffee.com", "a".repeat(65));
        assert!(PeerAddress::parse(&long_user).is_err());

        let long_label = format!("alice@{}.com", "a".repeat(64));
        assert!(PeerAddress::parse(&long_label).is_err());
    }

    #[test]
    fn test_locality_and_host() {
        let alice = PeerAddress::parse("alice@coffee.com").unwrap();
        assert!(alice.is_local("coffee.com"));
        assert!(alice.is_local("Coffee.COM"));
        assert!(!alice.is_local("teapot.com"));
        assert!(!alice.is_host());

        let host = PeerAddress::host("teapot.com").unwrap();
        assert!(host.is_host());
        assert_eq!(host.to_string(), "host@teapot.com");
    }

    #[test]
    fn test_serde_as_string() {
        let alice = PeerAddress::parse("alice@coffee.com").unwrap();
        let json = serde_json::to_string(&alice).unwrap();
        assert_eq!(json, "\"alice@coffee.com\"");
        assert!(serde_json::from_str::<PeerAddress>("\"nope\"").is_err());
    }
}
