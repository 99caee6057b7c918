// ============================================
// File: crates/socialbox-client/src/discovery.rs
// ============================================
//! # Discovery Records
//!
//! ## Creation Reason
//! A domain advertises where its RPC endpoint lives and which key signs on
//! its behalf through one text record. Everything federation trusts about a
//! remote server comes out of this parser.
//!
//! ## Record Format
//! ```text
//! v=socialbox;sb-rpc=https://rpc.teapot.com/;sb-key=sig:<base64url>;sb-exp=0
//!   │           │                               │                    │
//!   │           │                               │                    └ unix expiry, 0 = never
//!   │           │                               └ <algorithm>:<key>, only `sig` (Ed25519)
//!   │           └ RPC endpoint, http(s) URL
//!   └ must be exactly "socialbox"
//! ```
//! - Fields are `;`-separated `key=value` pairs; whitespace around pairs is
//!   ignored
//! - Unknown keys are ignored; a repeated key keeps its last value
//!
//! ## Last Modified
//! v0.1.0 - Initial record parser

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use reqwest::Url;

use socialbox_common::Timestamp;
use socialbox_core::protocol::RECORD_VERSION;
use socialbox_core::IdentityPublicKey;

use crate::error::{ClientError, Result};

const FIELD_VERSION: &str = "v";
const FIELD_RPC: &str = "sb-rpc";
const FIELD_KEY: &str = "sb-key";
const FIELD_EXPIRES: &str = "sb-exp";

// ============================================
// DiscoveryRecord
// ============================================

/// Parsed, well-formed discovery record of one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRecord {
    version: String,
    rpc_endpoint: Url,
    trust_key: IdentityPublicKey,
    key_expires: Option<Timestamp>,
}

impl DiscoveryRecord {
    /// Creates a current-version record from its parts.
    ///
    /// `key_expires` of `None` means the key never expires.
    #[must_use]
    pub fn new(
        rpc_endpoint: Url,
        trust_key: IdentityPublicKey,
        key_expires: Option<Timestamp>,
    ) -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
            rpc_endpoint,
            trust_key,
            key_expires,
        }
    }

    /// Parses record text.
    ///
    /// # Errors
    /// Returns `InvalidRecord` if `v` is not `socialbox`, if `sb-rpc` or
    /// `sb-key` is absent or malformed, or if `sb-exp` is not a
    /// non-negative integer.
    ///
    /// # Example
    /// ```
    /// use socialbox_client::DiscoveryRecord;
    /// use socialbox_core::IdentityKeyPair;
    ///
    /// let key = IdentityKeyPair::generate().public_key();
    /// let text = format!(
    ///     "v=socialbox;sb-rpc=https://rpc.teapot.com/;sb-key={};sb-exp=0",
    ///     key.to_record_key()
    /// );
    /// let record = DiscoveryRecord::parse(&text).unwrap();
    /// assert_eq!(record.rpc_endpoint().as_str(), "https://rpc.teapot.com/");
    /// assert_eq!(record.key_expires(), None);
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let mut fields: HashMap<&str, &str> = HashMap::new();
        for pair in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ClientError::invalid_record(format!("field '{pair}' has no '='")))?;
            fields.insert(key.trim(), value.trim());
        }

        let version = match fields.get(FIELD_VERSION) {
            Some(&RECORD_VERSION) => RECORD_VERSION.to_string(),
            Some(other) => {
                return Err(ClientError::invalid_record(format!(
                    "unsupported version '{other}'"
                )))
            }
            None => return Err(ClientError::invalid_record("missing 'v'")),
        };

        let rpc = fields
            .get(FIELD_RPC)
            .ok_or_else(|| ClientError::invalid_record("missing 'sb-rpc'"))?;
        let rpc_endpoint = Url::parse(rpc)
            .map_err(|e| ClientError::invalid_record(format!("bad 'sb-rpc': {e}")))?;
        if !matches!(rpc_endpoint.scheme(), "http" | "https") || rpc_endpoint.host().is_none() {
            return Err(ClientError::invalid_record(format!(
                "'sb-rpc' must be an http(s) URL with a host, got '{rpc}'"
            )));
        }

        let key = fields
            .get(FIELD_KEY)
            .ok_or_else(|| ClientError::invalid_record("missing 'sb-key'"))?;
        let trust_key = IdentityPublicKey::from_record_key(key)
            .map_err(|e| ClientError::invalid_record(format!("bad 'sb-key': {e}")))?;

        let key_expires = match fields.get(FIELD_EXPIRES) {
            None => None,
            Some(raw) => {
                let secs: i64 = raw
                    .parse()
                    .ok()
                    .filter(|secs| *secs >= 0)
                    .ok_or_else(|| ClientError::invalid_record(format!("bad 'sb-exp': '{raw}'")))?;
                (secs != 0).then_some(Timestamp::from_secs(secs))
            }
        };

        Ok(Self {
            version,
            rpc_endpoint,
            trust_key,
            key_expires,
        })
    }

    /// Returns the record format version (`v`).
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the RPC endpoint.
    #[must_use]
    pub const fn rpc_endpoint(&self) -> &Url {
        &self.rpc_endpoint
    }

    /// Returns the key that signs for the domain.
    #[must_use]
    pub const fn trust_key(&self) -> &IdentityPublicKey {
        &self.trust_key
    }

    /// Returns the key expiry, `None` if it never expires.
    #[must_use]
    pub const fn key_expires(&self) -> Option<Timestamp> {
        self.key_expires
    }

    /// Returns `true` if the key has an expiry at or before `now`.
    #[must_use]
    pub fn is_key_expired(&self, now: Timestamp) -> bool {
        self.key_expires.is_some_and(|expires| expires <= now)
    }

    /// Formats the record as published text.
    #[must_use]
    pub fn to_record_string(&self) -> String {
        format!(
            "{FIELD_VERSION}={};{FIELD_RPC}={};{FIELD_KEY}={};{FIELD_EXPIRES}={}",
            self.version,
            self.rpc_endpoint,
            self.trust_key.to_record_key(),
            self.key_expires.map_or(0, |t| t.as_secs())
        )
    }
}

impl fmt::Display for DiscoveryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_record_string())
    }
}

impl FromStr for DiscoveryRecord {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use socialbox_core::IdentityKeyPair;

    fn key() -> IdentityPublicKey {
        IdentityKeyPair::generate().public_key()
    }

    #[test]
    fn test_parse_exact_fields() {
        let key = key();
        let text = format!(
            "v=socialbox;sb-rpc=http://127.0.0.1:8086/;sb-key={};sb-exp=0",
            key.to_record_key()
        );
        let record = DiscoveryRecord::parse(&text).unwrap();
        assert_eq!(record.version(), "socialbox");
        assert_eq!(record.rpc_endpoint().as_str(), "http://127.0.0.1:8086/");
        assert_eq!(record.trust_key(), &key);
        assert!(record.key_expires().is_none());
        assert!(!record.is_key_expired(Timestamp::from_secs(i64::MAX)));
        assert_eq!(DiscoveryRecord::parse(&record.to_record_string()).unwrap(), record);
    }

    #[test]
    fn test_tolerates_whitespace_unknown_and_duplicates() {
        let key = key();
        let text = format!(
            " v=socialbox ; sb-rpc=https://old.example/ ; extra=1 ; sb-rpc=https://rpc.example/ ; sb-key={} ;",
            key.to_record_key()
        );
        let record = DiscoveryRecord::parse(&text).unwrap();
        assert_eq!(record.rpc_endpoint().as_str(), "https://rpc.example/");
    }

    #[test]
    fn test_rejects_bad_records() {
        let good_key = key().to_record_key();
        let cases = [
            format!("v=other;sb-rpc=https://rpc.example/;sb-key={good_key}"),
            format!("sb-rpc=https://rpc.example/;sb-key={good_key}"),
            "v=socialbox;sb-rpc=https://rpc.example/".to_string(),
            format!("v=socialbox;sb-key={good_key}"),
            format!("v=socialbox;sb-rpc=not a url;sb-key={good_key}"),
            format!("v=socialbox;sb-rpc=ftp://rpc.example/;sb-key={good_key}"),
            "v=socialbox;sb-rpc=https://rpc.example/;sb-key=rsa:AAAA".to_string(),
            "v=socialbox;sb-rpc=https://rpc.example/;sb-key=sig:tooshort".to_string(),
            format!("v=socialbox;sb-rpc=https://rpc.example/;sb-key={good_key};sb-exp=-5"),
            format!("v=socialbox;sb-rpc=https://rpc.example/;sb-key={good_key};oops"),
        ];
        for text in cases {
            assert!(
                matches!(DiscoveryRecord::parse(&text), Err(ClientError::InvalidRecord { .. })),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn test_built_record_carries_version() {
        let record = DiscoveryRecord::new(
            Url::parse("https://rpc.example/").unwrap(),
            key(),
            None,
        );
        assert_eq!(record.version(), RECORD_VERSION);
        assert!(record.to_record_string().starts_with("v=socialbox;"));
    }

    #[test]
    fn test_key_expiry() {
        let text = format!(
            "v=socialbox;sb-rpc=https://rpc.example/;sb-key={};sb-exp=1700000000",
            key().to_record_key()
        );
        let record = DiscoveryRecord::parse(&text).unwrap();
        assert_eq!(record.key_expires(), Some(Timestamp::from_secs(1_700_000_000)));
        assert!(!record.is_key_expired(Timestamp::from_secs(1_699_999_999)));
        assert!(record.is_key_expired(Timestamp::from_secs(1_700_000_000)));
    }
}
