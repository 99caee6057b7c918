// ============================================
// File: crates/socialbox-client/src/resolver.rs
// ============================================
//! # Federation Resolver
//!
//! ## Creation Reason
//! Turns a domain into its RPC endpoint and trust key, caching the answer
//! so that a busy server does not hit the record source for every call.
//!
//! ## Resolution Flow
//! ```text
//! resolve(domain)
//!     │
//!     ├── cache hit, age < TTL ──────────────► cached record / cached failure
//!     │
//!     ├── mock registered? ── yes ──► mock text
//!     │        │ no
//!     │        ▼
//!     │   lookup.lookup_record(domain)
//!     │        │
//!     │        ▼
//!     │   DiscoveryRecord::parse
//!     │        │
//!     └────────┴──► cache (success or failure), return
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Failures are cached for the full TTL as well; a broken record is not
//!   re-fetched on every call
//! - TTL is checked lazily on access; there is no stale fallback
//! - Concurrent resolutions of one domain may both look up; the last write
//!   wins
//! - Never hold a cache guard across the lookup await
//!
//! ## Last Modified
//! v0.1.0 - Initial resolver

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use socialbox_common::{Clock, SystemClock, Timestamp};
use socialbox_core::address::validate_domain;

use crate::discovery::DiscoveryRecord;
use crate::error::{ClientError, Result};
use crate::lookup::RecordLookup;

/// Default cache lifetime in seconds.
pub const DEFAULT_RESOLVER_TTL_SECS: u64 = 3600;

// ============================================
// Cache Entry
// ============================================

#[derive(Debug, Clone)]
struct CacheEntry {
    cached_at: Timestamp,
    outcome: std::result::Result<DiscoveryRecord, String>,
}

// ============================================
// FederationResolver
// ============================================

/// Cached domain → discovery record resolver.
pub struct FederationResolver {
    /// Record source
    lookup: Arc<dyn RecordLookup>,
    /// Domain → last outcome
    cache: DashMap<String, CacheEntry>,
    /// Domain → record text overriding the lookup
    mocks: DashMap<String, String>,
    /// Cache lifetime
    ttl_secs: u64,
    /// Time source
    clock: Arc<dyn Clock>,
}

impl FederationResolver {
    /// Creates a resolver over `lookup` with the default TTL.
    #[must_use]
    pub fn new(lookup: Arc<dyn RecordLookup>) -> Self {
        Self {
            lookup,
            cache: DashMap::new(),
            mocks: DashMap::new(),
            ttl_secs: DEFAULT_RESOLVER_TTL_SECS,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the cache lifetime.
    #[must_use]
    pub const fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Sets the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the time source.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Overrides the record of `domain` with `record`.
    ///
    /// Any cached outcome for the domain is dropped.
    pub fn add_mock(&self, domain: &str, record: impl Into<String>) {
        let domain = domain.to_ascii_lowercase();
        self.cache.remove(&domain);
        debug!(domain = %domain, "Registered mock discovery record");
        self.mocks.insert(domain, record.into());
    }

    /// Removes the mock of `domain` and its cached outcome.
    pub fn remove_mock(&self, domain: &str) {
        let domain = domain.to_ascii_lowercase();
        self.cache.remove(&domain);
        self.mocks.remove(&domain);
    }

    /// Resolves `domain`.
    ///
    /// # Errors
    /// Returns `Resolution` if the domain is invalid, publishes no record,
    /// publishes a malformed record, or the lookup fails. The failure is
    /// cached like a success.
    pub async fn resolve(&self, domain: &str) -> Result<DiscoveryRecord> {
        let domain = domain.to_ascii_lowercase();
        validate_domain(&domain).map_err(|reason| ClientError::resolution(&domain, reason))?;

        let now = self.clock.now();
        if let Some(outcome) = self.cached(&domain, now) {
            debug!(domain = %domain, hit = outcome.is_ok(), "Resolver cache hit");
            return outcome.map_err(|reason| ClientError::resolution(&domain, reason));
        }

        let outcome = self.fetch(&domain).await;
        match &outcome {
            Ok(record) => info!(
                domain = %domain,
                endpoint = %record.rpc_endpoint(),
                "Resolved discovery record"
            ),
            Err(reason) => warn!(domain = %domain, reason = %reason, "Resolution failed"),
        }

        self.cache.insert(
            domain.clone(),
            CacheEntry {
                cached_at: now,
                outcome: outcome.clone(),
            },
        );
        outcome.map_err(|reason| ClientError::resolution(&domain, reason))
    }

    fn cached(
        &self,
        domain: &str,
        now: Timestamp,
    ) -> Option<std::result::Result<DiscoveryRecord, String>> {
        let entry = self.cache.get(domain)?;
        let age = now.secs_since(entry.cached_at);
        // A clock that moved backwards does not extend the entry.
        let fresh = age >= 0 && age.unsigned_abs() < self.ttl_secs;
        fresh.then(|| entry.outcome.clone())
    }

    async fn fetch(&self, domain: &str) -> std::result::Result<DiscoveryRecord, String> {
        let mock = self.mocks.get(domain).map(|text| text.value().clone());
        let text = match mock {
            Some(text) => text,
            None => match self.lookup.lookup_record(domain).await {
                Ok(Some(text)) => text,
                Ok(None) => return Err("no discovery record published".to_string()),
                Err(e) => return Err(format!("lookup failed: {e}")),
            },
        };
        DiscoveryRecord::parse(&text).map_err(|e| e.to_string())
    }
}

impl std::fmt::Debug for FederationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationResolver")
            .field("cached", &self.cache.len())
            .field("mocks", &self.mocks.len())
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
