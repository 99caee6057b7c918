// ============================================
// File: crates/socialbox-client/src/lookup.rs
// ============================================
//! # Record Lookup
//!
//! Source of raw discovery record text for a domain. The resolver owns
//! parsing and caching; a lookup only answers "what text does this domain
//! publish right now".

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;

/// Collaborator returning a domain's published record text.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Returns the record text of `domain`, or `None` if it publishes none.
    ///
    /// # Errors
    /// Returns an error if the lookup itself failed.
    async fn lookup_record(&self, domain: &str) -> Result<Option<String>>;
}

/// In-memory record table.
///
/// Backs the `[federation.records]` configuration section and tests.
#[derive(Debug, Default)]
pub struct StaticRecordLookup {
    records: RwLock<HashMap<String, String>>,
    lookups: AtomicUsize,
}

impl StaticRecordLookup {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table from `(domain, record)` pairs.
    pub fn from_records<I, D, R>(records: I) -> Self
    where
        I: IntoIterator<Item = (D, R)>,
        D: Into<String>,
        R: Into<String>,
    {
        let table = Self::new();
        for (domain, record) in records {
            table.insert(domain, record);
        }
        table
    }

    /// Publishes `record` for `domain`.
    pub fn insert(&self, domain: impl Into<String>, record: impl Into<String>) {
        self.records
            .write()
            .insert(domain.into().to_ascii_lowercase(), record.into());
    }

    /// Withdraws the record of `domain`.
    pub fn remove(&self, domain: &str) {
        self.records.write().remove(&domain.to_ascii_lowercase());
    }

    /// Returns how many lookups were served.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordLookup for StaticRecordLookup {
    async fn lookup_record(&self, domain: &str) -> Result<Option<String>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.records.read().get(&domain.to_ascii_lowercase()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup_counts() {
        let table = StaticRecordLookup::from_records([("Coffee.com", "v=socialbox")]);
        assert_eq!(
            table.lookup_record("coffee.com").await.unwrap().as_deref(),
            Some("v=socialbox")
        );
        assert!(table.lookup_record("teapot.com").await.unwrap().is_none());
        assert_eq!(table.lookup_count(), 2);

        table.remove("coffee.com");
        assert!(table.lookup_record("coffee.com").await.unwrap().is_none());
    }
}
