// ============================================
// File: crates/socialbox-server/src/storage/memory.rs
// ============================================
//! # In-Memory Storage
//!
//! Process-local [`Storage`] adapter. Backs single-node deployments that do
//! not need durability, and every test. Writes can be made to fail on
//! demand to exercise the persist-before-commit paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use socialbox_common::{PeerId, SessionId};
use socialbox_core::{FlagSet, PeerAddress};

use super::{CaptchaRecord, PeerRecord, SessionRecord, Storage, StorageError, StorageResult};

/// In-memory persistence adapter.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
    peers: RwLock<HashMap<PeerId, PeerRecord>>,
    captchas: RwLock<HashMap<PeerId, CaptchaRecord>>,
    fail_all_writes: AtomicBool,
    failing_operation: Mutex<Option<&'static str>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail while `fail` is set.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_all_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes one named write operation fail, or none.
    pub fn fail_operation(&self, operation: Option<&'static str>) {
        *self.failing_operation.lock() = operation;
    }

    /// Returns the number of stored sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns the number of stored peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    fn check_write(&self, operation: &'static str) -> StorageResult<()> {
        let targeted = *self.failing_operation.lock() == Some(operation);
        if targeted || self.fail_all_writes.load(Ordering::SeqCst) {
            return Err(StorageError::operation(operation, "write rejected"));
        }
        trace!(operation, "Storage write");
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load_session(&self, id: SessionId) -> StorageResult<Option<SessionRecord>> {
        Ok(self.sessions.read().get(&id).cloned())
    }

    async fn save_session(&self, record: &SessionRecord) -> StorageResult<()> {
        self.check_write("save_session")?;
        self.sessions.write().insert(record.id, record.clone());
        Ok(())
    }

    async fn save_session_flags(&self, id: SessionId, flags: &FlagSet) -> StorageResult<()> {
        self.check_write("save_session_flags")?;
        let mut sessions = self.sessions.write();
        let record = sessions
            .get_mut(&id)
            .ok_or_else(|| StorageError::operation("save_session_flags", "no such session"))?;
        record.flags.clone_from(flags);
        Ok(())
    }

    async fn save_authenticated(&self, id: SessionId, authenticated: bool) -> StorageResult<()> {
        self.check_write("save_authenticated")?;
        let mut sessions = self.sessions.write();
        let record = sessions
            .get_mut(&id)
            .ok_or_else(|| StorageError::operation("save_authenticated", "no such session"))?;
        record.authenticated = authenticated;
        Ok(())
    }

    async fn delete_session(&self, id: SessionId) -> StorageResult<()> {
        self.check_write("delete_session")?;
        self.sessions.write().remove(&id);
        Ok(())
    }

    async fn load_peer_record(&self, address: &PeerAddress) -> StorageResult<Option<PeerRecord>> {
        Ok(self
            .peers
            .read()
            .values()
            .find(|peer| &peer.address == address)
            .cloned())
    }

    async fn load_peer_by_id(&self, id: PeerId) -> StorageResult<Option<PeerRecord>> {
        Ok(self.peers.read().get(&id).cloned())
    }

    async fn save_peer_record(&self, record: &PeerRecord) -> StorageResult<()> {
        self.check_write("save_peer_record")?;
        self.peers.write().insert(record.id, record.clone());
        Ok(())
    }

    async fn load_captcha_record(&self, peer_id: PeerId) -> StorageResult<Option<CaptchaRecord>> {
        Ok(self.captchas.read().get(&peer_id).cloned())
    }

    async fn save_captcha_record(&self, record: &CaptchaRecord) -> StorageResult<()> {
        self.check_write("save_captcha_record")?;
        self.captchas.write().insert(record.peer_id, record.clone());
        Ok(())
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use socialbox_common::Timestamp;

    #[tokio::test]
    async fn test_peer_lookup_by_address_and_id() {
        let store = MemoryStorage::new();
        let address = PeerAddress::parse("alice@coffee.com").unwrap();
        let peer = PeerRecord::new(address.clone(), Timestamp::from_secs(10));
        store.save_peer_record(&peer).await.unwrap();

        assert_eq!(store.load_peer_record(&address).await.unwrap(), Some(peer.clone()));
        assert_eq!(store.load_peer_by_id(peer.id).await.unwrap(), Some(peer));
        assert_eq!(store.peer_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStorage::new();
        let address = PeerAddress::parse("alice@coffee.com").unwrap();
        let peer = PeerRecord::new(address.clone(), Timestamp::from_secs(10));

        store.fail_operation(Some("save_peer_record"));
        assert!(store.save_peer_record(&peer).await.is_err());
        assert!(store.load_peer_record(&address).await.unwrap().is_none());

        store.fail_operation(None);
        store.set_fail_writes(true);
        assert!(store.save_peer_record(&peer).await.is_err());

        store.set_fail_writes(false);
        assert!(store.save_peer_record(&peer).await.is_ok());
    }
}
