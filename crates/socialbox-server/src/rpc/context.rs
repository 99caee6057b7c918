// ============================================
// File: crates/socialbox-server/src/rpc/context.rs
// ============================================
//! # Method Context
//!
//! What a method handler gets to work with: the calling session and the
//! shared server services. Also hosts the step-completion rule shared by
//! every method that clears a registration or authentication flag.

use std::sync::Arc;

use tracing::info;

use socialbox_common::Clock;
use socialbox_core::protocol::SessionState;
use socialbox_core::{is_complete, FlagSet, SessionFlag};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::rpc::MethodRegistry;
use crate::services::{CaptchaService, FederationService, Session, SessionManager};
use crate::storage::{PeerRecord, Storage};

/// Services shared by every request.
pub struct ServiceContext {
    /// Effective configuration
    pub config: Arc<ServerConfig>,
    /// Persistence port
    pub storage: Arc<dyn Storage>,
    /// Live sessions
    pub sessions: Arc<SessionManager>,
    /// Captchas
    pub captcha: Arc<CaptchaService>,
    /// Server-to-server lookups
    pub federation: Arc<FederationService>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("domain", &self.config.server.domain)
            .field("sessions", &self.sessions.count())
            .finish_non_exhaustive()
    }
}

/// Per-request view handed to [`RpcMethod::execute`](crate::rpc::RpcMethod::execute).
#[derive(Clone)]
pub struct MethodContext {
    session: Arc<Session>,
    services: Arc<ServiceContext>,
    registry: Arc<MethodRegistry>,
}

impl MethodContext {
    /// Creates a context for one call.
    #[must_use]
    pub const fn new(
        session: Arc<Session>,
        services: Arc<ServiceContext>,
        registry: Arc<MethodRegistry>,
    ) -> Self {
        Self {
            session,
            services,
            registry,
        }
    }

    /// Returns the calling session.
    #[must_use]
    pub const fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Returns the shared services.
    #[must_use]
    pub const fn services(&self) -> &Arc<ServiceContext> {
        &self.services
    }

    /// Returns the method table.
    #[must_use]
    pub const fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Loads the peer record of the calling session.
    ///
    /// # Errors
    /// - `Internal` if the record vanished
    /// - `Storage` if the lookup fails
    pub async fn peer(&self) -> Result<PeerRecord> {
        self.services
            .storage
            .load_peer_by_id(self.session.peer_id())
            .await?
            .ok_or_else(|| {
                ServerError::internal(format!(
                    "peer record {} of session {} is missing",
                    self.session.peer_id(),
                    self.session.id()
                ))
            })
    }

    /// Clears `flag` and authenticates the session once nothing gating is
    /// left.
    ///
    /// Completing registration also enables the peer record, before the
    /// session is marked authenticated.
    ///
    /// # Errors
    /// Returns `Storage` if any of the writes fail.
    pub async fn complete_step(&self, flag: SessionFlag) -> Result<SessionState> {
        let state = self.session.remove_flags(&[flag]).await?;
        if state.authenticated {
            return Ok(state);
        }

        let flags: FlagSet = state.flags.iter().copied().collect();
        if !is_complete(&flags) {
            return Ok(state);
        }

        let mut peer = self.peer().await?;
        if !peer.enabled {
            peer.enabled = true;
            self.services.storage.save_peer_record(&peer).await?;
            info!(peer = %peer.address, peer_id = %peer.id, "Registration completed");
        }
        self.session.set_authenticated(true).await
    }
}

impl std::fmt::Debug for MethodContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodContext")
            .field("session", &self.session.id())
            .finish_non_exhaustive()
    }
}
