// ============================================
// File: crates/socialbox-server/src/server.rs
// ============================================
//! # Server Orchestrator
//!
//! ## Creation Reason
//! Wires the services, the dispatcher and the request handler together and
//! owns the server lifecycle.
//!
//! ## Main Functionality
//! - `ServerBuilder`: optional overrides for storage, clock, resolver,
//!   connector, captcha renderer and extra RPC methods
//! - `Server`: component access, HTTP serving, cleanup task, shutdown
//!
//! ## Server Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Server                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌────────────────┐   ┌──────────────────────────────────┐  │
//! │  │ HTTP (axum)    │   │ Cleanup Task                     │  │
//! │  │ or loopback    │   │ every cleanup_interval_secs:     │  │
//! │  └───────┬────────┘   │ close idle sessions              │  │
//! │          ▼            └──────────────────────────────────┘  │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │                 RequestHandler                       │   │
//! │  └───────┬──────────────────────────────┬───────────────┘   │
//! │          ▼                              ▼                   │
//! │  ┌────────────────┐            ┌──────────────────┐         │
//! │  │HandshakeService│            │   Dispatcher     │         │
//! │  └────────────────┘            └────────┬─────────┘         │
//! │                                         ▼                   │
//! │  ┌──────────┐ ┌──────────┐ ┌─────────┐ ┌────────────┐       │
//! │  │ Session  │ │ Storage  │ │ Captcha │ │ Federation │       │
//! │  │ Manager  │ │          │ │ Service │ │  Service   │       │
//! │  └──────────┘ └──────────┘ └─────────┘ └────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `handler()` is what tests register on a `LoopbackNetwork`; it is the
//!   same object the HTTP listener serves
//! - Shutdown is a broadcast; every spawned task subscribes before it starts
//! - All services are Arc-wrapped for sharing
//!
//! ## Last Modified
//! v0.1.0 - Initial server implementation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use socialbox_client::{DiscoveryRecord, FederationResolver};
use socialbox_common::{Clock, SystemClock};
use socialbox_core::crypto::{DefaultHandshakeCrypto, IdentityKeyPair, IdentityPublicKey};
use socialbox_transport::http::{self, DEFAULT_REQUEST_TIMEOUT};
use socialbox_transport::{Connector, FrameHandler, HttpConnector};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::handlers::RequestHandler;
use crate::rpc::{Dispatcher, MethodRegistry, RpcMethod, ServiceContext};
use crate::services::{
    CaptchaRenderer, CaptchaService, FederationService, HandshakeService, SessionManager,
};
use crate::storage::{MemoryStorage, Storage};

/// How long `run` waits for the cleanup task after the listener stops.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// ServerBuilder
// ============================================

/// Builder for [`Server`].
///
/// Every override is optional; unset parts come from the configuration.
pub struct ServerBuilder {
    config: ServerConfig,
    identity: IdentityKeyPair,
    storage: Option<Arc<dyn Storage>>,
    clock: Option<Arc<dyn Clock>>,
    resolver: Option<Arc<FederationResolver>>,
    connector: Option<Arc<dyn Connector>>,
    renderer: Option<Arc<dyn CaptchaRenderer>>,
    methods: Vec<Arc<dyn RpcMethod>>,
}

impl ServerBuilder {
    /// Uses `storage` instead of a fresh in-memory store.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Uses `clock` as the time source of every service.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Uses `resolver` instead of one built from `[federation]`.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<FederationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Uses `connector` for outbound federation traffic.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Uses `renderer` for captcha content.
    #[must_use]
    pub fn captcha_renderer(mut self, renderer: Arc<dyn CaptchaRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Registers an additional RPC method. A name clash replaces the
    /// standard handler.
    #[must_use]
    pub fn method(mut self, method: Arc<dyn RpcMethod>) -> Self {
        self.methods.push(method);
        self
    }

    /// Validates the configuration and wires the components.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` for a bad configuration, or `Transport` if the
    /// default HTTP connector cannot be built.
    pub fn build(self) -> Result<Server> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()) as Arc<dyn Storage>);
        let resolver = self.resolver.unwrap_or_else(|| {
            Arc::new(
                FederationResolver::new(Arc::new(config.federation.record_lookup()))
                    .with_ttl(config.federation.resolver_ttl_secs)
                    .with_clock(Arc::clone(&clock)),
            )
        });
        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(HttpConnector::new(DEFAULT_REQUEST_TIMEOUT)?),
        };

        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&storage),
            config.session.max_sessions,
            Duration::from_secs(config.session.ttl_secs),
        ));

        let mut captcha = CaptchaService::new(Arc::clone(&storage), Arc::clone(&clock));
        if let Some(renderer) = self.renderer {
            captcha = captcha.with_renderer(renderer);
        }

        let federation = FederationService::new(
            self.identity.clone(),
            &config.server.domain,
            Arc::clone(&resolver),
            connector,
            Arc::clone(&clock),
        )?;

        let handshake = Arc::new(HandshakeService::new(
            Arc::new(DefaultHandshakeCrypto::new(self.identity.clone())),
            Arc::clone(&sessions),
            Arc::clone(&storage),
            resolver,
            Arc::clone(&clock),
            config.server.clone(),
            config.registration.clone(),
        ));

        let services = Arc::new(ServiceContext {
            config: Arc::clone(&config),
            storage,
            sessions: Arc::clone(&sessions),
            captcha: Arc::new(captcha),
            federation: Arc::new(federation),
            clock,
        });

        let mut registry = MethodRegistry::with_defaults();
        for method in self.methods {
            registry.register(method);
        }
        debug!(methods = registry.len(), "Method table ready");

        let handler = Arc::new(RequestHandler::new(
            handshake,
            sessions,
            Dispatcher::new(Arc::new(registry), Arc::clone(&services)),
            config.security.display_internal_exceptions,
        ));

        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Server {
            config,
            identity: self.identity,
            services,
            handler,
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        })
    }
}

// ============================================
// Server
// ============================================

/// A configured Socialbox server.
pub struct Server {
    /// Server configuration.
    config: Arc<ServerConfig>,
    /// Server identity key pair.
    identity: IdentityKeyPair,
    /// Shared services.
    services: Arc<ServiceContext>,
    /// Frame entry point.
    handler: Arc<RequestHandler>,
    /// Shutdown flag.
    shutdown: Arc<AtomicBool>,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Starts a builder.
    #[must_use]
    pub fn builder(config: ServerConfig, identity: IdentityKeyPair) -> ServerBuilder {
        ServerBuilder {
            config,
            identity,
            storage: None,
            clock: None,
            resolver: None,
            connector: None,
            renderer: None,
            methods: Vec::new(),
        }
    }

    /// Creates a server with every part taken from `config`.
    ///
    /// # Errors
    /// See [`ServerBuilder::build`].
    pub fn new(config: ServerConfig, identity: IdentityKeyPair) -> Result<Self> {
        Self::builder(config, identity).build()
    }

    /// Returns the effective configuration.
    #[must_use]
    pub const fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    /// Returns the shared services.
    #[must_use]
    pub const fn services(&self) -> &Arc<ServiceContext> {
        &self.services
    }

    /// Returns the live session table.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.services.sessions
    }

    /// Returns the frame entry point, for serving over any transport.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn FrameHandler> {
        Arc::clone(&self.handler) as Arc<dyn FrameHandler>
    }

    /// Returns the public identity key.
    #[must_use]
    pub fn public_key(&self) -> IdentityPublicKey {
        self.identity.public_key()
    }

    /// Returns the discovery record this server should publish.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the advertised endpoint is malformed.
    pub fn discovery_record(&self) -> Result<DiscoveryRecord> {
        Ok(DiscoveryRecord::new(
            self.config.server.rpc_endpoint_url()?,
            self.public_key(),
            None,
        ))
    }

    /// Binds `server.listen_addr` and serves until shutdown.
    ///
    /// # Errors
    /// Returns `Transport` if the address cannot be bound or the listener
    /// fails.
    pub async fn run(&self) -> Result<()> {
        let (listener, _) = http::bind(self.config.server.listen_addr).await?;
        self.run_on(listener).await
    }

    /// Serves on an already bound listener until Ctrl+C or [`shutdown`].
    ///
    /// [`shutdown`]: Server::shutdown
    ///
    /// # Errors
    /// Returns `Transport` if the listener fails.
    pub async fn run_on(&self, listener: TcpListener) -> Result<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            domain = %self.config.server.domain,
            public_key = %self.public_key().to_record_key(),
            "Starting Socialbox server"
        );

        let cleanup = self.spawn_cleanup_task();
        self.spawn_signal_task();

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let already_stopping = self.is_shutting_down();
        let served = http::serve(
            listener,
            self.handler(),
            self.config.limits.max_request_bytes,
            async move {
                if !already_stopping {
                    let _ = shutdown_rx.recv().await;
                }
            },
        )
        .await;

        // The listener may also stop on its own; make sure the tasks follow.
        self.shutdown();
        if tokio::time::timeout(TASK_JOIN_TIMEOUT, cleanup).await.is_err() {
            warn!("Cleanup task did not stop in time");
        }

        served?;
        info!(sessions = self.sessions().count(), "Server stopped");
        Ok(())
    }

    /// Forwards Ctrl+C to the shutdown broadcast.
    fn spawn_signal_task(&self) {
        let shutdown_tx = self.shutdown_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {}
                res = tokio::signal::ctrl_c() => match res {
                    Ok(()) => {
                        info!("Received Ctrl+C");
                        let _ = shutdown_tx.send(());
                    }
                    Err(e) => warn!(error = %e, "Cannot listen for Ctrl+C"),
                },
            }
        });
    }

    /// Spawns the session cleanup task.
    ///
    /// Closing a session also wakes any request still running in it.
    pub fn spawn_cleanup_task(&self) -> JoinHandle<()> {
        let shutdown = Arc::clone(&self.shutdown);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let sessions = Arc::clone(&self.services.sessions);
        let interval = Duration::from_secs(self.config.session.cleanup_interval_secs.max(1));

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Cleanup task received shutdown signal");
                        break;
                    }
                    _ = interval_timer.tick() => {
                        if shutdown.load(Ordering::SeqCst) {
                            break;
                        }

                        let expired = sessions.cleanup_expired().await;
                        debug!(
                            expired = expired.len(),
                            sessions = sessions.count(),
                            "Cleanup cycle complete"
                        );
                    }
                }
            }

            debug!("Cleanup task exiting");
        })
    }

    /// Returns `true` once shutdown was requested.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Triggers server shutdown programmatically.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("domain", &self.config.server.domain)
            .field("listen_addr", &self.config.server.listen_addr)
            .field("sessions", &self.sessions().count())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
