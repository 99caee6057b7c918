// ============================================
// File: crates/socialbox-transport/src/loopback.rs
// ============================================
//! # Loopback Transport
//!
//! ## Creation Reason
//! Provides in-process transports for testing without sockets: a client
//! frame is handed straight to a server's `FrameHandler`.
//!
//! ## Main Functionality
//! - `LoopbackTransport`: one client, one handler, exchange counter
//! - `LoopbackNetwork`: endpoint URL → handler table acting as a
//!   `Connector`, so several in-process servers can federate
//!
//! ## Usage in Tests
//! ```ignore
//! let network = LoopbackNetwork::new();
//! network.register("https://rpc.coffee.com/", coffee_handler);
//! network.register("https://rpc.teapot.com/", teapot_handler);
//! let client = RpcClient::builder(...).connector(Arc::new(network.clone()));
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing and embedding only; frames are not copied or
//!   size-checked the way the HTTP binding does
//!
//! ## Last Modified
//! v0.1.0 - Initial loopback implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Url;

use crate::error::{Result, TransportError};
use crate::frame::{RequestFrame, ResponseFrame};
use crate::traits::{Connector, FrameHandler, Transport};

// ============================================
// LoopbackTransport
// ============================================

/// Transport delivering frames directly to a handler.
pub struct LoopbackTransport {
    /// Endpoint label reported by `endpoint()`
    endpoint: String,
    /// Server side
    handler: Arc<dyn FrameHandler>,
    /// Number of completed exchanges
    exchanges: AtomicU64,
    /// Set by `close()`
    closed: AtomicBool,
}

impl LoopbackTransport {
    /// Creates a loopback to `handler`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, handler: Arc<dyn FrameHandler>) -> Self {
        Self {
            endpoint: endpoint.into(),
            handler,
            exchanges: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns how many exchanges completed.
    #[must_use]
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    /// Makes every further exchange fail with `ShuttingDown`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn exchange(&self, frame: RequestFrame) -> Result<ResponseFrame> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ShuttingDown);
        }
        let response = self.handler.handle(frame).await;
        self.exchanges.fetch_add(1, Ordering::Relaxed);
        Ok(response)
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("endpoint", &self.endpoint)
            .field("exchanges", &self.exchange_count())
            .finish_non_exhaustive()
    }
}

// ============================================
// LoopbackNetwork
// ============================================

/// Table of in-process endpoints.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    routes: Arc<RwLock<HashMap<String, Arc<dyn FrameHandler>>>>,
}

impl LoopbackNetwork {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `handler` at `endpoint`, replacing any previous handler.
    ///
    /// # Errors
    /// Returns `InvalidHeader` if `endpoint` is not a URL.
    pub fn register(&self, endpoint: &str, handler: Arc<dyn FrameHandler>) -> Result<()> {
        let url = Url::parse(endpoint)
            .map_err(|e| TransportError::invalid_header("endpoint", e.to_string()))?;
        self.routes.write().insert(url.to_string(), handler);
        Ok(())
    }

    /// Stops serving `endpoint`.
    pub fn unregister(&self, endpoint: &str) {
        if let Ok(url) = Url::parse(endpoint) {
            self.routes.write().remove(url.as_str());
        }
    }

    /// Returns the number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}

impl Connector for LoopbackNetwork {
    fn connect(&self, endpoint: &Url) -> Result<Arc<dyn Transport>> {
        let handler = self
            .routes
            .read()
            .get(endpoint.as_str())
            .cloned()
            .ok_or_else(|| TransportError::NoRoute {
                endpoint: endpoint.to_string(),
            })?;
        Ok(Arc::new(LoopbackTransport::new(endpoint.as_str(), handler)))
    }
}

impl std::fmt::Debug for LoopbackNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: Vec<String> = self.routes.read().keys().cloned().collect();
        f.debug_struct("LoopbackNetwork").field("routes", &routes).finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use socialbox_core::RequestType;

    struct Named(&'static str);

    #[async_trait]
    impl FrameHandler for Named {
        async fn handle(&self, _frame: RequestFrame) -> ResponseFrame {
            ResponseFrame::ok(self.0)
        }
    }

    fn ping() -> RequestFrame {
        RequestFrame::new(RequestType::Ping, Bytes::new())
    }

    #[tokio::test]
    async fn test_exchange_counts_and_close() {
        let transport = LoopbackTransport::new("loop://a", Arc::new(Named("a")));
        let reply = transport.exchange(ping()).await.unwrap();
        assert_eq!(&reply.body[..], b"a");
        assert_eq!(transport.exchange_count(), 1);

        transport.close();
        assert!(matches!(
            transport.exchange(ping()).await,
            Err(TransportError::ShuttingDown)
        ));
        assert_eq!(transport.exchange_count(), 1);
    }

    #[tokio::test]
    async fn test_network_routes_by_endpoint() {
        let network = LoopbackNetwork::new();
        network
            .register("https://rpc.coffee.com/", Arc::new(Named("coffee")))
            .unwrap();
        network
            .register("https://rpc.teapot.com", Arc::new(Named("teapot")))
            .unwrap();
        assert_eq!(network.len(), 2);

        // URL normalization adds the trailing slash.
        let teapot = network
            .connect(&Url::parse("https://rpc.teapot.com/").unwrap())
            .unwrap();
        assert_eq!(&teapot.exchange(ping()).await.unwrap().body[..], b"teapot");

        let missing = network.connect(&Url::parse("https://rpc.nowhere.com/").unwrap());
        assert!(matches!(missing, Err(TransportError::NoRoute { .. })));

        network.unregister("https://rpc.coffee.com/");
        assert!(network
            .connect(&Url::parse("https://rpc.coffee.com/").unwrap())
            .is_err());
    }
}
