// ============================================
// File: crates/socialbox-transport/src/http.rs
// ============================================
//! # HTTP Transport
//!
//! ## Creation Reason
//! Binds frames to HTTP: `reqwest` on the client side, `axum` on the
//! server side. Both ends agree on the header mapping in [`crate::frame`].
//!
//! ## Main Functionality
//! - `HttpTransport`: POSTs frames to one endpoint
//! - `HttpConnector`: shares one `reqwest::Client` across endpoints
//! - `router()` / `serve()`: expose a `FrameHandler` on a TCP listener
//!
//! ## ⚠️ Important Note for Next Developer
//! - The router answers on every path; the endpoint URL's path is the
//!   operator's choice
//! - Body size is capped before the handler runs
//!
//! ## Last Modified
//! v0.1.0 - Initial HTTP binding

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use reqwest::{Client, Url};
use tokio::net::TcpListener;
use tracing::{debug, info};

use socialbox_core::{RpcError, StandardError};

use crate::error::{Result, TransportError};
use crate::frame::{RequestFrame, ResponseFrame, REQUEST_TYPE_HEADER, SESSION_HEADER};
use crate::traits::{Connector, FrameHandler, Transport};

/// Default timeout for one HTTP exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================
// HttpTransport
// ============================================

/// Client transport POSTing frames to a single endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Creates a transport with its own HTTP client.
    ///
    /// # Errors
    /// Returns `ConnectFailed` if the HTTP client cannot be built.
    pub fn new(endpoint: Url) -> Result<Self> {
        let http = build_client(DEFAULT_REQUEST_TIMEOUT, endpoint.as_str())?;
        Ok(Self::with_client(http, endpoint))
    }

    /// Creates a transport sharing `http`.
    #[must_use]
    pub const fn with_client(http: Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }
}

fn build_client(timeout: Duration, context: &str) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TransportError::connect_failed(context, e.to_string()))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(&self, frame: RequestFrame) -> Result<ResponseFrame> {
        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header(REQUEST_TYPE_HEADER, frame.request_type.as_str());
        if let Some(session_id) = frame.session_id {
            request = request.header(SESSION_HEADER, session_id.to_string());
        }

        debug!(
            endpoint = %self.endpoint,
            request_type = %frame.request_type,
            bytes = frame.body.len(),
            "Sending frame"
        );

        let response = request
            .body(frame.body)
            .send()
            .await
            .map_err(|e| TransportError::connect_failed(self.endpoint.as_str(), e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::receive_failed(self.endpoint.as_str(), e.to_string()))?;

        Ok(ResponseFrame { status, body })
    }

    fn endpoint(&self) -> String {
        self.endpoint.to_string()
    }
}

// ============================================
// HttpConnector
// ============================================

/// Connector creating [`HttpTransport`]s over one shared client.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    http: Client,
}

impl HttpConnector {
    /// Creates a connector with the given per-request timeout.
    ///
    /// # Errors
    /// Returns `ConnectFailed` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout, "http connector")?,
        })
    }
}

impl Connector for HttpConnector {
    fn connect(&self, endpoint: &Url) -> Result<Arc<dyn Transport>> {
        match endpoint.scheme() {
            "http" | "https" => Ok(Arc::new(HttpTransport::with_client(
                self.http.clone(),
                endpoint.clone(),
            ))),
            _ => Err(TransportError::NoRoute {
                endpoint: endpoint.to_string(),
            }),
        }
    }
}

// ============================================
// Server Binding
// ============================================

/// Builds an axum router delivering every request to `handler`.
pub fn router(handler: Arc<dyn FrameHandler>, max_body_bytes: usize) -> Router {
    Router::new()
        .fallback(serve_frame)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(handler)
}

async fn serve_frame(
    State(handler): State<Arc<dyn FrameHandler>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let frame = match RequestFrame::from_parts(header(REQUEST_TYPE_HEADER), header(SESSION_HEADER), body) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "Rejected malformed frame");
            let reply = ResponseFrame::error(&RpcError::new(StandardError::RpcBadRequest, e.to_string()));
            return into_http(reply);
        }
    };

    into_http(handler.handle(frame).await)
}

fn into_http(frame: ResponseFrame) -> Response {
    let status = StatusCode::from_u16(frame.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, frame.body).into_response()
}

/// Binds `addr`, returning the listener and its actual local address.
///
/// # Errors
/// Returns `BindFailed` if the address cannot be bound.
pub async fn bind(addr: SocketAddr) -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| TransportError::bind_failed(addr, e.to_string()))?;
    let local = listener
        .local_addr()
        .map_err(|e| TransportError::io("reading listener address", e))?;
    Ok((listener, local))
}

/// Serves `handler` on `listener` until `shutdown` resolves.
///
/// # Errors
/// Returns `Io` if the accept loop fails.
pub async fn serve<F>(
    listener: TcpListener,
    handler: Arc<dyn FrameHandler>,
    max_body_bytes: usize,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener
        .local_addr()
        .map_err(|e| TransportError::io("reading listener address", e))?;
    info!(addr = %local, "HTTP listener started");

    axum::serve(listener, router(handler, max_body_bytes))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| TransportError::io("serving HTTP", e))?;

    info!(addr = %local, "HTTP listener stopped");
    Ok(())
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use socialbox_core::RequestType;

    struct Echo;

    #[async_trait]
    impl FrameHandler for Echo {
        async fn handle(&self, frame: RequestFrame) -> ResponseFrame {
            match frame.request_type {
                RequestType::Ping => ResponseFrame::ok("pong"),
                _ => ResponseFrame::ok(frame.body),
            }
        }
    }

    #[test]
    fn test_connector_rejects_unknown_scheme() {
        let connector = HttpConnector::new(Duration::from_secs(1)).unwrap();
        let url = Url::parse("ftp://rpc.coffee.com/").unwrap();
        assert!(matches!(
            connector.connect(&url),
            Err(TransportError::NoRoute { .. })
        ));
        assert!(connector
            .connect(&Url::parse("https://rpc.coffee.com/").unwrap())
            .is_ok());
    }

    #[tokio::test]
    async fn test_http_roundtrip_over_loopback_socket() {
        let (listener, addr) = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, Arc::new(Echo), 1024, async {
            let _ = stop_rx.await;
        }));

        let endpoint = Url::parse(&format!("http://{addr}/rpc")).unwrap();
        let transport = HttpTransport::new(endpoint).unwrap();

        let pong = transport
            .exchange(RequestFrame::new(RequestType::Ping, Bytes::new()))
            .await
            .unwrap();
        assert!(pong.is_success());
        assert_eq!(&pong.body[..], b"pong");

        let echoed = transport
            .exchange(RequestFrame::new(RequestType::Info, Bytes::from_static(b"hi")))
            .await
            .unwrap();
        assert_eq!(&echoed.body[..], b"hi");

        let _ = stop_tx.send(());
        server.await.unwrap().unwrap();
    }
}
