// ============================================
// File: crates/socialbox-client/src/client.rs
// ============================================
//! # RPC Client
//!
//! ## Creation Reason
//! Drives a session against one Socialbox server on behalf of one peer
//! identity: resolve the server, run the handshake once, then send sealed
//! RPC batches over the established session.
//!
//! ## Main Functionality
//! - `RpcClientBuilder`: resolver-backed or explicit endpoint + trust key
//! - `RpcClient::send_batch` / `send_request` / `call`
//! - `RpcClient::rekey`: rerun DHE on the current session
//!
//! ## Handshake Flow
//! ```text
//! ┌────────────┐ resolve(domain) ┌──────────────────┐
//! │ RpcClient  │ ───────────────►│ FederationResolver│──► (endpoint, trust key)
//! └─────┬──────┘                 └──────────────────┘
//!       │ init  {identify_as, key, ts, sig}
//!       │ ◄──── {session_id}
//!       │ dhe   {client exchange key}
//!       │ ◄──── {server exchange key, sig(trust key)}   verify, derive key
//!       ▼
//!   SecureCodec(session key, session id)  ── reused for every call
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Calls are never retried; a failed handshake leaves the client
//!   unconnected and the next call starts over
//! - Request ids are random `u32`s; responses are matched by id
//! - The session lock is held only while establishing, not during calls
//!
//! ## Last Modified
//! v0.1.0 - Initial RPC client

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use socialbox_common::{Clock, SessionId, SystemClock};
use socialbox_core::crypto::handshake::complete_exchange;
use socialbox_core::protocol::{
    DheRequest, DheResponse, InitiateSessionRequest, InitiateSessionResponse, ServerInformation,
};
use socialbox_core::{
    ExchangeKeyPair, IdentityKeyPair, IdentityPublicKey, PeerAddress, RequestType, RpcRequest,
    RpcResponse, SecureCodec, StandardError,
};
use socialbox_transport::http::DEFAULT_REQUEST_TIMEOUT;
use socialbox_transport::{Connector, HttpConnector, RequestFrame, ResponseFrame, Transport, Url};

use crate::error::{ClientError, Result};
use crate::resolver::FederationResolver;

/// Client name sent in `init` unless overridden.
pub const DEFAULT_CLIENT_NAME: &str = "socialbox-rs";

/// Client version sent in `init` unless overridden.
pub const DEFAULT_CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns a fresh random request id.
#[must_use]
pub fn next_request_id() -> u32 {
    rand::random()
}

// ============================================
// Target
// ============================================

enum Target {
    Resolve {
        domain: String,
        resolver: Arc<FederationResolver>,
    },
    Explicit {
        endpoint: Url,
        trust_key: IdentityPublicKey,
    },
}

#[derive(Clone)]
struct Established {
    endpoint: Url,
    trust_key: IdentityPublicKey,
    transport: Arc<dyn Transport>,
    codec: Arc<SecureCodec>,
}

// ============================================
// RpcClientBuilder
// ============================================

/// Builder for [`RpcClient`].
pub struct RpcClientBuilder {
    identity: IdentityKeyPair,
    identify_as: PeerAddress,
    server: Option<String>,
    resolver: Option<Arc<FederationResolver>>,
    explicit: Option<(Url, IdentityPublicKey)>,
    connector: Option<Arc<dyn Connector>>,
    clock: Option<Arc<dyn Clock>>,
    client_name: String,
    client_version: String,
}

impl RpcClientBuilder {
    /// Resolves the server through `resolver`.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<FederationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Connects to `domain` instead of the domain of the identity.
    #[must_use]
    pub fn server(mut self, domain: impl Into<String>) -> Self {
        self.server = Some(domain.into());
        self
    }

    /// Skips resolution and trusts `trust_key` at `endpoint`.
    #[must_use]
    pub fn endpoint(mut self, endpoint: Url, trust_key: IdentityPublicKey) -> Self {
        self.explicit = Some((endpoint, trust_key));
        self
    }

    /// Uses `connector` to reach endpoints.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Uses `clock` to timestamp `init` and check key expiry.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides the reported client name and version.
    #[must_use]
    pub fn client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_name = name.into();
        self.client_version = version.into();
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    /// - `Resolution` if neither an explicit endpoint nor a resolver is set
    /// - `Transport` if the default HTTP connector cannot be created
    pub fn build(self) -> Result<RpcClient> {
        let clock = match (&self.clock, &self.resolver) {
            (Some(clock), _) => clock.clone(),
            (None, Some(resolver)) => resolver.clock().clone(),
            (None, None) => Arc::new(SystemClock),
        };

        let target = match self.explicit {
            Some((endpoint, trust_key)) => Target::Explicit {
                endpoint,
                trust_key,
            },
            None => {
                let domain = self
                    .server
                    .unwrap_or_else(|| self.identify_as.domain().to_string());
                let resolver = self
                    .resolver
                    .ok_or_else(|| ClientError::resolution(&domain, "no resolver configured"))?;
                Target::Resolve { domain, resolver }
            }
        };

        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(HttpConnector::new(DEFAULT_REQUEST_TIMEOUT)?),
        };

        Ok(RpcClient {
            identity: self.identity,
            identify_as: self.identify_as,
            target,
            connector,
            clock,
            client_name: self.client_name,
            client_version: self.client_version,
            session: Mutex::new(None),
        })
    }
}

// ============================================
// RpcClient
// ============================================

/// Encrypted RPC client bound to one identity and one server.
pub struct RpcClient {
    identity: IdentityKeyPair,
    identify_as: PeerAddress,
    target: Target,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    client_name: String,
    client_version: String,
    session: Mutex<Option<Established>>,
}

impl RpcClient {
    /// Starts building a client for `identity` claiming `identify_as`.
    #[must_use]
    pub fn builder(identity: IdentityKeyPair, identify_as: PeerAddress) -> RpcClientBuilder {
        RpcClientBuilder {
            identity,
            identify_as,
            server: None,
            resolver: None,
            explicit: None,
            connector: None,
            clock: None,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
        }
    }

    /// Returns the address this client identifies as.
    #[must_use]
    pub const fn identify_as(&self) -> &PeerAddress {
        &self.identify_as
    }

    /// Returns the identity public key.
    #[must_use]
    pub fn public_key(&self) -> IdentityPublicKey {
        self.identity.public_key()
    }

    /// Returns the current session id, if connected.
    pub async fn session_id(&self) -> Option<SessionId> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.codec.session_id())
    }

    /// Establishes a session unless one exists.
    ///
    /// # Errors
    /// Returns the resolution, transport or handshake failure.
    pub async fn connect(&self) -> Result<SessionId> {
        Ok(self.established().await?.codec.session_id())
    }

    /// Forgets the current session; the next call handshakes again.
    pub async fn disconnect(&self) {
        self.session.lock().await.take();
    }

    /// Reruns the DHE step on the current session, rotating its key.
    ///
    /// # Errors
    /// Returns the handshake failure; the old key stays in use.
    pub async fn rekey(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        let current = match guard.as_ref() {
            Some(current) => current.clone(),
            None => {
                drop(guard);
                self.established().await?;
                return Ok(());
            }
        };
        let codec = self
            .exchange_keys(
                current.transport.as_ref(),
                &current.endpoint,
                current.codec.session_id(),
                &current.trust_key,
            )
            .await?;
        debug!(session_id = %codec.session_id(), "Session key rotated");
        *guard = Some(Established {
            codec: Arc::new(codec),
            ..current
        });
        Ok(())
    }

    /// Queries the server's `info` endpoint.
    ///
    /// # Errors
    /// Returns the resolution or transport failure.
    pub async fn server_information(&self) -> Result<ServerInformation> {
        let (endpoint, _) = self.locate().await?;
        let transport = self.connector.connect(&endpoint)?;
        let reply = transport
            .exchange(RequestFrame::new(RequestType::Info, Vec::new()))
            .await?;
        expect_json(&endpoint, &reply)
    }

    /// Sends a batch and returns the responses in reply order.
    ///
    /// # Errors
    /// - `Rpc` if the server rejected the whole frame
    /// - `Core(Decryption)` if the reply does not open under the session key
    pub async fn send_batch(&self, requests: Vec<RpcRequest>) -> Result<Vec<RpcResponse>> {
        let session = self.established().await?;
        let session_id = session.codec.session_id();

        let sealed = session.codec.seal(&requests)?;
        let frame = RequestFrame::new(RequestType::Rpc, sealed).with_session(session_id);
        let reply = session.transport.exchange(frame).await?;

        if let Some(err) = reply.to_error() {
            warn!(session_id = %session_id, code = err.code.code(), "RPC frame rejected");
            if matches!(
                err.code,
                StandardError::SessionNotFound
                    | StandardError::SessionClosed
                    | StandardError::CryptographicError
            ) {
                self.forget(session_id).await;
            }
            return Err(err.into());
        }

        match session.codec.open(&reply.body) {
            Ok(responses) => Ok(responses),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "RPC reply could not be opened");
                self.forget(session_id).await;
                Err(e.into())
            }
        }
    }

    /// Sends one request and returns its response.
    ///
    /// # Errors
    /// Returns `MissingResponse` if the reply does not contain the id.
    pub async fn send_request(&self, request: RpcRequest) -> Result<RpcResponse> {
        let id = request.id;
        self.send_batch(vec![request])
            .await?
            .into_iter()
            .find(|response| response.id == id)
            .ok_or(ClientError::MissingResponse { id })
    }

    /// Calls `method` and returns its result value.
    ///
    /// # Errors
    /// Returns `Rpc` with the server's error if the call failed.
    pub async fn call(&self, method: &str, parameters: Map<String, Value>) -> Result<Value> {
        let mut request = RpcRequest::new(method, next_request_id());
        request.parameters = parameters;
        debug!(method = %method, id = request.id, "Calling");
        Ok(self.send_request(request).await?.into_result()?)
    }

    /// Calls `method` and decodes its result as `T`.
    ///
    /// # Errors
    /// Returns `UnexpectedResult` if the result does not decode.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        parameters: Map<String, Value>,
    ) -> Result<T> {
        let value = self.call(method, parameters).await?;
        serde_json::from_value(value).map_err(|e| ClientError::unexpected(method, e.to_string()))
    }

    // ========================================
    // Handshake
    // ========================================

    async fn established(&self) -> Result<Established> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }
        let session = self.handshake().await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn forget(&self, session_id: SessionId) {
        let mut guard = self.session.lock().await;
        if guard
            .as_ref()
            .is_some_and(|s| s.codec.session_id() == session_id)
        {
            guard.take();
        }
    }

    async fn locate(&self) -> Result<(Url, IdentityPublicKey)> {
        match &self.target {
            Target::Explicit {
                endpoint,
                trust_key,
            } => Ok((endpoint.clone(), *trust_key)),
            Target::Resolve { domain, resolver } => {
                let record = resolver.resolve(domain).await?;
                if record.is_key_expired(self.clock.now()) {
                    return Err(ClientError::resolution(domain, "trust key has expired"));
                }
                Ok((record.rpc_endpoint().clone(), *record.trust_key()))
            }
        }
    }

    async fn handshake(&self) -> Result<Established> {
        let (endpoint, trust_key) = self.locate().await?;
        let transport = self.connector.connect(&endpoint)?;

        let init = InitiateSessionRequest::signed(
            &self.identity,
            self.identify_as.to_string(),
            self.client_name.as_str(),
            self.client_version.as_str(),
            self.clock.now(),
        );
        let reply = transport
            .exchange(RequestFrame::json(RequestType::InitiateSession, &init)?)
            .await?;
        let InitiateSessionResponse { session_id } = expect_json(&endpoint, &reply)?;

        let codec = self
            .exchange_keys(transport.as_ref(), &endpoint, session_id, &trust_key)
            .await?;

        info!(
            session_id = %session_id,
            identify_as = %self.identify_as,
            endpoint = %endpoint,
            "Session established"
        );

        Ok(Established {
            endpoint,
            trust_key,
            transport,
            codec: Arc::new(codec),
        })
    }

    async fn exchange_keys(
        &self,
        transport: &dyn Transport,
        endpoint: &Url,
        session_id: SessionId,
        trust_key: &IdentityPublicKey,
    ) -> Result<SecureCodec> {
        let pair = ExchangeKeyPair::generate();
        let request = DheRequest::signed(&self.identity, &session_id, &pair, self.clock.now());
        let frame =
            RequestFrame::json(RequestType::DheExchange, &request)?.with_session(session_id);
        let reply = transport.exchange(frame).await?;
        let response: DheResponse = expect_json(endpoint, &reply)?;

        let key = complete_exchange(&pair, &session_id, &response, trust_key)
            .map_err(|e| ClientError::handshake(endpoint.as_str(), e.to_string()))?;
        Ok(SecureCodec::new(key, session_id))
    }
}

fn expect_json<T: DeserializeOwned>(endpoint: &Url, reply: &ResponseFrame) -> Result<T> {
    if let Some(err) = reply.to_error() {
        return Err(err.into());
    }
    serde_json::from_slice(&reply.body).map_err(|e| {
        ClientError::handshake(endpoint.as_str(), format!("unreadable reply: {e}"))
    })
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = match &self.target {
            Target::Resolve { domain, .. } => format!("resolve:{domain}"),
            Target::Explicit { endpoint, .. } => endpoint.to_string(),
        };
        f.debug_struct("RpcClient")
            .field("identify_as", &self.identify_as)
            .field("target", &target)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
