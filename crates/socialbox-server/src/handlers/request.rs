// ============================================
// File: crates/socialbox-server/src/handlers/request.rs
// ============================================
//! # Request Handler
//!
//! ## Creation Reason
//! Entry point for every frame, whatever transport delivered it. Routes by
//! request type, guards the session state, and owns the encrypt/decrypt
//! boundary of RPC frames.
//!
//! ## Main Functionality
//! - `ping` / `info`: stateless
//! - `init` / `dhe`: forwarded to `HandshakeService`
//! - `rpc`: open, dispatch, seal
//!
//! ## RPC Frame Path
//! ```text
//! RequestFrame(rpc, Session-UUID, sealed body)
//!    │
//!    ├─ session lookup ─────────── miss ──► SESSION_NOT_FOUND
//!    ├─ key installed? ─────────── no ────► SESSION_NOT_ESTABLISHED
//!    ├─ open under session key ─── fail ──► close session, CRYPTOGRAPHIC_ERROR
//!    ├─ touch
//!    ├─ dispatch batch  ◄── races ──► session.closed() ──► SESSION_CLOSED
//!    └─ seal responses with the key the request came in under
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Frame-level errors are plain JSON `RpcError`s, never sealed
//! - Per-request failures travel inside the sealed batch
//! - A frame that fails to authenticate closes the session; it is not
//!   repaired
//!
//! ## Last Modified
//! v0.1.0 - Initial request handler

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use socialbox_common::SessionId;
use socialbox_core::protocol::{Codec, DheRequest, InitiateSessionRequest, InitiateSessionResponse};
use socialbox_core::{RequestType, RpcRequest};
use socialbox_transport::{FrameHandler, RequestFrame, ResponseFrame};

use crate::error::{Result, ServerError};
use crate::rpc::Dispatcher;
use crate::services::{HandshakeService, SessionManager};

/// Body returned to `ping`.
pub const PONG: &str = "pong";

/// Routes frames to the handshake service and the dispatcher.
pub struct RequestHandler {
    handshake: Arc<HandshakeService>,
    sessions: Arc<SessionManager>,
    dispatcher: Dispatcher,
    display_internal: bool,
}

impl RequestHandler {
    /// Creates a handler.
    #[must_use]
    pub const fn new(
        handshake: Arc<HandshakeService>,
        sessions: Arc<SessionManager>,
        dispatcher: Dispatcher,
        display_internal: bool,
    ) -> Self {
        Self {
            handshake,
            sessions,
            dispatcher,
            display_internal,
        }
    }

    async fn route(&self, frame: RequestFrame) -> Result<ResponseFrame> {
        match frame.request_type {
            RequestType::Ping => Ok(ResponseFrame::ok(PONG)),
            RequestType::Info => Ok(ResponseFrame::ok_json(&self.handshake.information())?),
            RequestType::InitiateSession => {
                let msg: InitiateSessionRequest = parse_json(&frame.body)?;
                let session = self.handshake.initiate(&msg).await?;
                Ok(ResponseFrame::ok_json(&InitiateSessionResponse {
                    session_id: session.id(),
                })?)
            }
            RequestType::DheExchange => {
                let session_id = require_session(&frame)?;
                let msg: DheRequest = parse_json(&frame.body)?;
                let response = self.handshake.exchange(session_id, &msg).await?;
                Ok(ResponseFrame::ok_json(&response)?)
            }
            RequestType::Rpc => {
                let session_id = require_session(&frame)?;
                self.rpc(session_id, &frame.body).await
            }
        }
    }

    async fn rpc(&self, session_id: SessionId, body: &Bytes) -> Result<ResponseFrame> {
        let session = self.sessions.resume(&session_id).await?;
        let codec = session
            .codec()
            .ok_or(ServerError::SessionNotEstablished(session_id))?;

        let requests: Vec<RpcRequest> = match codec.decode(body) {
            Ok(requests) => requests,
            Err(err) if err.is_session_fatal() => {
                warn!(session_id = %session_id, error = %err, "Undecryptable frame, closing session");
                self.sessions.close(&session_id).await;
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };
        session.touch();

        let responses = tokio::select! {
            biased;
            () = session.closed() => {
                debug!(session_id = %session_id, "Session closed during dispatch");
                return Err(ServerError::SessionClosed(session_id));
            }
            responses = self.dispatcher.dispatch_batch(&session, requests) => responses?,
        };

        Ok(ResponseFrame::ok(codec.seal(&responses)?))
    }
}

#[async_trait]
impl FrameHandler for RequestHandler {
    async fn handle(&self, frame: RequestFrame) -> ResponseFrame {
        let request_type = frame.request_type;
        let session_id = frame.session_id;

        match self.route(frame).await {
            Ok(reply) => reply,
            Err(err) => {
                if err.is_internal() {
                    error!(request_type = %request_type, session_id = ?session_id, error = %err, "Request failed");
                } else {
                    debug!(request_type = %request_type, session_id = ?session_id, error = %err, "Request refused");
                }
                ResponseFrame::error(&err.to_rpc_error(self.display_internal))
            }
        }
    }
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("sessions", &self.sessions.count())
            .field("display_internal", &self.display_internal)
            .finish_non_exhaustive()
    }
}

fn require_session(frame: &RequestFrame) -> Result<SessionId> {
    frame
        .session_id
        .ok_or_else(|| ServerError::bad_request("Missing Session-UUID header"))
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| ServerError::bad_request(format!("Malformed body: {e}")))
}
