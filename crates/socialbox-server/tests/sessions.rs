// ============================================
// File: crates/socialbox-server/tests/sessions.rs
// ============================================
//! Session lifecycle edges: key establishment, failures, re-keying and
//! cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Notify;

use socialbox_common::{SessionId, Timestamp};
use socialbox_core::crypto::{ExchangeKeyPair, IdentityKeyPair};
use socialbox_core::protocol::{DheRequest, InitiateSessionRequest, InitiateSessionResponse};
use socialbox_core::{RequestType, RpcRequest, SessionFlag, StandardError};
use socialbox_server::{MethodContext, Precondition, RpcMethod};
use socialbox_transport::{Connector, RequestFrame, ResponseFrame, Transport, Url};

use common::{endpoint_for, TestNetwork};

/// Opens a session for `identity` with a raw `init` frame and returns its id.
async fn raw_init(transport: &dyn Transport, identity: &IdentityKeyPair) -> SessionId {
    let init = InitiateSessionRequest::signed(
        identity,
        "alice@coffee.com",
        "raw",
        "0.0.0",
        Timestamp::now(),
    );
    let reply = transport
        .exchange(RequestFrame::json(RequestType::InitiateSession, &init).unwrap())
        .await
        .unwrap();
    assert!(reply.to_error().is_none());
    let response: InitiateSessionResponse = serde_json::from_slice(&reply.body).unwrap();
    response.session_id
}

/// Sends a raw `dhe` frame signed by `identity`.
async fn raw_dhe(
    transport: &dyn Transport,
    identity: &IdentityKeyPair,
    session_id: SessionId,
) -> ResponseFrame {
    let dhe = DheRequest::signed(
        identity,
        &session_id,
        &ExchangeKeyPair::generate(),
        Timestamp::now(),
    );
    transport
        .exchange(
            RequestFrame::json(RequestType::DheExchange, &dhe)
                .unwrap()
                .with_session(session_id),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_rpc_before_key_exchange_is_refused() {
    let net = TestNetwork::new();
    let _coffee = net.start("coffee.com");
    let transport = net
        .loopback
        .connect(&Url::parse(&endpoint_for("coffee.com")).unwrap())
        .unwrap();

    let session_id = raw_init(transport.as_ref(), &IdentityKeyPair::generate()).await;
    let frame = RequestFrame::new(RequestType::Rpc, vec![0u8; 64]).with_session(session_id);
    let reply = transport.exchange(frame).await.unwrap();

    assert_eq!(
        reply.to_error().map(|e| e.code),
        Some(StandardError::SessionNotEstablished)
    );
}

#[tokio::test]
async fn test_undecryptable_frame_closes_session() {
    let net = TestNetwork::new();
    let coffee = net.start("coffee.com");
    let transport = net
        .loopback
        .connect(&Url::parse(&endpoint_for("coffee.com")).unwrap())
        .unwrap();

    let identity = IdentityKeyPair::generate();
    let session_id = raw_init(transport.as_ref(), &identity).await;
    let reply = raw_dhe(transport.as_ref(), &identity, session_id).await;
    assert!(reply.to_error().is_none());

    let garbage = RequestFrame::new(RequestType::Rpc, vec![0x42u8; 64]).with_session(session_id);
    let reply = transport.exchange(garbage).await.unwrap();
    assert_eq!(
        reply.to_error().map(|e| e.code),
        Some(StandardError::CryptographicError)
    );
    assert!(coffee.server.sessions().get(&session_id).is_none());

    let again = RequestFrame::new(RequestType::Rpc, vec![0x42u8; 64]).with_session(session_id);
    let reply = transport.exchange(again).await.unwrap();
    assert_eq!(
        reply.to_error().map(|e| e.code),
        Some(StandardError::SessionNotFound)
    );
}

#[tokio::test]
async fn test_key_exchange_by_another_identity_is_refused() {
    let net = TestNetwork::new();
    let _coffee = net.start("coffee.com");
    let alice = net.client("alice@coffee.com");
    assert!(alice.settings_set_password("alice password").await.unwrap());
    let session_id = alice.rpc().session_id().await.unwrap();

    let transport = net
        .loopback
        .connect(&Url::parse(&endpoint_for("coffee.com")).unwrap())
        .unwrap();
    let reply = raw_dhe(transport.as_ref(), &IdentityKeyPair::generate(), session_id).await;
    assert_eq!(
        reply.to_error().map(|e| e.code),
        Some(StandardError::CryptographicError)
    );

    // the owner's key is still the installed one
    let state = alice.get_session_state().await.unwrap();
    assert!(!state.contains_flag(SessionFlag::SetPassword));
    assert_eq!(alice.rpc().session_id().await, Some(session_id));
}

#[tokio::test]
async fn test_storage_failure_leaves_flags_unchanged() {
    let net = TestNetwork::new();
    let coffee = net.start_with(
        "coffee.com",
        |config| config.registration.privacy_policy_required = true,
        Vec::new(),
    );
    let alice = net.client("alice@coffee.com");
    alice.ping().await.unwrap();

    coffee.storage.fail_operation(Some("save_session_flags"));
    let err = alice.accept_privacy_policy().await.unwrap_err();
    assert_eq!(err.rpc_code(), Some(StandardError::InternalServerError));
    assert!(!err.to_string().contains("save_session_flags"));

    coffee.storage.fail_operation(None);
    let state = alice.get_session_state().await.unwrap();
    assert!(state.contains_flag(SessionFlag::VerPrivacyPolicy));

    assert!(alice.accept_privacy_policy().await.unwrap());
}

#[tokio::test]
async fn test_internal_detail_shown_when_enabled() {
    let net = TestNetwork::new();
    let coffee = net.start_with(
        "coffee.com",
        |config| {
            config.registration.privacy_policy_required = true;
            config.security.display_internal_exceptions = true;
        },
        Vec::new(),
    );
    let alice = net.client("alice@coffee.com");
    alice.ping().await.unwrap();

    coffee.storage.fail_operation(Some("save_session_flags"));
    let err = alice.accept_privacy_policy().await.unwrap_err();
    assert_eq!(err.rpc_code(), Some(StandardError::InternalServerError));
    assert!(err.to_string().contains("save_session_flags"));
}

#[tokio::test]
async fn test_rekey_preserves_flags() {
    let net = TestNetwork::new();
    let _coffee = net.start("coffee.com");
    let alice = net.client("alice@coffee.com");

    assert!(alice.settings_set_password("correct horse").await.unwrap());
    let before = alice.get_session_state().await.unwrap();
    let session_id = alice.rpc().session_id().await;

    alice.rpc().rekey().await.unwrap();

    let after = alice.get_session_state().await.unwrap();
    assert_eq!(alice.rpc().session_id().await, session_id);
    assert_eq!(before.flags, after.flags);
    assert!(after.contains_flag(SessionFlag::SetDisplayName));
    assert!(!after.contains_flag(SessionFlag::SetPassword));
}

/// Blocks until the test lets it go.
struct Stall {
    started: Arc<Notify>,
}

#[async_trait]
impl RpcMethod for Stall {
    fn name(&self) -> &'static str {
        "stall"
    }

    fn precondition(&self) -> Precondition {
        Precondition::Always
    }

    async fn execute(
        &self,
        _ctx: &MethodContext,
        _request: &RpcRequest,
    ) -> socialbox_server::Result<Value> {
        self.started.notify_one();
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Value::Bool(true))
    }
}

#[tokio::test]
async fn test_close_cancels_in_flight_request() {
    let net = TestNetwork::new();
    let started = Arc::new(Notify::new());
    let coffee = net.start_with(
        "coffee.com",
        |_| {},
        vec![Arc::new(Stall {
            started: Arc::clone(&started),
        })],
    );
    let alice = Arc::new(net.client("alice@coffee.com"));
    let session_id = alice.rpc().connect().await.unwrap();

    let caller = Arc::clone(&alice);
    let call = tokio::spawn(async move { caller.rpc().call("stall", Map::new()).await });

    started.notified().await;
    assert!(coffee.server.sessions().close(&session_id).await.is_some());

    let result = tokio::time::timeout(Duration::from_secs(5), call)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        result.unwrap_err().rpc_code(),
        Some(StandardError::SessionClosed)
    );
}

#[tokio::test]
async fn test_session_limit() {
    let net = TestNetwork::new();
    let _coffee = net.start_with("coffee.com", |config| config.session.max_sessions = 1, Vec::new());

    net.client("alice@coffee.com").ping().await.unwrap();
    let err = net.client("bob@coffee.com").ping().await.unwrap_err();
    assert_eq!(err.rpc_code(), Some(StandardError::ServerUnavailable));
}
