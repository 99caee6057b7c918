// ============================================
// File: crates/socialbox-server/tests/federation.rs
// ============================================
//! Cross-server lookups between two in-process servers.

mod common;

use socialbox_client::{FederationResolver, StaticRecordLookup};
use socialbox_core::crypto::IdentityKeyPair;
use socialbox_core::{PeerAddress, StandardError};
use std::sync::Arc;

use common::{endpoint_for, register, TestNetwork};

#[tokio::test]
async fn test_mocked_record_resolves_exact_endpoint_and_key() {
    let key = IdentityKeyPair::generate().public_key();
    let resolver = FederationResolver::new(Arc::new(StaticRecordLookup::new()));
    resolver.add_mock(
        "teapot.com",
        format!(
            "v=socialbox;sb-rpc=https://rpc.teapot.com/;sb-key={};sb-exp=0",
            key.to_record_key()
        ),
    );

    let record = resolver.resolve("teapot.com").await.unwrap();
    assert_eq!(record.rpc_endpoint().as_str(), "https://rpc.teapot.com/");
    assert_eq!(record.trust_key(), &key);
}

#[tokio::test]
async fn test_resolve_peer_across_servers() {
    let net = TestNetwork::new();
    let _coffee = net.start("coffee.com");
    let teapot = net.start("teapot.com");

    let bob = net.client("bob@teapot.com");
    register(&bob, "bob password", "Bob").await;

    let alice = net.client("alice@coffee.com");
    register(&alice, "alice password", "Alice").await;

    let view = alice
        .resolve_peer(&PeerAddress::parse("bob@teapot.com").unwrap())
        .await
        .unwrap();
    assert_eq!(view.address.to_string(), "bob@teapot.com");
    assert_eq!(view.display_name.as_deref(), Some("Bob"));

    // coffee.com opened a host session on teapot.com, already authenticated
    let sessions = teapot.server.sessions();
    assert_eq!(sessions.count(), 2);
}

#[tokio::test]
async fn test_unknown_remote_peer_is_not_found() {
    let net = TestNetwork::new();
    let _coffee = net.start("coffee.com");
    let _teapot = net.start("teapot.com");

    let alice = net.client("alice@coffee.com");
    register(&alice, "alice password", "Alice").await;

    let err = alice
        .resolve_peer(&PeerAddress::parse("nobody@teapot.com").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.rpc_code(), Some(StandardError::NotFound));
}

#[tokio::test]
async fn test_unresolvable_domain_fails_resolution() {
    let net = TestNetwork::new();
    let _coffee = net.start("coffee.com");

    let alice = net.client("alice@coffee.com");
    register(&alice, "alice password", "Alice").await;

    let err = alice
        .resolve_peer(&PeerAddress::parse("bob@nowhere.example").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.rpc_code(), Some(StandardError::ResolutionFailed));
}

#[tokio::test]
async fn test_wrong_trust_key_is_refused() {
    let net = TestNetwork::new();
    let _coffee = net.start("coffee.com");
    let _teapot = net.start("teapot.com");

    // teapot.com publishes a key it does not hold
    net.records.insert(
        "teapot.com",
        format!(
            "v=socialbox;sb-rpc={};sb-key={};sb-exp=0",
            endpoint_for("teapot.com"),
            IdentityKeyPair::generate().public_key().to_record_key()
        ),
    );

    let alice = net.client("alice@coffee.com");
    register(&alice, "alice password", "Alice").await;

    let err = alice
        .resolve_peer(&PeerAddress::parse("bob@teapot.com").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.rpc_code(), Some(StandardError::ResolutionFailed));
}
