// ============================================
// File: crates/socialbox-server/tests/common/mod.rs
// ============================================
//! In-process test network: servers served over loopback, discovery
//! records published in one shared table.

#![allow(dead_code)]

use std::sync::Arc;

use socialbox_client::{FederationResolver, RpcClient, SocialClient, StaticRecordLookup};
use socialbox_core::crypto::IdentityKeyPair;
use socialbox_core::PeerAddress;
use socialbox_server::{MemoryStorage, RpcMethod, Server, ServerConfig};
use socialbox_transport::LoopbackNetwork;

/// Endpoints and discovery records shared by every server and client.
#[derive(Clone, Default)]
pub struct TestNetwork {
    pub loopback: LoopbackNetwork,
    pub records: Arc<StaticRecordLookup>,
}

/// A running in-process server.
pub struct TestServer {
    pub server: Server,
    pub storage: Arc<MemoryStorage>,
    pub domain: String,
}

pub fn endpoint_for(domain: &str) -> String {
    format!("http://{domain}/")
}

impl TestNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolver(&self) -> Arc<FederationResolver> {
        Arc::new(FederationResolver::new(self.records.clone()))
    }

    /// Starts a server for `domain` with the default configuration.
    pub fn start(&self, domain: &str) -> TestServer {
        self.start_with(domain, |_| {}, Vec::new())
    }

    /// Starts a server for `domain`, letting the caller adjust the
    /// configuration and add methods.
    pub fn start_with(
        &self,
        domain: &str,
        configure: impl FnOnce(&mut ServerConfig),
        methods: Vec<Arc<dyn RpcMethod>>,
    ) -> TestServer {
        let mut config = ServerConfig::default();
        config.server.domain = domain.to_string();
        config.server.rpc_endpoint = Some(endpoint_for(domain));
        configure(&mut config);

        let storage = Arc::new(MemoryStorage::new());
        let mut builder = Server::builder(config, IdentityKeyPair::generate())
            .storage(storage.clone())
            .resolver(self.resolver())
            .connector(Arc::new(self.loopback.clone()));
        for method in methods {
            builder = builder.method(method);
        }
        let server = builder.build().unwrap();

        let record = server.discovery_record().unwrap();
        self.records.insert(domain, record.to_record_string());
        self.loopback
            .register(&endpoint_for(domain), server.handler())
            .unwrap();

        TestServer {
            server,
            storage,
            domain: domain.to_string(),
        }
    }

    /// Creates a client for `address` with a fresh identity.
    pub fn client(&self, address: &str) -> SocialClient {
        self.client_with(IdentityKeyPair::generate(), address)
    }

    /// Creates a client for `address` with `identity`.
    pub fn client_with(&self, identity: IdentityKeyPair, address: &str) -> SocialClient {
        let rpc = RpcClient::builder(identity, PeerAddress::parse(address).unwrap())
            .resolver(self.resolver())
            .connector(Arc::new(self.loopback.clone()))
            .build()
            .unwrap();
        SocialClient::new(rpc)
    }
}

/// Runs the default registration steps: password, then display name.
pub async fn register(client: &SocialClient, password: &str, name: &str) {
    assert!(client.settings_set_password(password).await.unwrap());
    assert!(client.settings_set_display_name(name).await.unwrap());
}
