// ============================================
// File: crates/socialbox-server/src/rpc/methods/peers.rs
// ============================================
//! `resolvePeer`: local peers come from storage, everyone else from their
//! home server.

use async_trait::async_trait;
use serde_json::Value;

use socialbox_core::{PeerAddress, RpcRequest};

use super::{names, required_str, to_value};
use crate::error::{Result, ServerError};
use crate::rpc::{MethodContext, ParamKind, ParamSpec, RpcMethod};

/// `resolvePeer`
#[derive(Debug, Clone, Copy)]
pub struct ResolvePeer;

#[async_trait]
impl RpcMethod for ResolvePeer {
    fn name(&self) -> &'static str {
        names::RESOLVE_PEER
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("peer", ParamKind::String)];
        PARAMS
    }

    async fn execute(&self, ctx: &MethodContext, request: &RpcRequest) -> Result<Value> {
        let text = required_str(request, "peer")?;
        let address = PeerAddress::parse(text)
            .map_err(|e| ServerError::invalid_arguments(format!("Peer address error: {e}")))?;

        let services = ctx.services();
        if !address.is_local(&services.config.server.domain) {
            return to_value(&services.federation.resolve_peer(&address).await?);
        }

        match services.storage.load_peer_record(&address).await? {
            Some(peer) if peer.enabled => to_value(&peer.to_view()),
            _ => Err(ServerError::not_found(format!("Peer {address}"))),
        }
    }
}
