// ============================================
// File: crates/socialbox-server/src/rpc/methods/status.rs
// ============================================
//! Methods callable on any keyed session.

use async_trait::async_trait;
use serde_json::Value;

use socialbox_core::RpcRequest;

use super::{names, to_value};
use crate::error::Result;
use crate::rpc::{MethodContext, Precondition, RpcMethod};

/// `ping`: always `true`.
#[derive(Debug, Clone, Copy)]
pub struct Ping;

#[async_trait]
impl RpcMethod for Ping {
    fn name(&self) -> &'static str {
        names::PING
    }

    fn precondition(&self) -> Precondition {
        Precondition::Always
    }

    async fn execute(&self, _ctx: &MethodContext, _request: &RpcRequest) -> Result<Value> {
        Ok(Value::Bool(true))
    }
}

/// `getSessionState`: the session as the server sees it.
#[derive(Debug, Clone, Copy)]
pub struct GetSessionState;

#[async_trait]
impl RpcMethod for GetSessionState {
    fn name(&self) -> &'static str {
        names::GET_SESSION_STATE
    }

    fn precondition(&self) -> Precondition {
        Precondition::Always
    }

    async fn execute(&self, ctx: &MethodContext, _request: &RpcRequest) -> Result<Value> {
        to_value(&ctx.session().snapshot().await)
    }
}

/// `getAllowedMethods`: names whose precondition currently holds.
#[derive(Debug, Clone, Copy)]
pub struct GetAllowedMethods;

#[async_trait]
impl RpcMethod for GetAllowedMethods {
    fn name(&self) -> &'static str {
        names::GET_ALLOWED_METHODS
    }

    fn precondition(&self) -> Precondition {
        Precondition::Always
    }

    async fn execute(&self, ctx: &MethodContext, _request: &RpcRequest) -> Result<Value> {
        let state = ctx.session().snapshot().await;
        to_value(&ctx.registry().allowed(&state))
    }
}
