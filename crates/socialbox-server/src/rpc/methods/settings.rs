// ============================================
// File: crates/socialbox-server/src/rpc/methods/settings.rs
// ============================================
//! Account settings. The setters double as registration steps: each one
//! clears its `SET_*` flag and may complete the registration.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tracing::info;

use socialbox_core::crypto::password::is_password_hash;
use socialbox_core::{RpcRequest, SessionFlag};

use super::{names, required_str};
use crate::error::{Result, ServerError};
use crate::rpc::{MethodContext, ParamKind, ParamSpec, Precondition, RpcMethod};

/// Longest accepted display name, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// `settingsSetPassword`: stores an Argon2id hash produced by the client.
#[derive(Debug, Clone, Copy)]
pub struct SetPassword;

#[async_trait]
impl RpcMethod for SetPassword {
    fn name(&self) -> &'static str {
        names::SETTINGS_SET_PASSWORD
    }

    fn precondition(&self) -> Precondition {
        Precondition::RegistrationOrAuthenticated
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("password", ParamKind::String)];
        PARAMS
    }

    async fn execute(&self, ctx: &MethodContext, request: &RpcRequest) -> Result<Value> {
        let hash = required_str(request, "password")?;
        if !is_password_hash(hash) {
            return Err(ServerError::invalid_arguments(
                "The password must be an Argon2 hash",
            ));
        }

        let mut peer = ctx.peer().await?;
        peer.password_hash = Some(hash.to_string());
        ctx.services().storage.save_peer_record(&peer).await?;
        info!(peer = %peer.address, "Password updated");

        ctx.complete_step(SessionFlag::SetPassword).await?;
        Ok(Value::Bool(true))
    }
}

/// `settingsSetDisplayName`
#[derive(Debug, Clone, Copy)]
pub struct SetDisplayName;

#[async_trait]
impl RpcMethod for SetDisplayName {
    fn name(&self) -> &'static str {
        names::SETTINGS_SET_DISPLAY_NAME
    }

    fn precondition(&self) -> Precondition {
        Precondition::RegistrationOrAuthenticated
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("name", ParamKind::String)];
        PARAMS
    }

    async fn execute(&self, ctx: &MethodContext, request: &RpcRequest) -> Result<Value> {
        let name = required_str(request, "name")?.trim();
        let chars = name.chars().count();
        if chars == 0 || chars > MAX_DISPLAY_NAME_CHARS {
            return Err(ServerError::invalid_arguments(format!(
                "The display name must be 1 to {MAX_DISPLAY_NAME_CHARS} characters"
            )));
        }

        let mut peer = ctx.peer().await?;
        peer.display_name = Some(name.to_string());
        ctx.services().storage.save_peer_record(&peer).await?;

        ctx.complete_step(SessionFlag::SetDisplayName).await?;
        Ok(Value::Bool(true))
    }
}

/// `settingsSetDisplayPicture`: base64 image data within the size limit.
#[derive(Debug, Clone, Copy)]
pub struct SetDisplayPicture;

#[async_trait]
impl RpcMethod for SetDisplayPicture {
    fn name(&self) -> &'static str {
        names::SETTINGS_SET_DISPLAY_PICTURE
    }

    fn precondition(&self) -> Precondition {
        Precondition::RegistrationOrAuthenticated
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("picture", ParamKind::String)];
        PARAMS
    }

    async fn execute(&self, ctx: &MethodContext, request: &RpcRequest) -> Result<Value> {
        let picture = required_str(request, "picture")?;
        let data = STANDARD
            .decode(picture.as_bytes())
            .map_err(|e| ServerError::invalid_arguments(format!("The picture is not valid base64: {e}")))?;

        let limit = ctx.services().config.limits.max_display_picture_bytes;
        if data.is_empty() || data.len() > limit {
            return Err(ServerError::invalid_arguments(format!(
                "The picture must be between 1 and {limit} bytes"
            )));
        }

        let mut peer = ctx.peer().await?;
        peer.display_picture = Some(picture.to_string());
        ctx.services().storage.save_peer_record(&peer).await?;

        ctx.complete_step(SessionFlag::SetDisplayPicture).await?;
        Ok(Value::Bool(true))
    }
}

/// `settingsDeleteDisplayPicture`
#[derive(Debug, Clone, Copy)]
pub struct DeleteDisplayPicture;

#[async_trait]
impl RpcMethod for DeleteDisplayPicture {
    fn name(&self) -> &'static str {
        names::SETTINGS_DELETE_DISPLAY_PICTURE
    }

    async fn execute(&self, ctx: &MethodContext, _request: &RpcRequest) -> Result<Value> {
        if ctx.services().config.registration.display_picture_required {
            return Err(ServerError::forbidden(
                "A display picture is required for this server",
            ));
        }

        let mut peer = ctx.peer().await?;
        if peer.display_picture.take().is_some() {
            ctx.services().storage.save_peer_record(&peer).await?;
        }
        Ok(Value::Bool(true))
    }
}
