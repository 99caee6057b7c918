// ============================================
// File: crates/socialbox-server/src/rpc/methods/verification.rs
// ============================================
//! Verification steps: image captcha and password authentication.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use socialbox_core::crypto::password::{is_sha512_hex, verify_password};
use socialbox_core::{RpcRequest, SessionFlag};

use super::{names, required_str, to_value};
use crate::error::{Result, ServerError};
use crate::rpc::{MethodContext, ParamKind, ParamSpec, Precondition, RpcMethod};
use crate::services::AnswerOutcome;

const CAPTCHA_STEP: Precondition = Precondition::Flag {
    flag: SessionFlag::VerImageCaptcha,
    message: "Captcha verification is not required for this session",
};

/// `verificationGetImageCaptcha`: issues a new captcha.
#[derive(Debug, Clone, Copy)]
pub struct GetImageCaptcha;

#[async_trait]
impl RpcMethod for GetImageCaptcha {
    fn name(&self) -> &'static str {
        names::VERIFICATION_GET_IMAGE_CAPTCHA
    }

    fn precondition(&self) -> Precondition {
        CAPTCHA_STEP
    }

    async fn execute(&self, ctx: &MethodContext, _request: &RpcRequest) -> Result<Value> {
        let challenge = ctx
            .services()
            .captcha
            .create(ctx.session().peer_id())
            .await?;
        to_value(&challenge)
    }
}

/// `verificationAnswerImageCaptcha`: `true` when solved.
#[derive(Debug, Clone, Copy)]
pub struct AnswerImageCaptcha;

#[async_trait]
impl RpcMethod for AnswerImageCaptcha {
    fn name(&self) -> &'static str {
        names::VERIFICATION_ANSWER_IMAGE_CAPTCHA
    }

    fn precondition(&self) -> Precondition {
        CAPTCHA_STEP
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("answer", ParamKind::String)];
        PARAMS
    }

    async fn execute(&self, ctx: &MethodContext, request: &RpcRequest) -> Result<Value> {
        let answer = required_str(request, "answer")?;
        let outcome = ctx
            .services()
            .captcha
            .answer(ctx.session().peer_id(), answer)
            .await?;

        match outcome {
            AnswerOutcome::Missing => Err(ServerError::CaptchaNotAvailable),
            AnswerOutcome::Expired => Err(ServerError::CaptchaExpired),
            AnswerOutcome::Wrong | AnswerOutcome::AlreadySolved => Ok(Value::Bool(false)),
            AnswerOutcome::Solved => {
                ctx.complete_step(SessionFlag::VerImageCaptcha).await?;
                Ok(Value::Bool(true))
            }
        }
    }
}

/// `verificationPasswordAuthentication`: `true` when the password matches.
#[derive(Debug, Clone, Copy)]
pub struct PasswordAuthentication;

#[async_trait]
impl RpcMethod for PasswordAuthentication {
    fn name(&self) -> &'static str {
        names::VERIFICATION_PASSWORD_AUTHENTICATION
    }

    fn precondition(&self) -> Precondition {
        Precondition::Flag {
            flag: SessionFlag::VerPassword,
            message: "Password authentication is not required for this session",
        }
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("password", ParamKind::String)];
        PARAMS
    }

    async fn execute(&self, ctx: &MethodContext, request: &RpcRequest) -> Result<Value> {
        let password = required_str(request, "password")?;
        if !is_sha512_hex(password) {
            return Err(ServerError::invalid_arguments(
                "The password must be a SHA-512 hex digest",
            ));
        }

        let peer = ctx.peer().await?;
        let Some(stored) = peer.password_hash.as_deref() else {
            return Err(ServerError::forbidden("No password is set for this peer"));
        };

        if !verify_password(password, stored)? {
            warn!(session_id = %ctx.session().id(), peer = %peer.address, "Wrong password");
            return Ok(Value::Bool(false));
        }

        ctx.complete_step(SessionFlag::VerPassword).await?;
        info!(session_id = %ctx.session().id(), peer = %peer.address, "Password verified");
        Ok(Value::Bool(true))
    }
}
