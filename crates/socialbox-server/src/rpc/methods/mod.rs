// ============================================
// File: crates/socialbox-server/src/rpc/methods/mod.rs
// ============================================
//! # Standard Methods
//!
//! The method set every server registers by default. Deployments add their
//! own through [`MethodRegistry::register`].
//!
//! | group            | methods                                                  |
//! |------------------|----------------------------------------------------------|
//! | [`status`]       | ping, getSessionState, getAllowedMethods                 |
//! | [`policy`]       | accept{PrivacyPolicy,TermsOfService,CommunityGuidelines} |
//! | [`verification`] | image captcha, password authentication                   |
//! | [`settings`]     | password, display name, display picture                  |
//! | [`peers`]        | resolvePeer                                              |

pub mod peers;
pub mod policy;
pub mod settings;
pub mod status;
pub mod verification;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, ServerError};
use crate::rpc::MethodRegistry;

pub use socialbox_client::social::methods as names;

/// Registers every standard method.
pub fn register_defaults(registry: &mut MethodRegistry) {
    registry
        .register(Arc::new(status::Ping))
        .register(Arc::new(status::GetSessionState))
        .register(Arc::new(status::GetAllowedMethods))
        .register(Arc::new(policy::AcceptPolicy::privacy_policy()))
        .register(Arc::new(policy::AcceptPolicy::terms_of_service()))
        .register(Arc::new(policy::AcceptPolicy::community_guidelines()))
        .register(Arc::new(verification::GetImageCaptcha))
        .register(Arc::new(verification::AnswerImageCaptcha))
        .register(Arc::new(verification::PasswordAuthentication))
        .register(Arc::new(settings::SetPassword))
        .register(Arc::new(settings::SetDisplayName))
        .register(Arc::new(settings::SetDisplayPicture))
        .register(Arc::new(settings::DeleteDisplayPicture))
        .register(Arc::new(peers::ResolvePeer));
}

/// Serializes a method result.
fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| ServerError::internal(format!("result serialization failed: {e}")))
}

/// Returns a declared string parameter; the dispatcher has checked it.
fn required_str<'a>(request: &'a socialbox_core::RpcRequest, name: &str) -> Result<&'a str> {
    request
        .param_str(name)
        .ok_or_else(|| ServerError::invalid_arguments(format!("Missing required parameter '{name}'")))
}
