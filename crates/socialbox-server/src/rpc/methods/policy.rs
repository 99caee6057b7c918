// ============================================
// File: crates/socialbox-server/src/rpc/methods/policy.rs
// ============================================
//! Policy acceptance steps. All three behave the same and differ only in
//! the flag they clear.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use socialbox_core::{RpcRequest, SessionFlag};

use super::names;
use crate::error::Result;
use crate::rpc::{MethodContext, Precondition, RpcMethod};

/// `acceptPrivacyPolicy`, `acceptTermsOfService`,
/// `acceptCommunityGuidelines`.
#[derive(Debug, Clone, Copy)]
pub struct AcceptPolicy {
    name: &'static str,
    flag: SessionFlag,
    already: &'static str,
}

impl AcceptPolicy {
    /// `acceptPrivacyPolicy`
    #[must_use]
    pub const fn privacy_policy() -> Self {
        Self {
            name: names::ACCEPT_PRIVACY_POLICY,
            flag: SessionFlag::VerPrivacyPolicy,
            already: "Privacy policy has already been accepted",
        }
    }

    /// `acceptTermsOfService`
    #[must_use]
    pub const fn terms_of_service() -> Self {
        Self {
            name: names::ACCEPT_TERMS_OF_SERVICE,
            flag: SessionFlag::VerTermsOfService,
            already: "Terms of service have already been accepted",
        }
    }

    /// `acceptCommunityGuidelines`
    #[must_use]
    pub const fn community_guidelines() -> Self {
        Self {
            name: names::ACCEPT_COMMUNITY_GUIDELINES,
            flag: SessionFlag::VerCommunityGuidelines,
            already: "Community guidelines have already been accepted",
        }
    }
}

#[async_trait]
impl RpcMethod for AcceptPolicy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn precondition(&self) -> Precondition {
        Precondition::Flag {
            flag: self.flag,
            message: self.already,
        }
    }

    async fn execute(&self, ctx: &MethodContext, _request: &RpcRequest) -> Result<Value> {
        ctx.complete_step(self.flag).await?;
        info!(session_id = %ctx.session().id(), flag = %self.flag, "Policy accepted");
        Ok(Value::Bool(true))
    }
}
