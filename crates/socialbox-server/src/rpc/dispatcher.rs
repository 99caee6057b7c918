// ============================================
// File: crates/socialbox-server/src/rpc/dispatcher.rs
// ============================================
//! # RPC Dispatcher
//!
//! ## Creation Reason
//! Single place where a decrypted `RpcRequest` becomes an `RpcResponse`:
//! method lookup, precondition check, parameter check, invocation and
//! error redaction all happen here and nowhere else.
//!
//! ## Main Functionality
//! - `RpcMethod`: the one capability a handler implements
//! - `Precondition` / `ParamSpec`: declarative gates evaluated before
//!   `execute`
//! - `MethodRegistry`: name → handler table, open to extension
//! - `Dispatcher`: runs a batch in order
//!
//! ## Dispatch Pipeline
//! ```text
//! RpcRequest
//!    │
//!    ├─ registry lookup ─────── miss ──► RPC_METHOD_NOT_FOUND
//!    ├─ precondition ────────── fail ──► UNAUTHORIZED / FORBIDDEN
//!    ├─ parameter specs ─────── fail ──► RPC_INVALID_ARGUMENTS
//!    ├─ execute(ctx, request)
//!    └─ ServerError ──► to_rpc_error(display_internal) ──► RpcResponse
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers never build wire errors themselves; return `ServerError`
//! - Internal detail is logged in full but only sent to the client when
//!   `security.display_internal_exceptions` is on
//!
//! ## Last Modified
//! v0.1.0 - Initial dispatcher

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

use socialbox_core::protocol::SessionState;
use socialbox_core::{RpcRequest, RpcResponse, SessionFlag};

use crate::error::{Result, ServerError};
use crate::rpc::context::{MethodContext, ServiceContext};
use crate::services::Session;

// ============================================
// Method Contract
// ============================================

/// Session state a method requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Callable on any keyed session.
    Always,
    /// Callable while `flag` is outstanding; otherwise `FORBIDDEN` with
    /// `message`.
    Flag {
        /// Required flag
        flag: SessionFlag,
        /// Refusal message
        message: &'static str,
    },
    /// Callable while registering or once authenticated.
    RegistrationOrAuthenticated,
    /// Callable once authenticated.
    Authenticated,
}

impl Precondition {
    /// Checks `state` against this precondition.
    ///
    /// # Errors
    /// - `Unauthorized` when authentication is missing
    /// - `Forbidden` when the flag state does not allow the call
    pub fn check(&self, state: &SessionState) -> Result<()> {
        match self {
            Self::Always => Ok(()),
            Self::Flag { flag, message } => {
                if state.contains_flag(*flag) {
                    Ok(())
                } else {
                    Err(ServerError::forbidden(*message))
                }
            }
            Self::RegistrationOrAuthenticated => {
                if state.authenticated || state.contains_flag(SessionFlag::RegistrationRequired) {
                    Ok(())
                } else {
                    Err(ServerError::unauthorized(
                        "This method requires registration or authentication",
                    ))
                }
            }
            Self::Authenticated => {
                if state.authenticated {
                    Ok(())
                } else {
                    Err(ServerError::unauthorized(
                        "This method requires an authenticated session",
                    ))
                }
            }
        }
    }
}

/// JSON type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// JSON string
    String,
    /// JSON integer
    Integer,
    /// JSON boolean
    Boolean,
    /// JSON object
    Object,
}

impl ParamKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
        }
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
            Self::Object => "an object",
        }
    }
}

/// Declared parameter of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name
    pub name: &'static str,
    /// Expected JSON type
    pub kind: ParamKind,
    /// Whether it must be present
    pub required: bool,
}

impl ParamSpec {
    /// A required parameter.
    #[must_use]
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    /// An optional parameter.
    #[must_use]
    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }

    fn check(&self, request: &RpcRequest) -> Result<()> {
        match request.param(self.name) {
            None | Some(Value::Null) if self.required => Err(ServerError::invalid_arguments(
                format!("Missing required parameter '{}'", self.name),
            )),
            None | Some(Value::Null) => Ok(()),
            Some(value) if !self.kind.matches(value) => {
                Err(ServerError::invalid_arguments(format!(
                    "Parameter '{}' must be {}",
                    self.name,
                    self.kind.describe()
                )))
            }
            Some(_) => Ok(()),
        }
    }
}

/// An RPC method handler.
#[async_trait]
pub trait RpcMethod: Send + Sync {
    /// Wire name.
    fn name(&self) -> &'static str;

    /// Session state required to call it.
    fn precondition(&self) -> Precondition {
        Precondition::Authenticated
    }

    /// Declared parameters, checked before `execute`.
    fn parameters(&self) -> &'static [ParamSpec] {
        &[]
    }

    /// Runs the method.
    async fn execute(&self, ctx: &MethodContext, request: &RpcRequest) -> Result<Value>;
}

// ============================================
// Registry
// ============================================

/// Name → handler table.
#[derive(Default, Clone)]
pub struct MethodRegistry {
    methods: BTreeMap<&'static str, Arc<dyn RpcMethod>>,
}

impl MethodRegistry {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding the standard methods.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::rpc::methods::register_defaults(&mut registry);
        registry
    }

    /// Registers `method`, replacing any handler of the same name.
    pub fn register(&mut self, method: Arc<dyn RpcMethod>) -> &mut Self {
        if self.methods.insert(method.name(), method).is_some() {
            debug!("Replaced a registered method");
        }
        self
    }

    /// Returns the handler for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn RpcMethod>> {
        self.methods.get(name)
    }

    /// Returns every registered name, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.methods.keys().copied().collect()
    }

    /// Returns the names whose precondition `state` satisfies, sorted.
    #[must_use]
    pub fn allowed(&self, state: &SessionState) -> Vec<&'static str> {
        self.methods
            .values()
            .filter(|method| method.precondition().check(state).is_ok())
            .map(|method| method.name())
            .collect()
    }

    /// Returns the number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.names())
            .finish()
    }
}

// ============================================
// Dispatcher
// ============================================

/// Runs RPC batches against the method table.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
    services: Arc<ServiceContext>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub const fn new(registry: Arc<MethodRegistry>, services: Arc<ServiceContext>) -> Self {
        Self { registry, services }
    }

    /// Returns the method table.
    #[must_use]
    pub const fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Answers every request of a batch, in order.
    ///
    /// # Errors
    /// Returns `BadRequest` if the batch is larger than
    /// `limits.max_batch_size`.
    pub async fn dispatch_batch(
        &self,
        session: &Arc<Session>,
        requests: Vec<RpcRequest>,
    ) -> Result<Vec<RpcResponse>> {
        let limit = self.services.config.limits.max_batch_size;
        if requests.len() > limit {
            return Err(ServerError::bad_request(format!(
                "Batch of {} requests exceeds the limit of {limit}",
                requests.len()
            )));
        }

        let mut responses = Vec::with_capacity(requests.len());
        for request in &requests {
            responses.push(self.dispatch(session, request).await);
        }
        Ok(responses)
    }

    /// Answers one request.
    pub async fn dispatch(&self, session: &Arc<Session>, request: &RpcRequest) -> RpcResponse {
        debug!(
            session_id = %session.id(),
            method = %request.method,
            id = request.id,
            "Dispatching"
        );

        match self.invoke(session, request).await {
            Ok(result) => request.respond(result),
            Err(err) => {
                if err.is_internal() {
                    error!(
                        session_id = %session.id(),
                        method = %request.method,
                        error = %err,
                        "Method failed"
                    );
                } else {
                    warn!(
                        session_id = %session.id(),
                        method = %request.method,
                        error = %err,
                        "Method refused"
                    );
                }
                let display = self.services.config.security.display_internal_exceptions;
                request.fail(err.to_rpc_error(display))
            }
        }
    }

    async fn invoke(&self, session: &Arc<Session>, request: &RpcRequest) -> Result<Value> {
        let method = self
            .registry
            .get(&request.method)
            .ok_or_else(|| ServerError::MethodNotFound {
                method: request.method.clone(),
            })?;

        method.precondition().check(&session.snapshot().await)?;
        for spec in method.parameters() {
            spec.check(request)?;
        }

        let ctx = MethodContext::new(
            Arc::clone(session),
            Arc::clone(&self.services),
            Arc::clone(&self.registry),
        );
        method.execute(&ctx, request).await
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use socialbox_common::{SessionId, Timestamp};
    use socialbox_core::PeerAddress;

    fn state(authenticated: bool, flags: &[SessionFlag]) -> SessionState {
        SessionState {
            id: SessionId::generate(),
            identified_as: PeerAddress::parse("alice@coffee.com").unwrap(),
            authenticated,
            flags: flags.to_vec(),
            created: Timestamp::from_secs(0),
        }
    }

    #[test]
    fn test_precondition_codes() {
        let registering = state(false, &[SessionFlag::RegistrationRequired, SessionFlag::SetPassword]);
        let logging_in = state(false, &[SessionFlag::AuthenticationRequired, SessionFlag::VerPassword]);
        let done = state(true, &[]);

        assert!(Precondition::Always.check(&logging_in).is_ok());
        assert!(Precondition::RegistrationOrAuthenticated.check(&registering).is_ok());
        assert!(Precondition::RegistrationOrAuthenticated.check(&done).is_ok());
        assert!(matches!(
            Precondition::RegistrationOrAuthenticated.check(&logging_in),
            Err(ServerError::Unauthorized { .. })
        ));
        assert!(matches!(
            Precondition::Authenticated.check(&registering),
            Err(ServerError::Unauthorized { .. })
        ));

        let flag = Precondition::Flag {
            flag: SessionFlag::VerPassword,
            message: "no password step",
        };
        assert!(flag.check(&logging_in).is_ok());
        match flag.check(&done) {
            Err(ServerError::Forbidden { reason }) => assert_eq!(reason, "no password step"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_param_spec() {
        let spec = ParamSpec::required("answer", ParamKind::String);
        let ok = RpcRequest::new("m", 1).with_param("answer", "ABC123");
        let missing = RpcRequest::new("m", 1);
        let wrong = RpcRequest::new("m", 1).with_param("answer", 42);

        assert!(spec.check(&ok).is_ok());
        assert!(matches!(spec.check(&missing), Err(ServerError::InvalidArguments { .. })));
        assert!(matches!(spec.check(&wrong), Err(ServerError::InvalidArguments { .. })));

        let optional = ParamSpec::optional("answer", ParamKind::String);
        assert!(optional.check(&missing).is_ok());
        assert!(optional.check(&wrong).is_err());
    }

    #[test]
    fn test_defaults_and_allowed() {
        let registry = MethodRegistry::with_defaults();
        assert_eq!(registry.len(), 14);
        assert!(registry.get("ping").is_some());
        assert!(registry.get("nope").is_none());

        let allowed = registry.allowed(&state(
            false,
            &[SessionFlag::RegistrationRequired, SessionFlag::VerPrivacyPolicy],
        ));
        assert!(allowed.contains(&"ping"));
        assert!(allowed.contains(&"acceptPrivacyPolicy"));
        assert!(allowed.contains(&"settingsSetDisplayName"));
        assert!(!allowed.contains(&"acceptTermsOfService"));
        assert!(!allowed.contains(&"resolvePeer"));
    }
}
