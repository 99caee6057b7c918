// ============================================
// File: crates/socialbox-server/src/rpc/mod.rs
// ============================================
//! # RPC Layer
//!
//! ## Creation Reason
//! Everything that happens to a request after it has been decrypted.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`dispatcher`]: method contract, registry and dispatch pipeline
//! - [`context`]: what a handler sees, and the step-completion rule
//! - [`methods`]: the standard method set
//!
//! ## ⚠️ Important Note for Next Developer
//! - New methods implement [`RpcMethod`] and are registered by name; there
//!   is no central enum to extend
//!
//! ## Last Modified
//! v0.1.0 - Initial RPC layer

pub mod context;
pub mod dispatcher;
pub mod methods;

pub use context::{MethodContext, ServiceContext};
pub use dispatcher::{Dispatcher, MethodRegistry, ParamKind, ParamSpec, Precondition, RpcMethod};
