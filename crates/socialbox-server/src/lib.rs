// ============================================
// File: crates/socialbox-server/src/lib.rs
// ============================================
//! # Socialbox Server Library
//!
//! ## Creation Reason
//! Provides the server side of the Socialbox protocol: session handshake,
//! encrypted RPC dispatch, registration and authentication steps, and
//! server-to-server federation.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Server configuration management
//! - [`server`]: Main server orchestration
//! - [`services`]: Business logic services
//!   - [`services::session`]: Session management
//!   - [`services::handshake`]: INIT and DHE processing
//!   - [`services::captcha`]: Image captcha challenges
//!   - [`services::federation`]: Lookups against other servers
//! - [`rpc`]: Method contract, dispatcher and standard methods
//! - [`handlers`]: Frame entry point
//! - [`storage`]: Persistence port and in-memory adapter
//! - [`keys`]: Identity key file handling
//! - [`error`]: Server-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Socialbox Server                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Config    │────►│   Server    │────►│ RequestHandler  │    │
//! │  │  Manager    │     │ Orchestrator│     │                 │    │
//! │  └─────────────┘     └──────┬──────┘     └───┬─────────┬───┘    │
//! │                             │                │         │        │
//! │         ┌───────────────────┘                ▼         ▼        │
//! │         ▼                            ┌───────────┐ ┌──────────┐ │
//! │  ┌─────────────┐  ┌─────────────┐    │ Handshake │ │Dispatcher│ │
//! │  │  Session    │  │  Storage    │    │  Service  │ │ + methods│ │
//! │  │  Manager    │  │   (port)    │    └───────────┘ └──────────┘ │
//! │  └─────────────┘  └─────────────┘                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                     Transport Layer                             │
//! │  ┌─────────────────────┐     ┌──────────────────────────────┐   │
//! │  │   HTTP (axum)       │     │   Loopback (tests, embedding)│   │
//! │  └─────────────────────┘     └──────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Client → init → dhe → rpc(sealed) → Dispatcher → method → sealed reply
//! Server → resolve domain → host@ session on the remote server → resolvePeer
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Configuration changes require restart (no hot-reload)
//! - Sessions live in memory and in storage; a restart keeps the record
//!   but drops the key, so clients must run DHE again
//! - Internal error detail is hidden unless
//!   `security.display_internal_exceptions` is set
//!
//! ## Last Modified
//! v0.1.0 - Initial server library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod keys;
pub mod rpc;
pub mod server;
pub mod services;
pub mod storage;

// Re-export primary types
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use handlers::RequestHandler;
pub use rpc::{MethodContext, MethodRegistry, Precondition, RpcMethod};
pub use server::{Server, ServerBuilder};
pub use storage::{MemoryStorage, Storage, StorageError};
