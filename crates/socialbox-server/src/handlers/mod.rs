// ============================================
// File: crates/socialbox-server/src/handlers/mod.rs
// ============================================
//! # Frame Handlers
//!
//! ## Creation Reason
//! Bridges the transport layer and the services: turns a `RequestFrame`
//! into a `ResponseFrame`.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`request`]: request-type routing and the RPC encrypt/decrypt boundary
//!
//! ## Handler Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      RequestHandler                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ping ─► "pong"          info ─► ServerInformation          │
//! │  init ─► HandshakeService::initiate ─► {session_id}         │
//! │  dhe  ─► HandshakeService::exchange ─► {public_key, sig}    │
//! │  rpc  ─► open ─► Dispatcher::dispatch_batch ─► seal         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The handler is transport agnostic; HTTP and loopback share it
//! - Update session activity on every accepted RPC frame
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers structure

pub mod request;

pub use request::RequestHandler;
