// ============================================
// File: crates/socialbox-transport/src/lib.rs
// ============================================
//! # Socialbox Transport - Frame I/O Layer
//!
//! ## Creation Reason
//! Provides the request/response frame abstraction used between Socialbox
//! clients and servers, with an HTTP binding for production and an
//! in-process binding for tests.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`frame`]: `RequestFrame` / `ResponseFrame` and header names
//! - [`traits`]: `Transport`, `FrameHandler`, `Connector`
//! - [`http`]: `reqwest` client transport and `axum` server binding
//! - [`loopback`]: in-process transports
//! - [`error`]: transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              socialbox-server                       │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │   socialbox-client ──► socialbox-transport          │
//! │                        You are here ◄──             │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │      socialbox-core / socialbox-common              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! RpcClient ──► Transport::exchange(RequestFrame)
//!                   │  HTTP POST or in-process call
//!                   ▼
//!              FrameHandler::handle ──► ResponseFrame
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always use traits for testability
//! - The frame layer never looks inside bodies; encryption happens above
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod frame;
pub mod http;
pub mod loopback;
pub mod traits;

// Re-export primary types
pub use error::{Result, TransportError};
pub use frame::{RequestFrame, ResponseFrame, REQUEST_TYPE_HEADER, SESSION_HEADER};
pub use http::{HttpConnector, HttpTransport};
pub use loopback::{LoopbackNetwork, LoopbackTransport};
pub use traits::{Connector, FrameHandler, Transport};

pub use reqwest::Url;
