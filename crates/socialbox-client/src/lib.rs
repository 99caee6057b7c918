// ============================================
// File: crates/socialbox-client/src/lib.rs
// ============================================
//! # Socialbox Client - Sessions and Federation Discovery
//!
//! ## Creation Reason
//! One crate serves both end-user clients and servers that talk to other
//! servers on behalf of their users. Both need the same two things: find
//! out where a domain's RPC endpoint is and which key to trust, then run an
//! encrypted session against it.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`discovery`]: `DiscoveryRecord` parsing and formatting
//! - [`lookup`]: `RecordLookup` trait and a static record table
//! - [`resolver`]: TTL-cached `FederationResolver` with mocks
//! - [`client`]: `RpcClient` handshake and sealed RPC batches
//! - [`social`]: `SocialClient` typed method wrappers
//! - [`error`]: client error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              socialbox-server                       │
//! │                    │                                │
//! │                    ▼                                │
//! │   socialbox-client  ◄── You are here                │
//! │                    │                                │
//! │                    ▼                                │
//! │   socialbox-transport / socialbox-core              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The trust key comes only from the discovery record or an explicit
//!   endpoint; never from the server's own `info` reply
//! - The resolver is shared; build it once and hand out `Arc`s
//!
//! ## Last Modified
//! v0.1.0 - Initial client implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod discovery;
pub mod error;
pub mod lookup;
pub mod resolver;
pub mod social;

// Re-export primary types
pub use client::{RpcClient, RpcClientBuilder};
pub use discovery::DiscoveryRecord;
pub use error::{ClientError, Result};
pub use lookup::{RecordLookup, StaticRecordLookup};
pub use resolver::{FederationResolver, DEFAULT_RESOLVER_TTL_SECS};
pub use social::SocialClient;
