// ============================================
// File: crates/socialbox-common/src/lib.rs
// ============================================
//! # Socialbox Common - Shared Foundations
//!
//! ## Creation Reason
//! Holds the identifier, time and error types every other Socialbox crate
//! builds on, so that a session id minted by the server means the same thing
//! to the client, the transport and the storage port.
//!
//! ## Main Functionality
//! - [`types`]: `SessionId` and `PeerId` (UUID based)
//! - [`time`]: wall-clock `Timestamp`, injectable [`time::Clock`], `AtomicInstant`
//! - [`error`]: `CommonError` and the crate `Result` alias
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                socialbox-server                     │
//! │                       │                             │
//! │                socialbox-client                     │
//! │          ┌────────────┴────────────┐                │
//! │          ▼                         ▼                │
//! │   socialbox-core          socialbox-transport       │
//! │          │                         │                │
//! │          └────────────┬────────────┘                │
//! │                       ▼                             │
//! │               socialbox-common  ◄── You are here    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Leaf crate: no internal dependencies, keep external ones minimal
//! - Identifiers cross the wire as hyphenated UUID strings; do not change
//!   the textual format without bumping the protocol version
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

pub use error::{CommonError, Result};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use types::{PeerId, SessionId};
