// ============================================
// File: crates/socialbox-core/src/protocol/version.rs
// ============================================
//! # Protocol Versioning
//!
//! ## Version History
//! | Version | Description |
//! |---------|-------------|
//! | 1       | Initial protocol: signed init, signed DHE, XChaCha RPC |
//!
//! ## ⚠️ Important Note for Next Developer
//! - `RECORD_VERSION` is the literal `v=` value of discovery records and is
//!   not a number; records with any other value are rejected
//!
//! ## Last Modified
//! v0.1.0 - Initial version definitions

/// Current protocol version advertised by `info`.
pub const PROTOCOL_VERSION: u8 = 1;

/// Expected `v` field of a discovery record.
pub const RECORD_VERSION: &str = "socialbox";
