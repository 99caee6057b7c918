// ============================================
// File: crates/socialbox-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the two seams of the frame layer so that the client never
//! knows whether it talks HTTP or calls a server in-process, and the server
//! never knows which listener delivered a frame.
//!
//! ## Main Functionality
//! - `Transport`: client side, one request frame in, one response out
//! - `FrameHandler`: server side, implemented by the request handler
//! - `Connector`: turns an RPC endpoint into a `Transport`
//!
//! ## Design Philosophy
//! - Traits enable in-process implementations for testing
//! - Async-first design with `async_trait`
//! - Implementations must be `Send + Sync` and shareable behind `Arc`
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::Result;
use crate::frame::{RequestFrame, ResponseFrame};

// ============================================
// Transport Trait
// ============================================

/// Client side of a request/response exchange.
///
/// # Example
/// ```ignore
/// async fn ping<T: Transport>(transport: &T) -> Result<bool> {
///     let reply = transport
///         .exchange(RequestFrame::new(RequestType::Ping, Bytes::new()))
///         .await?;
///     Ok(reply.is_success())
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `frame` and waits for the matching response.
    ///
    /// # Errors
    /// Returns an error if the exchange could not be completed. A response
    /// with an error status is still `Ok`.
    async fn exchange(&self, frame: RequestFrame) -> Result<ResponseFrame>;

    /// Returns a human readable description of the peer endpoint.
    fn endpoint(&self) -> String;
}

// ============================================
// FrameHandler Trait
// ============================================

/// Server side of a request/response exchange.
///
/// Handlers never fail: every error becomes an error frame.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Handles one frame.
    async fn handle(&self, frame: RequestFrame) -> ResponseFrame;
}

// ============================================
// Connector Trait
// ============================================

/// Produces a [`Transport`] for an RPC endpoint.
pub trait Connector: Send + Sync {
    /// Returns a transport bound to `endpoint`.
    ///
    /// # Errors
    /// Returns `NoRoute` if nothing serves `endpoint`.
    fn connect(&self, endpoint: &Url) -> Result<Arc<dyn Transport>>;
}
