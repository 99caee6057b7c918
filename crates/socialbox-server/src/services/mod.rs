// ============================================
// File: crates/socialbox-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! ## Creation Reason
//! Holds the stateful logic of the server, separated from request framing
//! and from the RPC method table.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`session`]: session state machine and lifecycle
//! - [`handshake`]: `init` / `dhe` processing
//! - [`captcha`]: captcha creation and answering
//! - [`federation`]: server-to-server peer resolution
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────────┐   ┌─────────────────────────────────┐ │
//! │  │ HandshakeService │   │      SessionManager             │ │
//! │  │                  │──►│  - Create/close sessions        │ │
//! │  │  - Verify INIT   │   │  - Flag state machine           │ │
//! │  │  - Key exchange  │   │  - Expiry                       │ │
//! │  └────────┬─────────┘   └──────────────┬──────────────────┘ │
//! │           │ resolve                    │ persist            │
//! │  ┌────────▼─────────┐   ┌──────────────▼──────────────────┐ │
//! │  │FederationService │   │      Storage (port)             │ │
//! │  │ - host@ sessions │   │  - sessions, peers, captchas    │ │
//! │  │   to remotes     │   └──────────────▲──────────────────┘ │
//! │  └──────────────────┘                  │                    │
//! │                          ┌─────────────┴──────────────────┐ │
//! │                          │      CaptchaService            │ │
//! │                          └────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Services receive their collaborators explicitly; there is no global
//!   storage handle
//! - Everything here is `Send + Sync` and shared through `Arc`
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod captcha;
pub mod federation;
pub mod handshake;
pub mod session;

pub use captcha::{AnswerOutcome, CaptchaRenderer, CaptchaService, GlyphRenderer};
pub use federation::FederationService;
pub use handshake::HandshakeService;
pub use session::{Session, SessionManager};
