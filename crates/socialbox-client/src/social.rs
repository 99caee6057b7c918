// ============================================
// File: crates/socialbox-client/src/social.rs
// ============================================
//! # Social Client
//!
//! Typed wrappers over the standard method set. Each wrapper builds the
//! parameter map, calls through [`RpcClient`], and decodes the result.
//!
//! Passwords never leave the client in clear text: authentication sends the
//! SHA-512 hex digest, and setting a password sends an Argon2id hash of that
//! digest.

use std::ops::Deref;

use serde_json::{json, Map, Value};

use socialbox_core::crypto::password::{hash_password, sha512_hex};
use socialbox_core::protocol::{CaptchaChallenge, PeerView, SessionState};
use socialbox_core::PeerAddress;

use crate::client::RpcClient;
use crate::error::Result;

/// Standard method names.
pub mod methods {
    /// `ping`
    pub const PING: &str = "ping";
    /// `getSessionState`
    pub const GET_SESSION_STATE: &str = "getSessionState";
    /// `getAllowedMethods`
    pub const GET_ALLOWED_METHODS: &str = "getAllowedMethods";
    /// `acceptPrivacyPolicy`
    pub const ACCEPT_PRIVACY_POLICY: &str = "acceptPrivacyPolicy";
    /// `acceptTermsOfService`
    pub const ACCEPT_TERMS_OF_SERVICE: &str = "acceptTermsOfService";
    /// `acceptCommunityGuidelines`
    pub const ACCEPT_COMMUNITY_GUIDELINES: &str = "acceptCommunityGuidelines";
    /// `verificationGetImageCaptcha`
    pub const VERIFICATION_GET_IMAGE_CAPTCHA: &str = "verificationGetImageCaptcha";
    /// `verificationAnswerImageCaptcha`
    pub const VERIFICATION_ANSWER_IMAGE_CAPTCHA: &str = "verificationAnswerImageCaptcha";
    /// `verificationPasswordAuthentication`
    pub const VERIFICATION_PASSWORD_AUTHENTICATION: &str = "verificationPasswordAuthentication";
    /// `settingsSetPassword`
    pub const SETTINGS_SET_PASSWORD: &str = "settingsSetPassword";
    /// `settingsSetDisplayName`
    pub const SETTINGS_SET_DISPLAY_NAME: &str = "settingsSetDisplayName";
    /// `settingsSetDisplayPicture`
    pub const SETTINGS_SET_DISPLAY_PICTURE: &str = "settingsSetDisplayPicture";
    /// `settingsDeleteDisplayPicture`
    pub const SETTINGS_DELETE_DISPLAY_PICTURE: &str = "settingsDeleteDisplayPicture";
    /// `resolvePeer`
    pub const RESOLVE_PEER: &str = "resolvePeer";
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// High-level client for the standard Socialbox methods.
#[derive(Debug)]
pub struct SocialClient {
    rpc: RpcClient,
}

impl SocialClient {
    /// Wraps an RPC client.
    #[must_use]
    pub const fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    /// Returns the underlying RPC client.
    #[must_use]
    pub const fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Calls `ping`.
    ///
    /// # Errors
    /// Returns the server or transport failure.
    pub async fn ping(&self) -> Result<bool> {
        self.rpc.call_as(methods::PING, Map::new()).await
    }

    /// Returns the server's view of this session.
    ///
    /// # Errors
    /// Returns the server or transport failure.
    pub async fn get_session_state(&self) -> Result<SessionState> {
        self.rpc.call_as(methods::GET_SESSION_STATE, Map::new()).await
    }

    /// Returns the methods this session may call right now.
    ///
    /// # Errors
    /// Returns the server or transport failure.
    pub async fn get_allowed_methods(&self) -> Result<Vec<String>> {
        self.rpc.call_as(methods::GET_ALLOWED_METHODS, Map::new()).await
    }

    /// Accepts the privacy policy.
    ///
    /// # Errors
    /// Returns the server or transport failure.
    pub async fn accept_privacy_policy(&self) -> Result<bool> {
        self.rpc.call_as(methods::ACCEPT_PRIVACY_POLICY, Map::new()).await
    }

    /// Accepts the terms of service.
    ///
    /// # Errors
    /// Returns the server or transport failure.
    pub async fn accept_terms_of_service(&self) -> Result<bool> {
        self.rpc.call_as(methods::ACCEPT_TERMS_OF_SERVICE, Map::new()).await
    }

    /// Accepts the community guidelines.
    ///
    /// # Errors
    /// Returns the server or transport failure.
    pub async fn accept_community_guidelines(&self) -> Result<bool> {
        self.rpc
            .call_as(methods::ACCEPT_COMMUNITY_GUIDELINES, Map::new())
            .await
    }

    /// Requests an image captcha.
    ///
    /// # Errors
    /// Returns the server or transport failure.
    pub async fn verification_get_image_captcha(&self) -> Result<CaptchaChallenge> {
        self.rpc
            .call_as(methods::VERIFICATION_GET_IMAGE_CAPTCHA, Map::new())
            .await
    }

    /// Answers the outstanding captcha; `false` means wrong answer.
    ///
    /// # Errors
    /// Returns `CAPTCHA_NOT_AVAILABLE` or `CAPTCHA_EXPIRED` from the server.
    pub async fn verification_answer_image_captcha(&self, answer: &str) -> Result<bool> {
        self.rpc
            .call_as(
                methods::VERIFICATION_ANSWER_IMAGE_CAPTCHA,
                params(json!({ "answer": answer })),
            )
            .await
    }

    /// Authenticates with a clear-text password.
    ///
    /// # Errors
    /// Returns the server or transport failure.
    pub async fn verification_password_authentication(&self, password: &str) -> Result<bool> {
        self.rpc
            .call_as(
                methods::VERIFICATION_PASSWORD_AUTHENTICATION,
                params(json!({ "password": sha512_hex(password) })),
            )
            .await
    }

    /// Sets the account password from clear text.
    ///
    /// # Errors
    /// Returns the hashing, server or transport failure.
    pub async fn settings_set_password(&self, password: &str) -> Result<bool> {
        let hash = hash_password(&sha512_hex(password))?;
        self.rpc
            .call_as(
                methods::SETTINGS_SET_PASSWORD,
                params(json!({ "password": hash })),
            )
            .await
    }

    /// Sets the display name.
    ///
    /// # Errors
    /// Returns the server or transport failure.
    pub async fn settings_set_display_name(&self, name: &str) -> Result<bool> {
        self.rpc
            .call_as(
                methods::SETTINGS_SET_DISPLAY_NAME,
                params(json!({ "name": name })),
            )
            .await
    }

    /// Sets the display picture from base64 image data.
    ///
    /// # Errors
    /// Returns the server or transport failure.
    pub async fn settings_set_display_picture(&self, picture: &str) -> Result<bool> {
        self.rpc
            .call_as(
                methods::SETTINGS_SET_DISPLAY_PICTURE,
                params(json!({ "picture": picture })),
            )
            .await
    }

    /// Removes the display picture.
    ///
    /// # Errors
    /// Returns `FORBIDDEN` if the server requires one.
    pub async fn settings_delete_display_picture(&self) -> Result<bool> {
        self.rpc
            .call_as(methods::SETTINGS_DELETE_DISPLAY_PICTURE, Map::new())
            .await
    }

    /// Looks up a peer, local or on another server.
    ///
    /// # Errors
    /// Returns `NOT_FOUND` or `RESOLUTION_FAILED` from the server.
    pub async fn resolve_peer(&self, peer: &PeerAddress) -> Result<PeerView> {
        self.rpc
            .call_as(
                methods::RESOLVE_PEER,
                params(json!({ "peer": peer.to_string() })),
            )
            .await
    }
}

impl Deref for SocialClient {
    type Target = RpcClient;

    fn deref(&self) -> &RpcClient {
        &self.rpc
    }
}

impl From<RpcClient> for SocialClient {
    fn from(rpc: RpcClient) -> Self {
        Self::new(rpc)
    }
}
