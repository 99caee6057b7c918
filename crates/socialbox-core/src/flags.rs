// ============================================
// File: crates/socialbox-core/src/flags.rs
// ============================================
//! # Session Flags
//!
//! ## Creation Reason
//! A session's outstanding flags drive progressive registration and
//! verification: each flag is a step the peer still has to complete, and
//! the dispatcher uses them to decide which methods are callable.
//!
//! ## Flag Groups
//! ```text
//! ┌──────────────────────────────┬───────────────────────────────────┐
//! │ Coarse markers               │ REGISTRATION_REQUIRED             │
//! │ (cleared by authentication)  │ AUTHENTICATION_REQUIRED           │
//! ├──────────────────────────────┼───────────────────────────────────┤
//! │ Registration steps (gating)  │ SET_*, VER_PRIVACY_POLICY,        │
//! │                              │ VER_TERMS_OF_SERVICE, captcha,    │
//! │                              │ contact verification ...          │
//! ├──────────────────────────────┼───────────────────────────────────┤
//! │ Authentication steps (gating)│ VER_PASSWORD, VER_OTP             │
//! ├──────────────────────────────┼───────────────────────────────────┤
//! │ Other                        │ RATE_LIMITED                      │
//! └──────────────────────────────┴───────────────────────────────────┘
//! ```
//! A flag set is *complete* when no gating flag remains. The coarse markers
//! are deliberately not gating: they are removed as part of
//! `set_authenticated`, which itself requires completeness.
//!
//! ## Last Modified
//! v0.1.0 - Initial flag definitions

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Ordered set of session flags.
pub type FlagSet = BTreeSet<SessionFlag>;

// ============================================
// SessionFlag
// ============================================

/// Outstanding step on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionFlag {
    /// The peer has not registered yet.
    RegistrationRequired,
    /// The peer is registered but has not authenticated.
    AuthenticationRequired,

    /// A password must be set.
    SetPassword,
    /// An OTP secret must be set.
    SetOtp,
    /// A display name must be set.
    SetDisplayName,
    /// A display picture must be set.
    SetDisplayPicture,
    /// An email address must be set.
    SetEmail,
    /// A phone number must be set.
    SetPhone,
    /// A birthday must be set.
    SetBirthday,

    /// The privacy policy must be accepted.
    VerPrivacyPolicy,
    /// The terms of service must be accepted.
    VerTermsOfService,
    /// The community guidelines must be accepted.
    VerCommunityGuidelines,
    /// The email address must be verified.
    VerEmail,
    /// The phone number must be verified by SMS.
    VerSms,
    /// The phone number must be verified by a call.
    VerPhoneCall,
    /// An image captcha must be solved.
    VerImageCaptcha,
    /// A text captcha must be solved.
    VerTextCaptcha,
    /// An external URL challenge must be completed.
    VerExternalUrl,

    /// The password must be presented.
    VerPassword,
    /// An OTP code must be presented.
    VerOtp,

    /// The session is rate limited.
    RateLimited,
}

impl SessionFlag {
    /// Every flag, in declaration order.
    pub const ALL: [Self; 21] = [
        Self::RegistrationRequired,
        Self::AuthenticationRequired,
        Self::SetPassword,
        Self::SetOtp,
        Self::SetDisplayName,
        Self::SetDisplayPicture,
        Self::SetEmail,
        Self::SetPhone,
        Self::SetBirthday,
        Self::VerPrivacyPolicy,
        Self::VerTermsOfService,
        Self::VerCommunityGuidelines,
        Self::VerEmail,
        Self::VerSms,
        Self::VerPhoneCall,
        Self::VerImageCaptcha,
        Self::VerTextCaptcha,
        Self::VerExternalUrl,
        Self::VerPassword,
        Self::VerOtp,
        Self::RateLimited,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RegistrationRequired => "REGISTRATION_REQUIRED",
            Self::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Self::SetPassword => "SET_PASSWORD",
            Self::SetOtp => "SET_OTP",
            Self::SetDisplayName => "SET_DISPLAY_NAME",
            Self::SetDisplayPicture => "SET_DISPLAY_PICTURE",
            Self::SetEmail => "SET_EMAIL",
            Self::SetPhone => "SET_PHONE",
            Self::SetBirthday => "SET_BIRTHDAY",
            Self::VerPrivacyPolicy => "VER_PRIVACY_POLICY",
            Self::VerTermsOfService => "VER_TERMS_OF_SERVICE",
            Self::VerCommunityGuidelines => "VER_COMMUNITY_GUIDELINES",
            Self::VerEmail => "VER_EMAIL",
            Self::VerSms => "VER_SMS",
            Self::VerPhoneCall => "VER_PHONE_CALL",
            Self::VerImageCaptcha => "VER_IMAGE_CAPTCHA",
            Self::VerTextCaptcha => "VER_TEXT_CAPTCHA",
            Self::VerExternalUrl => "VER_EXTERNAL_URL",
            Self::VerPassword => "VER_PASSWORD",
            Self::VerOtp => "VER_OTP",
            Self::RateLimited => "RATE_LIMITED",
        }
    }

    /// Returns `true` for one of the two coarse markers.
    #[must_use]
    pub const fn is_coarse(&self) -> bool {
        matches!(self, Self::RegistrationRequired | Self::AuthenticationRequired)
    }

    /// Returns `true` for a registration step.
    #[must_use]
    pub const fn is_registration(&self) -> bool {
        matches!(
            self,
            Self::SetPassword
                | Self::SetOtp
                | Self::SetDisplayName
                | Self::SetDisplayPicture
                | Self::SetEmail
                | Self::SetPhone
                | Self::SetBirthday
                | Self::VerPrivacyPolicy
                | Self::VerTermsOfService
                | Self::VerCommunityGuidelines
                | Self::VerEmail
                | Self::VerSms
                | Self::VerPhoneCall
                | Self::VerImageCaptcha
                | Self::VerTextCaptcha
                | Self::VerExternalUrl
        )
    }

    /// Returns `true` for an authentication step.
    #[must_use]
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::VerPassword | Self::VerOtp)
    }

    /// Returns `true` if the flag blocks completion.
    #[must_use]
    pub const fn is_gating(&self) -> bool {
        self.is_registration() || self.is_authentication()
    }
}

impl fmt::Display for SessionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionFlag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.as_str() == s)
            .ok_or_else(|| CoreError::UnknownFlag(s.to_string()))
    }
}

// ============================================
// Set predicates
// ============================================

/// Returns `true` iff no gating flag remains in `flags`.
///
/// # Example
/// ```
/// use socialbox_core::flags::{is_complete, FlagSet, SessionFlag};
///
/// let mut flags = FlagSet::from([SessionFlag::RegistrationRequired]);
/// assert!(is_complete(&flags));
/// flags.insert(SessionFlag::SetPassword);
/// assert!(!is_complete(&flags));
/// ```
#[must_use]
pub fn is_complete(flags: &FlagSet) -> bool {
    !flags.iter().any(SessionFlag::is_gating)
}

// ============================================
// Tests
// ============================================
