// ============================================
// File: crates/socialbox-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the Socialbox server from a TOML
//! file, with defaults for every optional value.
//!
//! ## Main Functionality
//! - `ServerConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Per-section validation
//! - Registration policy → initial session flags
//!
//! ## Configuration Sections
//! - `server`: domain, name, listen address, public RPC endpoint
//! - `security`: internal error display, key file
//! - `registration`: which steps a new peer must complete
//! - `session`: expiry and cleanup
//! - `federation`: resolver cache and static discovery records
//! - `limits`: request, picture and batch sizes
//! - `logging`: level and output format
//!
//! ## Example Configuration
//! ```toml
//! [server]
//! domain = "coffee.com"
//! name = "Coffee"
//! listen_addr = "0.0.0.0:8086"
//! rpc_endpoint = "https://rpc.coffee.com/"
//!
//! [security]
//! display_internal_exceptions = false
//! key_file = "/etc/socialbox/server_key.json"
//!
//! [registration]
//! privacy_policy_required = true
//! image_captcha_required = true
//!
//! [federation.records]
//! "teapot.com" = "v=socialbox;sb-rpc=https://rpc.teapot.com/;sb-key=sig:...;sb-exp=0"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require server restart
//! - Validate config before server startup
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use socialbox_client::{DiscoveryRecord, StaticRecordLookup};
use socialbox_core::address::validate_domain;
use socialbox_core::{FlagSet, SessionFlag};
use socialbox_transport::Url;

use crate::error::{Result, ServerError};

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Identity and network configuration.
    #[serde(default)]
    pub server: ServerSection,

    /// Security configuration.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Registration policy.
    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Session lifetime configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Federation configuration.
    #[serde(default)]
    pub federation: FederationConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!(path = %path_str, "Loading configuration");

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!(domain = %config.server.domain, "Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the text cannot be parsed or validated.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.session.validate()?;
        self.federation.validate()?;
        self.limits.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

// ============================================
// ServerSection
// ============================================

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Domain this server is authoritative for.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Human readable server name.
    #[serde(default = "default_name")]
    pub name: String,

    /// HTTP listen address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Public RPC endpoint advertised in the discovery record.
    #[serde(default)]
    pub rpc_endpoint: Option<String>,
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_name() -> String {
    "Socialbox".to_string()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8086))
}

impl ServerSection {
    fn validate(&self) -> Result<()> {
        validate_domain(&self.domain)
            .map_err(|reason| ServerError::config_invalid("server.domain", reason))?;

        if self.name.trim().is_empty() {
            return Err(ServerError::config_invalid("server.name", "cannot be empty"));
        }

        if self.listen_addr.port() == 0 {
            return Err(ServerError::config_invalid(
                "server.listen_addr",
                "port cannot be 0",
            ));
        }

        self.rpc_endpoint_url()?;
        Ok(())
    }

    /// Returns the advertised endpoint, defaulting to the listen address.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if `rpc_endpoint` is not an http(s) URL.
    pub fn rpc_endpoint_url(&self) -> Result<Url> {
        let text = self
            .rpc_endpoint
            .clone()
            .unwrap_or_else(|| format!("http://{}/", self.listen_addr));
        let url = Url::parse(&text)
            .map_err(|e| ServerError::config_invalid("server.rpc_endpoint", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ServerError::config_invalid(
                "server.rpc_endpoint",
                "must be an http or https URL",
            ));
        }
        Ok(url)
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            name: default_name(),
            listen_addr: default_listen_addr(),
            rpc_endpoint: None,
        }
    }
}

// ============================================
// SecurityConfig
// ============================================

/// `[security]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Include internal error detail in RPC errors.
    #[serde(default)]
    pub display_internal_exceptions: bool,

    /// Path to the server identity key file.
    #[serde(default = "default_key_file")]
    pub key_file: String,
}

fn default_key_file() -> String {
    "/etc/socialbox/server_key.json".to_string()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            display_internal_exceptions: false,
            key_file: default_key_file(),
        }
    }
}

// ============================================
// RegistrationConfig
// ============================================

/// `[registration]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct RegistrationConfig {
    /// New peers must set a password.
    #[serde(default = "default_true")]
    pub password_required: bool,

    /// New peers must set a display name.
    #[serde(default = "default_true")]
    pub display_name_required: bool,

    /// New peers must set a display picture, and may not delete it.
    #[serde(default)]
    pub display_picture_required: bool,

    /// New peers must accept the privacy policy.
    #[serde(default)]
    pub privacy_policy_required: bool,

    /// New peers must accept the terms of service.
    #[serde(default)]
    pub terms_of_service_required: bool,

    /// New peers must accept the community guidelines.
    #[serde(default)]
    pub community_guidelines_required: bool,

    /// New peers must solve an image captcha.
    #[serde(default)]
    pub image_captcha_required: bool,
}

const fn default_true() -> bool {
    true
}

impl RegistrationConfig {
    /// Returns the registration steps a new peer starts with.
    #[must_use]
    pub fn registration_flags(&self) -> FlagSet {
        [
            (self.password_required, SessionFlag::SetPassword),
            (self.display_name_required, SessionFlag::SetDisplayName),
            (self.display_picture_required, SessionFlag::SetDisplayPicture),
            (self.privacy_policy_required, SessionFlag::VerPrivacyPolicy),
            (self.terms_of_service_required, SessionFlag::VerTermsOfService),
            (
                self.community_guidelines_required,
                SessionFlag::VerCommunityGuidelines,
            ),
            (self.image_captcha_required, SessionFlag::VerImageCaptcha),
        ]
        .into_iter()
        .filter_map(|(required, flag)| required.then_some(flag))
        .collect()
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            password_required: true,
            display_name_required: true,
            display_picture_required: false,
            privacy_policy_required: false,
            terms_of_service_required: false,
            community_guidelines_required: false,
            image_captcha_required: false,
        }
    }
}

// ============================================
// SessionConfig
// ============================================

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session expires.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Interval of the expiry sweep.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Maximum live sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

const fn default_session_ttl() -> u64 {
    3600
}

const fn default_cleanup_interval() -> u64 {
    60
}

const fn default_max_sessions() -> usize {
    10_000
}

impl SessionConfig {
    fn validate(&self) -> Result<()> {
        if self.ttl_secs == 0 {
            return Err(ServerError::config_invalid(
                "session.ttl_secs",
                "must be greater than 0",
            ));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ServerError::config_invalid(
                "session.cleanup_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.max_sessions == 0 {
            return Err(ServerError::config_invalid(
                "session.max_sessions",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            cleanup_interval_secs: default_cleanup_interval(),
            max_sessions: default_max_sessions(),
        }
    }
}

// ============================================
// FederationConfig
// ============================================

/// `[federation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Discovery record cache lifetime.
    #[serde(default = "default_resolver_ttl")]
    pub resolver_ttl_secs: u64,

    /// Static discovery records, domain → record text.
    #[serde(default)]
    pub records: BTreeMap<String, String>,
}

const fn default_resolver_ttl() -> u64 {
    socialbox_client::DEFAULT_RESOLVER_TTL_SECS
}

impl FederationConfig {
    fn validate(&self) -> Result<()> {
        for (domain, record) in &self.records {
            validate_domain(domain).map_err(|reason| {
                ServerError::config_invalid(format!("federation.records.{domain}"), reason)
            })?;
            DiscoveryRecord::parse(record).map_err(|e| {
                ServerError::config_invalid(format!("federation.records.{domain}"), e.to_string())
            })?;
        }
        Ok(())
    }

    /// Builds the record table backing the resolver.
    #[must_use]
    pub fn record_lookup(&self) -> StaticRecordLookup {
        StaticRecordLookup::from_records(self.records.clone())
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            resolver_ttl_secs: default_resolver_ttl(),
            records: BTreeMap::new(),
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// `[limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum request body size.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,

    /// Maximum display picture size (base64 text).
    #[serde(default = "default_max_display_picture_bytes")]
    pub max_display_picture_bytes: usize,

    /// Maximum requests in one RPC batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

const fn default_max_request_bytes() -> usize {
    4 * 1024 * 1024
}

const fn default_max_display_picture_bytes() -> usize {
    1024 * 1024
}

const fn default_max_batch_size() -> usize {
    32
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(ServerError::config_invalid(
                "limits.max_batch_size",
                "must be greater than 0",
            ));
        }
        if self.max_display_picture_bytes >= self.max_request_bytes {
            return Err(ServerError::config_invalid(
                "limits.max_display_picture_bytes",
                "must be smaller than limits.max_request_bytes",
            ));
        }
        Ok(())
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: default_max_request_bytes(),
            max_display_picture_bytes: default_max_display_picture_bytes(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use socialbox_core::IdentityKeyPair;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.security.display_internal_exceptions);
        assert_eq!(config.session.ttl_secs, 3600);
        assert_eq!(
            config.registration.registration_flags(),
            FlagSet::from([SessionFlag::SetPassword, SessionFlag::SetDisplayName])
        );
    }

    #[test]
    fn test_full_config_format() {
        let key = IdentityKeyPair::generate().public_key().to_record_key();
        let toml = format!(
            r#"
            [server]
            domain = "coffee.com"
            name = "Coffee"
            listen_addr = "127.0.0.1:8086"
            rpc_endpoint = "https://rpc.coffee.com/"

            [security]
            display_internal_exceptions = true

            [registration]
            image_captcha_required = true
            privacy_policy_required = true
            display_name_required = false

            [session]
            ttl_secs = 600

            [federation]
            resolver_ttl_secs = 60

            [federation.records]
            "teapot.com" = "v=socialbox;sb-rpc=https://rpc.teapot.com/;sb-key={key};sb-exp=0"

            [logging]
            level = "debug"
            json = true
        "#
        );

        let config = ServerConfig::from_str(&toml).unwrap();
        assert_eq!(config.server.domain, "coffee.com");
        assert_eq!(
            config.server.rpc_endpoint_url().unwrap().as_str(),
            "https://rpc.coffee.com/"
        );
        assert!(config.security.display_internal_exceptions);
        assert_eq!(config.session.ttl_secs, 600);
        assert_eq!(config.federation.records.len(), 1);
        assert!(config.logging.json);

        let flags = config.registration.registration_flags();
        assert!(flags.contains(&SessionFlag::VerImageCaptcha));
        assert!(flags.contains(&SessionFlag::VerPrivacyPolicy));
        assert!(!flags.contains(&SessionFlag::SetDisplayName));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            "[server]\ndomain = \"not a domain\"",
            "[server]\nrpc_endpoint = \"ftp://rpc.example/\"",
            "[session]\nttl_secs = 0",
            "[limits]\nmax_batch_size = 0",
            "[federation.records]\n\"teapot.com\" = \"v=socialbox\"",
        ];
        for toml in cases {
            let err = ServerConfig::from_str(toml).unwrap_err();
            assert!(err.is_config_error(), "{toml}: {err}");
        }
    }

    #[test]
    fn test_default_endpoint_follows_listen_addr() {
        let config = ServerConfig::from_str("[server]\nlisten_addr = \"127.0.0.1:9000\"").unwrap();
        assert_eq!(
            config.server.rpc_endpoint_url().unwrap().as_str(),
            "http://127.0.0.1:9000/"
        );
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        tokio::fs::write(&path, "[server]\ndomain = \"coffee.com\"\n")
            .await
            .unwrap();

        let config = ServerConfig::load(&path).await.unwrap();
        assert_eq!(config.server.domain, "coffee.com");

        let missing = ServerConfig::load(dir.path().join("missing.toml")).await;
        assert!(matches!(missing, Err(ServerError::ConfigLoad { .. })));
    }
}
