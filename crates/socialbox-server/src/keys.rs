// ============================================
// File: crates/socialbox-server/src/keys.rs
// ============================================
//! # Server Key File
//!
//! The server identity key signs every DHE reply and is what remote
//! servers pin through the discovery record. It lives in a small JSON file:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "key_type": "ed25519",
//!   "public_key": "sig:...",
//!   "private_key": "<base64>",
//!   "created_at": 1700000000
//! }
//! ```
//!
//! The file is written with mode 0600 on Unix.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;

use socialbox_common::Timestamp;
use socialbox_core::IdentityKeyPair;

use crate::error::{Result, ServerError};

const KEY_FILE_VERSION: &str = "1.0";
const KEY_TYPE: &str = "ed25519";

#[derive(Serialize, Deserialize)]
struct KeyFile {
    version: String,
    key_type: String,
    public_key: String,
    private_key: String,
    created_at: Timestamp,
}

/// Loads the server identity from `path`.
///
/// # Errors
/// Returns `KeyFile` if the file is missing, unreadable, of another key
/// type, or holds a malformed key.
pub async fn load_identity(path: impl AsRef<Path>) -> Result<IdentityKeyPair> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ServerError::key_file(&shown, e.to_string()))?;
    let file: KeyFile =
        serde_json::from_str(&content).map_err(|e| ServerError::key_file(&shown, e.to_string()))?;

    if file.key_type != KEY_TYPE {
        return Err(ServerError::key_file(
            &shown,
            format!("unsupported key type '{}'", file.key_type),
        ));
    }

    let private = STANDARD
        .decode(file.private_key.as_bytes())
        .map_err(|e| ServerError::key_file(&shown, e.to_string()))?;
    IdentityKeyPair::from_bytes(&private).map_err(|e| ServerError::key_file(&shown, e.to_string()))
}

/// Writes `identity` to `path`, creating parent directories.
///
/// # Errors
/// Returns `KeyFile` if the file cannot be written.
pub async fn save_identity(identity: &IdentityKeyPair, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    let io_err = |e: std::io::Error| ServerError::key_file(&shown, e.to_string());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let file = KeyFile {
        version: KEY_FILE_VERSION.to_string(),
        key_type: KEY_TYPE.to_string(),
        public_key: identity.public_key().to_record_key(),
        private_key: STANDARD.encode(identity.to_bytes()),
        created_at: Timestamp::now(),
    };
    let content = serde_json::to_string_pretty(&file)
        .map_err(|e| ServerError::key_file(&shown, e.to_string()))?;
    tokio::fs::write(path, content).await.map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(path).await.map_err(io_err)?.permissions();
        perms.set_mode(0o600);
        tokio::fs::set_permissions(path, perms).await.map_err(io_err)?;
    }

    info!(path = %shown, "Server key written");
    Ok(())
}

/// Loads the identity at `path`, generating and saving one if absent.
///
/// # Errors
/// Returns `KeyFile` if an existing file is invalid or a new one cannot be
/// written.
pub async fn load_or_generate(path: impl AsRef<Path>) -> Result<IdentityKeyPair> {
    let path = path.as_ref();
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return load_identity(path).await;
    }
    let identity = IdentityKeyPair::generate();
    save_identity(&identity, path).await?;
    Ok(identity)
}

// ============================================
// Tests
// ============================================
