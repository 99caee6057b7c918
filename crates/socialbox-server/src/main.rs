// ============================================
// File: crates/socialbox-server/src/main.rs
// ============================================
//! # Socialbox Server Entry Point
//!
//! ## Creation Reason
//! Main entry point for the Socialbox server binary.
//! Handles CLI parsing, logging setup, and server initialization.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading
//! - Identity key management
//! - Discovery record output
//! - Server execution
//!
//! ## Usage
//! ```bash
//! # Step 1: Create the identity key
//! socialbox-server keygen
//!
//! # Step 2: Publish the discovery record for your domain
//! socialbox-server record
//!
//! # Step 3: Start server
//! socialbox-server start
//!
//! # Other commands
//! socialbox-server validate          # Validate config file
//! socialbox-server pubkey            # Show the identity public key
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `start` generates a key when none exists; `keygen` refuses to
//!   overwrite one unless `--force` is given
//! - `RUST_LOG` overrides `logging.level`
//! - Use systemd for production deployments
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use socialbox_client::DiscoveryRecord;
use socialbox_common::Timestamp;
use socialbox_core::crypto::IdentityKeyPair;
use socialbox_server::config::LoggingConfig;
use socialbox_server::keys::{load_identity, load_or_generate, save_identity};
use socialbox_server::{Server, ServerConfig};

const DEFAULT_CONFIG_PATH: &str = "/etc/socialbox/server.toml";

// ============================================
// CLI Definition
// ============================================

/// Socialbox server
///
/// Quick Start:
///   1. Run: socialbox-server keygen
///   2. Publish the output of `socialbox-server record` for your domain
///   3. Run: socialbox-server start
#[derive(Parser, Debug)]
#[command(name = "socialbox-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Generate the server identity key
    Keygen {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Replace an existing key
        #[arg(long)]
        force: bool,
    },

    /// Show the identity public key
    Pubkey {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Output format: record or hex
        #[arg(long, default_value = "record")]
        format: String,
    },

    /// Print the discovery record to publish for the configured domain
    Record {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Key expiry as a Unix timestamp (0 = never)
        #[arg(long, default_value_t = 0)]
        expires: i64,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // `start` initializes logging itself, from the loaded config
    if !matches!(cli.command, Commands::Start { .. }) {
        init_logging(&LoggingConfig::default());
    }

    let result = match cli.command {
        Commands::Start { config } => cmd_start(config).await,
        Commands::Validate { config } => cmd_validate(config).await,
        Commands::Keygen { config, force } => cmd_keygen(config, force).await,
        Commands::Pubkey { config, format } => cmd_pubkey(config, format).await,
        Commands::Record { config, expires } => cmd_record(config, expires).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Runs the server until Ctrl+C.
async fn cmd_start(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_or_default_config(&config_path).await?;
    init_logging(&config.logging);

    let identity = load_or_generate(&config.security.key_file).await?;

    info!("════════════════════════════════════════");
    info!("Domain:     {}", config.server.domain);
    info!("Name:       {}", config.server.name);
    info!("Listen:     {}", config.server.listen_addr);
    info!("Public key: {}", identity.public_key().to_record_key());
    info!("════════════════════════════════════════");

    let server = Server::new(config, identity)?;
    server.run().await?;

    Ok(())
}

/// Loads and validates the configuration file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Server will use default values.");
        return Ok(());
    }

    let config = ServerConfig::load(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Server:");
    println!("   Domain:     {}", config.server.domain);
    println!("   Listen:     {}", config.server.listen_addr);
    println!("   Endpoint:   {}", config.server.rpc_endpoint_url()?);
    println!();
    println!("Registration steps:");
    let flags = config.registration.registration_flags();
    if flags.is_empty() {
        println!("   (none)");
    }
    for flag in &flags {
        println!("   {flag}");
    }
    println!();
    println!("Limits:");
    println!("   Max Sessions:     {}", config.session.max_sessions);
    println!("   Session TTL:      {}s", config.session.ttl_secs);
    println!("   Max Request:      {} bytes", config.limits.max_request_bytes);
    println!("   Max Batch:        {}", config.limits.max_batch_size);
    println!();

    Ok(())
}

/// Writes a fresh identity key.
async fn cmd_keygen(config_path: PathBuf, force: bool) -> anyhow::Result<()> {
    let config = load_or_default_config(&config_path).await?;
    let key_path = Path::new(&config.security.key_file);

    if key_path.exists() && !force {
        anyhow::bail!(
            "key file {} already exists; pass --force to replace it",
            key_path.display()
        );
    }

    let identity = IdentityKeyPair::generate();
    save_identity(&identity, key_path).await?;

    println!("✅ Identity key written to {}", key_path.display());
    println!("   Public key: {}", identity.public_key().to_record_key());
    Ok(())
}

/// Shows the identity public key.
async fn cmd_pubkey(config_path: PathBuf, format: String) -> anyhow::Result<()> {
    let identity = load_configured_identity(&config_path).await?;

    match format.as_str() {
        "hex" => println!("{}", hex::encode(identity.public_key().as_bytes())),
        "record" => println!("{}", identity.public_key().to_record_key()),
        other => anyhow::bail!("unknown format '{other}', expected record or hex"),
    }

    Ok(())
}

/// Prints the discovery record text.
async fn cmd_record(config_path: PathBuf, expires: i64) -> anyhow::Result<()> {
    let config = load_or_default_config(&config_path).await?;
    let identity = load_identity(&config.security.key_file).await?;

    let record = DiscoveryRecord::new(
        config.server.rpc_endpoint_url()?,
        identity.public_key(),
        (expires > 0).then(|| Timestamp::from_secs(expires)),
    );

    println!("{}", record.to_record_string());
    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(fmt::layer().json().with_target(true)).try_init().ok();
    } else {
        registry.with(fmt::layer().with_target(true)).try_init().ok();
    }
}

/// Loads the config file, or the defaults if it does not exist.
async fn load_or_default_config(path: &Path) -> anyhow::Result<ServerConfig> {
    if path.exists() {
        Ok(ServerConfig::load(path).await?)
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(ServerConfig::default())
    }
}

/// Loads the identity named by the configuration.
async fn load_configured_identity(config_path: &Path) -> anyhow::Result<IdentityKeyPair> {
    let config = load_or_default_config(config_path).await?;
    Ok(load_identity(&config.security.key_file).await?)
}
