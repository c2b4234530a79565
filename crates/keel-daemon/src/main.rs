//! Keel Daemon - management model host
//!
//! keeld provides:
//! - Boot of the management model from a persisted operation list
//! - Deployment of exploded content from a content directory
//! - Undeploy of everything on shutdown

use clap::Parser;
use keel_daemon::{Daemon, DaemonConfig, DaemonError, DaemonResult};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Keel Daemon CLI
#[derive(Parser)]
#[command(name = "keeld")]
#[command(about = "Keel Daemon - management model and deployment host", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "KEEL_CONFIG")]
    config: Option<String>,

    /// Boot file of persisted operations
    #[arg(short, long, env = "KEEL_BOOT_FILE")]
    boot_file: Option<PathBuf>,

    /// Directory of exploded deployments
    #[arg(long, env = "KEEL_CONTENT_DIR")]
    content_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "KEEL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "KEEL_LOG_JSON")]
    json: bool,

    /// Boot, print the model and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config =
        DaemonConfig::load(cli.config.as_deref()).map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(boot_file) = cli.boot_file {
        config.model.boot_file = Some(boot_file);
    }
    if let Some(content_dir) = cli.content_dir {
        config.deployments.content_dir = Some(content_dir);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        boot_file = ?config.model.boot_file,
        content_dir = ?config.deployments.content_dir,
        "Starting keeld"
    );

    let daemon = Daemon::new(config)?;
    daemon.run(cli.once).await
}
