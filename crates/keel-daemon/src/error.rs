//! Error types for keeld

use keel_controller::RegistryError;
use keel_deployment::ContentError;
use std::path::PathBuf;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Extension registration failed
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Content directory could not be read
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Boot file could not be read or parsed
    #[error("Invalid boot file {path}: {message}")]
    BootFile { path: PathBuf, message: String },

    /// A boot operation failed
    #[error("Boot operation {index} ({operation} at {address}) failed: {message}")]
    Boot {
        index: usize,
        operation: String,
        address: String,
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
