//! Keel daemon library
//!
//! This module provides the pieces `keeld` is assembled from:
//! - Layered configuration
//! - Boot file replay and persistence
//! - Daemon lifecycle: boot, deploy, shutdown

pub mod config;
pub mod daemon;
pub mod error;
pub mod persister;

pub use config::DaemonConfig;
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use persister::{load_boot_file, JsonFilePersister};
