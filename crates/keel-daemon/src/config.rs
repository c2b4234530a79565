//! Configuration for keeld

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Management model configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Deployment configuration
    #[serde(default)]
    pub deployments: DeploymentsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Management model configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// JSON array of operations replayed at boot
    #[serde(default)]
    pub boot_file: Option<PathBuf>,

    /// Rewrite the boot file after every successful change
    #[serde(default)]
    pub persist: bool,
}

/// Deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentsConfig {
    /// Directory of exploded deployments
    #[serde(default)]
    pub content_dir: Option<PathBuf>,

    /// Deploy everything found in the content directory at boot
    #[serde(default = "default_true")]
    pub deploy_on_boot: bool,

    /// Server group content-directory deployments are added to
    #[serde(default = "default_server_group")]
    pub server_group: String,
}

impl Default for DeploymentsConfig {
    fn default() -> Self {
        Self {
            content_dir: None,
            deploy_on_boot: true,
            server_group: default_server_group(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_server_group() -> String {
    "main-server-group".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then the
    /// environment (`KEEL_MODEL__PERSIST=true`)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with KEEL_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("KEEL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.model.boot_file, None);
        assert!(!config.model.persist);
        assert!(config.deployments.deploy_on_boot);
        assert_eq!(config.deployments.server_group, "main-server-group");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[model]\nboot_file = \"/var/lib/keel/boot.json\"\npersist = true\n\n[deployments]\nserver_group = \"web\""
        )
        .unwrap();

        let config = DaemonConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.model.boot_file, Some(PathBuf::from("/var/lib/keel/boot.json")));
        assert!(config.model.persist);
        assert_eq!(config.deployments.server_group, "web");
        // Untouched sections keep their defaults
        assert!(config.deployments.deploy_on_boot);
        assert_eq!(config.logging.level, "info");
    }
}
