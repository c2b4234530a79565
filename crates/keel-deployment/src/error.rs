//! Error types for the deployment layer

use crate::phase::Phase;
use thiserror::Error;

/// A processor's deploy or undeploy step failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProcessingError {
    pub message: String,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<MountError> for ProcessingError {
    fn from(e: MountError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<ContentError> for ProcessingError {
    fn from(e: ContentError) -> Self {
        Self::new(e.to_string())
    }
}

/// Closing an external resource failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to close '{path}': {message}")]
pub struct CleanupError {
    /// Deployment-relative path the handle was registered under
    pub path: String,
    pub message: String,
}

impl CleanupError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Archive mount errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    #[error("'{0}' is not an archive")]
    NotAnArchive(String),

    #[error("Failed to mount '{path}': {message}")]
    Failed { path: String, message: String },
}

/// Content repository errors
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("No content with hash {0}")]
    NotFound(String),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to hash content: {0}")]
    Hash(#[from] serde_json::Error),
}

/// Errors surfaced at the pipeline and service boundary
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("Deployment '{unit}' failed in phase {phase}: {message}")]
    ProcessingFailed {
        unit: String,
        phase: Phase,
        message: String,
    },

    #[error("Undeploy of '{unit}' completed with errors: {message}")]
    UndeployFailed { unit: String, message: String },

    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error("Deployment '{0}' is already deployed")]
    AlreadyDeployed(String),

    #[error("Deployment '{0}' is being processed")]
    InProgress(String),

    #[error("Deployment '{0}' is not deployed")]
    NotDeployed(String),

    #[error("Unknown deployment '{0}'")]
    UnknownDeployment(String),

    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Result type for deployment operations
pub type Result<T> = std::result::Result<T, DeploymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_failure_message() {
        let err = DeploymentError::ProcessingFailed {
            unit: "app.war".into(),
            phase: Phase::PARSE,
            message: "bad descriptor".into(),
        };
        assert_eq!(
            err.to_string(),
            "Deployment 'app.war' failed in phase PARSE(200): bad descriptor"
        );
    }
}
