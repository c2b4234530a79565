//! Error types for the controller

use keel_model::ModelError;
use keel_types::PathAddress;
use thiserror::Error;

/// Errors raised by the operation registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("A handler for '{operation}' is already registered at {pattern}")]
    DuplicateHandler {
        pattern: PathAddress,
        operation: String,
    },

    #[error("No handler for operation '{operation}' at {address}")]
    UnknownOperation {
        address: PathAddress,
        operation: String,
    },

    #[error("Attribute '{attribute}' is already registered at {pattern}")]
    DuplicateAttribute {
        pattern: PathAddress,
        attribute: String,
    },

    #[error("Extension '{0}' is already loaded")]
    DuplicateExtension(String),

    #[error("Extension '{0}' is not loaded")]
    UnknownExtension(String),
}

/// Failures raised while executing an operation
///
/// These never cross the dispatch boundary: the dispatcher turns each of them
/// into a failed outcome carrying only the message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationFailure {
    #[error("Validation failed for {address}: {}", .violations.join("; "))]
    Validation {
        address: PathAddress,
        violations: Vec<String>,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Operation '{operation}' may not modify the model")]
    ReadOnly { operation: String },

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Failed(String),
}

/// Result type for handler execution
pub type Result<T> = std::result::Result<T, OperationFailure>;

impl OperationFailure {
    /// A validation failure with a single violation
    pub fn invalid(address: &PathAddress, violation: impl Into<String>) -> Self {
        Self::Validation {
            address: address.clone(),
            violations: vec![violation.into()],
        }
    }

    pub fn validation(address: &PathAddress, violations: Vec<String>) -> Self {
        Self::Validation {
            address: address.clone(),
            violations,
        }
    }
}
