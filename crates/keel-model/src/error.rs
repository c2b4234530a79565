//! Model error types

use keel_types::PathAddress;
use thiserror::Error;

/// Structural errors raised by the resource tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Resource not found: {0}")]
    NotFound(PathAddress),

    #[error("Duplicate resource: {0}")]
    DuplicateResource(PathAddress),

    #[error("Parent of {0} does not exist")]
    MissingParent(PathAddress),

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: PathAddress, reason: String },
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

impl ModelError {
    pub fn invalid_address(address: &PathAddress, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.clone(),
            reason: reason.into(),
        }
    }
}
