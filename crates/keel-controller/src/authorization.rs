//! Authorization seam
//!
//! Who may submit an operation is decided outside the core. The dispatcher
//! consults an [`OperationAuthorizer`] after the handler is found and before
//! it runs; a denial becomes a failed outcome.

use crate::context::RequestContext;
use keel_types::Operation;
use serde::{Deserialize, Serialize};

/// Outcome of an authorization check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationDecision {
    Allow,
    Deny { reason: String },
}

impl AuthorizationDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decides whether a caller may run an operation
pub trait OperationAuthorizer: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// `read_only` reflects the registration flags of the matched handler
    fn authorize(
        &self,
        operation: &Operation,
        request: &RequestContext,
        read_only: bool,
    ) -> AuthorizationDecision;
}

/// Permits everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAuthorizer;

impl OperationAuthorizer for AllowAllAuthorizer {
    fn name(&self) -> &str {
        "allow-all"
    }

    fn authorize(&self, _: &Operation, _: &RequestContext, _: bool) -> AuthorizationDecision {
        AuthorizationDecision::Allow
    }
}

/// Permits reads only, e.g. for a monitoring principal
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadOnlyAuthorizer;

impl OperationAuthorizer for ReadOnlyAuthorizer {
    fn name(&self) -> &str {
        "read-only"
    }

    fn authorize(
        &self,
        operation: &Operation,
        _request: &RequestContext,
        read_only: bool,
    ) -> AuthorizationDecision {
        if read_only {
            AuthorizationDecision::Allow
        } else {
            AuthorizationDecision::deny(format!(
                "'{}' modifies the model and only reads are permitted",
                operation.name
            ))
        }
    }
}
