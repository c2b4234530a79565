//! The operation handler contract

use crate::attributes::AttributeDefinition;
use crate::context::OperationContext;
use crate::error::Result;
use keel_types::{ModelValue, Operation};
use serde::{Deserialize, Serialize};

/// Executes one named operation against the resource its address denotes
///
/// Handlers are explicitly constructed values bound to an
/// `(address pattern, operation name)` pair in an
/// [`OperationRegistry`](crate::OperationRegistry). A mutating handler must
/// return, on success, the operation that undoes what it did.
pub trait OperationHandler: Send + Sync {
    fn execute(&self, ctx: &mut OperationContext<'_>, operation: &Operation)
        -> Result<HandlerOutcome>;

    /// Schema of the operation; descriptions are informational only
    fn describe(&self) -> OperationDescription {
        OperationDescription::default()
    }
}

/// What a handler returns on success
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutcome {
    pub value: Option<ModelValue>,
    pub compensating: Option<Operation>,
}

impl HandlerOutcome {
    /// Success with neither a value nor a compensation, the shape of a pure read
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn value(value: impl Into<ModelValue>) -> Self {
        Self {
            value: Some(value.into()),
            compensating: None,
        }
    }

    pub fn compensated_by(compensating: Operation) -> Self {
        Self {
            value: None,
            compensating: Some(compensating),
        }
    }

    pub fn with_value(mut self, value: impl Into<ModelValue>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Whether an operation shows up in `read-operation-names`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    #[default]
    Public,
    Private,
}

/// Registration flags for one operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFlags {
    /// Never mutates the model; runs under a shared subtree lock
    pub read_only: bool,

    /// Targets an address that does not exist yet
    pub creates_resource: bool,

    pub entry_type: EntryType,
}

impl OperationFlags {
    /// A mutating operation on an existing resource
    pub fn mutating() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// An add-type operation
    pub fn creates() -> Self {
        Self {
            creates_resource: true,
            ..Self::default()
        }
    }

    pub fn private(mut self) -> Self {
        self.entry_type = EntryType::Private;
        self
    }
}

/// Informational operation schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationDescription {
    pub operation: String,
    pub description: String,
    pub parameters: Vec<AttributeDefinition>,
}

impl OperationDescription {
    pub fn new(operation: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<AttributeDefinition>) -> Self {
        self.parameters = parameters;
        self
    }
}
