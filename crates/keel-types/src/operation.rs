//! Operation requests and their outcomes
//!
//! Operations are the only way the model changes. An [`OperationOutcome`]
//! either succeeds, optionally carrying a return value and the compensating
//! operation that undoes it, or fails with a human-readable message.

use crate::address::PathAddress;
use crate::names;
use crate::value::ModelValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An immutable, addressed management request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation name, e.g. `add`
    pub name: String,

    /// Target resource
    pub address: PathAddress,

    /// Named parameters
    #[serde(default)]
    pub params: BTreeMap<String, ModelValue>,
}

impl Operation {
    pub fn new(name: impl Into<String>, address: PathAddress) -> Self {
        Self {
            name: name.into(),
            address,
            params: BTreeMap::new(),
        }
    }

    /// `add` at the given address with no parameters
    pub fn add(address: PathAddress) -> Self {
        Self::new(names::ADD, address)
    }

    /// `remove` at the given address
    pub fn remove(address: PathAddress) -> Self {
        Self::new(names::REMOVE, address)
    }

    /// `write-attribute` of `name` to `value`; an undefined value clears the attribute
    pub fn write_attribute(
        address: PathAddress,
        name: impl Into<String>,
        value: impl Into<ModelValue>,
    ) -> Self {
        Self::new(names::WRITE_ATTRIBUTE, address)
            .with_param(names::NAME, name.into())
            .with_param(names::VALUE, value)
    }

    pub fn read_attribute(address: PathAddress, name: impl Into<String>) -> Self {
        Self::new(names::READ_ATTRIBUTE, address).with_param(names::NAME, name.into())
    }

    pub fn read_resource(address: PathAddress) -> Self {
        Self::new(names::READ_RESOURCE, address)
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ModelValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: BTreeMap<String, ModelValue>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn param(&self, name: &str) -> Option<&ModelValue> {
        self.params.get(name).filter(|v| v.is_defined())
    }

    /// String parameter lookup
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(ModelValue::as_str)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.name)
    }
}

/// Result of dispatching an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<ModelValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    compensating_operation: Option<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_message: Option<String>,
}

impl OperationOutcome {
    /// Successful outcome
    pub fn success(value: Option<ModelValue>, compensating: Option<Operation>) -> Self {
        Self {
            success: true,
            value,
            compensating_operation: compensating,
            failure_message: None,
        }
    }

    /// Failed outcome; never carries a value or a compensating operation
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            value: None,
            compensating_operation: None,
            failure_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn value(&self) -> Option<&ModelValue> {
        self.value.as_ref()
    }

    pub fn compensating_operation(&self) -> Option<&Operation> {
        self.compensating_operation.as_ref()
    }

    pub fn into_compensating_operation(self) -> Option<Operation> {
        self.compensating_operation
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.failure_message.as_deref()
    }

    /// View as a `Result` of the returned value
    pub fn into_result(self) -> Result<Option<ModelValue>, String> {
        if self.success {
            Ok(self.value)
        } else {
            Err(self.failure_message.unwrap_or_default())
        }
    }
}
