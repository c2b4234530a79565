//! Attribute definitions and parameter validation
//!
//! Handlers declare the constraints on their parameters as a list of
//! [`AttributeDefinition`]s. Validation reports every violation at once so
//! the caller gets a single aggregated failure message.

use keel_types::{names, ModelType, ModelValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether an attribute may be changed with `write-attribute`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeAccess {
    ReadOnly,
    ReadWrite,
}

/// Declared constraints for one attribute or parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub model_type: ModelType,
    pub required: bool,
    pub default: Option<ModelValue>,
    pub allowed_values: Vec<ModelValue>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub description: String,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, model_type: ModelType) -> Self {
        Self {
            name: name.into(),
            model_type,
            required: false,
            default: None,
            allowed_values: Vec::new(),
            min: None,
            max: None,
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<ModelValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn allowed(mut self, values: Vec<ModelValue>) -> Self {
        self.allowed_values = values;
        self
    }

    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Violations for a single value; `None` and `Undefined` mean absent
    pub fn violations(&self, value: Option<&ModelValue>) -> Vec<String> {
        let value = match value.filter(|v| v.is_defined()) {
            Some(value) => value,
            None if self.required && self.default.is_none() => {
                return vec![format!("'{}' is required", self.name)];
            }
            None => return Vec::new(),
        };

        let mut violations = Vec::new();
        if !type_accepts(self.model_type, value) {
            violations.push(format!(
                "'{}' must be of type {} but was {}",
                self.name,
                self.model_type,
                value.model_type()
            ));
            return violations;
        }

        if !self.allowed_values.is_empty() && !self.allowed_values.contains(value) {
            let allowed: Vec<String> = self.allowed_values.iter().map(|v| v.to_string()).collect();
            violations.push(format!(
                "'{}' must be one of [{}] but was {}",
                self.name,
                allowed.join(", "),
                value
            ));
        }

        if let Some(n) = value.as_int() {
            if let Some(min) = self.min.filter(|min| n < *min) {
                violations.push(format!("'{}' must be at least {} but was {}", self.name, min, n));
            }
            if let Some(max) = self.max.filter(|max| n > *max) {
                violations.push(format!("'{}' must be at most {} but was {}", self.name, max, n));
            }
        }
        violations
    }
}

fn type_accepts(expected: ModelType, value: &ModelValue) -> bool {
    match (expected, value.model_type()) {
        (ModelType::Undefined, _) => true,
        (ModelType::Double, ModelType::Int) => true,
        (expected, actual) => expected == actual,
    }
}

/// Parameters that every add operation understands in addition to its own
const RESERVED_ADD_PARAMS: &[&str] = &[names::IMPLICIT, names::DESCENDANTS];

/// Validate `params` against `definitions`.
///
/// On success returns the resolved attribute map: supplied values plus the
/// defaults of absent attributes. Unknown parameters are violations unless
/// `allow_unknown` is set.
pub fn validate_parameters(
    definitions: &[AttributeDefinition],
    params: &BTreeMap<String, ModelValue>,
    allow_unknown: bool,
) -> std::result::Result<BTreeMap<String, ModelValue>, Vec<String>> {
    let mut violations = Vec::new();
    let mut resolved = BTreeMap::new();

    for definition in definitions {
        let supplied = params.get(&definition.name);
        violations.extend(definition.violations(supplied));
        match supplied.filter(|v| v.is_defined()) {
            Some(value) => {
                resolved.insert(definition.name.clone(), value.clone());
            }
            None => {
                if let Some(default) = &definition.default {
                    resolved.insert(definition.name.clone(), default.clone());
                }
            }
        }
    }

    for (name, value) in params {
        if RESERVED_ADD_PARAMS.contains(&name.as_str()) {
            continue;
        }
        if definitions.iter().any(|d| &d.name == name) {
            continue;
        }
        if allow_unknown {
            if value.is_defined() {
                resolved.insert(name.clone(), value.clone());
            }
        } else {
            violations.push(format!("'{}' is not a recognised parameter", name));
        }
    }

    if violations.is_empty() {
        Ok(resolved)
    } else {
        Err(violations)
    }
}
