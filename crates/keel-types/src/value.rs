//! Typed values held by resource attributes and operation parameters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A typed model value
///
/// Objects use a `BTreeMap` so that two structurally equal values always
/// render identically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelValue {
    /// No value
    #[default]
    Undefined,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<ModelValue>),
    Object(BTreeMap<String, ModelValue>),
}

/// The type of a model value, used by attribute definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Undefined,
    Bool,
    Int,
    Double,
    String,
    List,
    Object,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelType::Undefined => "undefined",
            ModelType::Bool => "bool",
            ModelType::Int => "int",
            ModelType::Double => "double",
            ModelType::String => "string",
            ModelType::List => "list",
            ModelType::Object => "object",
        };
        f.write_str(name)
    }
}

impl ModelValue {
    /// Create an empty object value
    pub fn object() -> Self {
        ModelValue::Object(BTreeMap::new())
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            ModelValue::Undefined => ModelType::Undefined,
            ModelValue::Bool(_) => ModelType::Bool,
            ModelValue::Int(_) => ModelType::Int,
            ModelValue::Double(_) => ModelType::Double,
            ModelValue::String(_) => ModelType::String,
            ModelValue::List(_) => ModelType::List,
            ModelValue::Object(_) => ModelType::Object,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, ModelValue::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ModelValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ModelValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ModelValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            ModelValue::Double(d) => Some(*d),
            ModelValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ModelValue]> {
        match self {
            ModelValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, ModelValue>> {
        match self {
            ModelValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key when this value is an object
    pub fn get(&self, key: &str) -> Option<&ModelValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Builder-style insert; turns an undefined value into an object first.
    ///
    /// Values of any other type are left untouched.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ModelValue>) -> Self {
        if let ModelValue::Undefined = self {
            self = ModelValue::object();
        }
        if let ModelValue::Object(ref mut map) = self {
            map.insert(key.into(), value.into());
        }
        self
    }
}

impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelValue::Undefined => f.write_str("undefined"),
            ModelValue::Bool(b) => write!(f, "{}", b),
            ModelValue::Int(i) => write!(f, "{}", i),
            ModelValue::Double(d) => write!(f, "{}", d),
            ModelValue::String(s) => write!(f, "\"{}\"", s),
            other => match serde_json::to_string(other) {
                Ok(json) => f.write_str(&json),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

impl From<bool> for ModelValue {
    fn from(value: bool) -> Self {
        ModelValue::Bool(value)
    }
}

impl From<i64> for ModelValue {
    fn from(value: i64) -> Self {
        ModelValue::Int(value)
    }
}

impl From<i32> for ModelValue {
    fn from(value: i32) -> Self {
        ModelValue::Int(value.into())
    }
}

impl From<u32> for ModelValue {
    fn from(value: u32) -> Self {
        ModelValue::Int(value.into())
    }
}

impl From<f64> for ModelValue {
    fn from(value: f64) -> Self {
        ModelValue::Double(value)
    }
}

impl From<&str> for ModelValue {
    fn from(value: &str) -> Self {
        ModelValue::String(value.to_string())
    }
}

impl From<String> for ModelValue {
    fn from(value: String) -> Self {
        ModelValue::String(value)
    }
}

impl From<Vec<ModelValue>> for ModelValue {
    fn from(value: Vec<ModelValue>) -> Self {
        ModelValue::List(value)
    }
}

impl From<BTreeMap<String, ModelValue>> for ModelValue {
    fn from(value: BTreeMap<String, ModelValue>) -> Self {
        ModelValue::Object(value)
    }
}

impl<T: Into<ModelValue>> From<Option<T>> for ModelValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}
