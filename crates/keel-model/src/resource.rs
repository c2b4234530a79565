//! A single node of the configuration tree

use keel_types::{ModelValue, PathElement};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A configuration node: typed attributes plus child collections
///
/// Children are grouped by child type (`interface`, `host`, ...) and then by
/// name. Empty collections are never kept, so two resources built through
/// different add/remove histories compare equal when their content is equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    attributes: BTreeMap<String, ModelValue>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<String, BTreeMap<String, Resource>>,

    /// Materialized as a default by its parent rather than added explicitly
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    implicit: bool,
}

impl Resource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attributes(attributes: BTreeMap<String, ModelValue>) -> Self {
        let mut resource = Self::new();
        for (name, value) in attributes {
            resource.set_attribute(name, value);
        }
        resource
    }

    /// A resource created as a default rather than by an explicit add
    pub fn implicit_default(attributes: BTreeMap<String, ModelValue>) -> Self {
        let mut resource = Self::with_attributes(attributes);
        resource.implicit = true;
        resource
    }

    pub fn attributes(&self) -> &BTreeMap<String, ModelValue> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&ModelValue> {
        self.attributes.get(name)
    }

    /// Set an attribute and return the prior value.
    ///
    /// Writing `Undefined` removes the attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: ModelValue) -> ModelValue {
        let name = name.into();
        let previous = if value.is_defined() {
            self.attributes.insert(name, value)
        } else {
            self.attributes.remove(&name)
        };
        previous.unwrap_or_default()
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<ModelValue> {
        self.attributes.remove(name)
    }

    /// Swap the whole attribute map, keeping children
    pub fn replace_attributes(
        &mut self,
        attributes: BTreeMap<String, ModelValue>,
    ) -> BTreeMap<String, ModelValue> {
        let previous = std::mem::take(&mut self.attributes);
        for (name, value) in attributes {
            self.set_attribute(name, value);
        }
        previous
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    pub fn set_implicit(&mut self, implicit: bool) {
        self.implicit = implicit;
    }

    pub fn child(&self, element: &PathElement) -> Option<&Resource> {
        self.children
            .get(element.key())
            .and_then(|named| named.get(element.value()))
    }

    pub fn child_mut(&mut self, element: &PathElement) -> Option<&mut Resource> {
        self.children
            .get_mut(element.key())
            .and_then(|named| named.get_mut(element.value()))
    }

    pub fn has_child(&self, element: &PathElement) -> bool {
        self.child(element).is_some()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child_types(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Names of the children of one type, sorted
    pub fn child_names(&self, child_type: &str) -> Vec<String> {
        self.children
            .get(child_type)
            .map(|named| named.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every direct child with the element that addresses it, in sorted order
    pub fn children(&self) -> impl Iterator<Item = (PathElement, &Resource)> {
        self.children.iter().flat_map(|(child_type, named)| {
            named.iter().map(move |(name, child)| {
                (PathElement::new(child_type.clone(), name.clone()), child)
            })
        })
    }

    /// Insert a child, returning the resource previously held under that element
    pub fn insert_child(&mut self, element: &PathElement, child: Resource) -> Option<Resource> {
        self.children
            .entry(element.key().to_string())
            .or_default()
            .insert(element.value().to_string(), child)
    }

    pub fn remove_child(&mut self, element: &PathElement) -> Option<Resource> {
        let named = self.children.get_mut(element.key())?;
        let removed = named.remove(element.value());
        if named.is_empty() {
            self.children.remove(element.key());
        }
        removed
    }

    /// Copy of this resource without its children
    pub fn shallow_copy(&self) -> Resource {
        Resource {
            attributes: self.attributes.clone(),
            children: BTreeMap::new(),
            implicit: self.implicit,
        }
    }

    /// Copy of the children alone, without attributes or the implicit flag
    pub fn descendants(&self) -> Resource {
        Resource {
            attributes: BTreeMap::new(),
            children: self.children.clone(),
            implicit: false,
        }
    }

    /// Replace every child with the children of `other`
    pub fn adopt_children(&mut self, other: Resource) {
        self.children = other.children;
    }

    /// Attributes as an object value
    pub fn attributes_value(&self) -> ModelValue {
        ModelValue::Object(self.attributes.clone())
    }

    /// Render this resource as a model value; children only when `recursive`
    pub fn to_model_value(&self, recursive: bool) -> ModelValue {
        let mut map = self.attributes.clone();
        for (child_type, named) in &self.children {
            let value = if recursive {
                ModelValue::Object(
                    named
                        .iter()
                        .map(|(name, child)| (name.clone(), child.to_model_value(true)))
                        .collect(),
                )
            } else {
                ModelValue::Object(
                    named
                        .keys()
                        .map(|name| (name.clone(), ModelValue::Undefined))
                        .collect(),
                )
            };
            map.insert(child_type.clone(), value);
        }
        ModelValue::Object(map)
    }
}
