//! Operation registry
//!
//! Binds handlers to `(address pattern, operation name)` pairs. Patterns are
//! addresses whose values may be the wildcard `*`. At most one handler may be
//! bound per pair; rebinding is an error. Global operations apply at every
//! address that has no pattern-specific binding of the same name.

use crate::attributes::{AttributeAccess, AttributeDefinition};
use crate::error::RegistryError;
use crate::handler::{EntryType, OperationFlags, OperationHandler};
use dashmap::DashMap;
use keel_types::PathAddress;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A bound handler with its registration flags
#[derive(Clone)]
pub struct OperationEntry {
    pub handler: Arc<dyn OperationHandler>,
    pub flags: OperationFlags,
}

impl fmt::Debug for OperationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationEntry")
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Registry of operation handlers and attribute definitions
#[derive(Default)]
pub struct OperationRegistry {
    operations: DashMap<PathAddress, HashMap<String, OperationEntry>>,
    globals: DashMap<String, OperationEntry>,
    attributes: DashMap<PathAddress, BTreeMap<String, (AttributeDefinition, AttributeAccess)>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `operation` at `pattern`
    pub fn register(
        &self,
        pattern: PathAddress,
        operation: impl Into<String>,
        handler: Arc<dyn OperationHandler>,
        flags: OperationFlags,
    ) -> Result<(), RegistryError> {
        let operation = operation.into();
        let mut entries = self.operations.entry(pattern.clone()).or_default();
        if entries.contains_key(&operation) {
            return Err(RegistryError::DuplicateHandler { pattern, operation });
        }
        tracing::debug!(pattern = %pattern, operation = %operation, "Registered operation handler");
        entries.insert(operation, OperationEntry { handler, flags });
        Ok(())
    }

    /// Bind an operation that applies at every address
    pub fn register_global(
        &self,
        operation: impl Into<String>,
        handler: Arc<dyn OperationHandler>,
        flags: OperationFlags,
    ) -> Result<(), RegistryError> {
        let operation = operation.into();
        match self.globals.entry(operation.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(RegistryError::DuplicateHandler {
                pattern: PathAddress::root(),
                operation,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(OperationEntry { handler, flags });
                Ok(())
            }
        }
    }

    pub fn register_attribute(
        &self,
        pattern: PathAddress,
        definition: AttributeDefinition,
        access: AttributeAccess,
    ) -> Result<(), RegistryError> {
        let mut attributes = self.attributes.entry(pattern.clone()).or_default();
        if attributes.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateAttribute {
                pattern,
                attribute: definition.name,
            });
        }
        attributes.insert(definition.name.clone(), (definition, access));
        Ok(())
    }

    pub fn unregister(&self, pattern: &PathAddress, operation: &str) -> Option<OperationEntry> {
        let removed = self
            .operations
            .get_mut(pattern)
            .and_then(|mut entries| entries.remove(operation));
        self.operations.remove_if(pattern, |_, entries| entries.is_empty());
        removed
    }

    pub fn unregister_global(&self, operation: &str) -> Option<OperationEntry> {
        self.globals.remove(operation).map(|(_, entry)| entry)
    }

    pub fn unregister_attribute(&self, pattern: &PathAddress, attribute: &str) {
        if let Some(mut attributes) = self.attributes.get_mut(pattern) {
            attributes.remove(attribute);
        }
        self.attributes.remove_if(pattern, |_, attributes| attributes.is_empty());
    }

    /// Drop every operation and attribute bound at exactly `pattern`
    pub fn unregister_pattern(&self, pattern: &PathAddress) {
        self.operations.remove(pattern);
        self.attributes.remove(pattern);
    }

    /// Find the handler for `operation` at a concrete address.
    ///
    /// Among matching patterns the most specific wins: segments compare left
    /// to right and an exact value beats a wildcard.
    pub fn find(&self, address: &PathAddress, operation: &str) -> Option<OperationEntry> {
        let mut best: Option<(Vec<bool>, OperationEntry)> = None;
        for item in self.operations.iter() {
            let pattern = item.key();
            if !address.matches(pattern) {
                continue;
            }
            let Some(entry) = item.value().get(operation) else {
                continue;
            };
            let rank = specificity(pattern);
            if best.as_ref().map_or(true, |(current, _)| rank < *current) {
                best = Some((rank, entry.clone()));
            }
        }
        best.map(|(_, entry)| entry)
            .or_else(|| self.globals.get(operation).map(|e| e.value().clone()))
    }

    /// Whether any pattern other than the root matches this address
    pub fn is_registered(&self, address: &PathAddress) -> bool {
        self.operations
            .iter()
            .any(|item| address.matches(item.key()))
    }

    /// Operation names available at an address, sorted
    pub fn operation_names(&self, address: &PathAddress, include_private: bool) -> Vec<String> {
        let visible = |entry: &OperationEntry| {
            include_private || entry.flags.entry_type == EntryType::Public
        };
        let mut names: Vec<String> = self
            .operations
            .iter()
            .filter(|item| address.matches(item.key()))
            .flat_map(|item| {
                item.value()
                    .iter()
                    .filter(|(_, entry)| visible(entry))
                    .map(|(name, _)| name.clone())
                    .collect::<Vec<_>>()
            })
            .chain(
                self.globals
                    .iter()
                    .filter(|item| visible(item.value()))
                    .map(|item| item.key().clone()),
            )
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Registered definition of an attribute at a concrete address
    pub fn attribute(
        &self,
        address: &PathAddress,
        name: &str,
    ) -> Option<(AttributeDefinition, AttributeAccess)> {
        let mut best: Option<(Vec<bool>, (AttributeDefinition, AttributeAccess))> = None;
        for item in self.attributes.iter() {
            if !address.matches(item.key()) {
                continue;
            }
            let Some(found) = item.value().get(name) else {
                continue;
            };
            let rank = specificity(item.key());
            if best.as_ref().map_or(true, |(current, _)| rank < *current) {
                best = Some((rank, found.clone()));
            }
        }
        best.map(|(_, found)| found)
    }
}

/// Wildcard positions of a pattern; lexicographically smaller is more specific
fn specificity(pattern: &PathAddress) -> Vec<bool> {
    pattern.iter().map(|e| e.is_wildcard()).collect()
}
