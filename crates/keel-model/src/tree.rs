//! The root-anchored resource tree

use crate::error::{ModelError, Result};
use crate::resource::Resource;
use keel_types::{PathAddress, PathElement};
use serde::{Deserialize, Serialize};

/// The configuration tree
///
/// Exactly one resource exists per address. A resource can only be created
/// once its parent exists, and traversal always starts at the root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTree {
    root: Resource,
}

impl ResourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_root(root: Resource) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Resource {
        &self.root
    }

    /// Resolve an address to the resource it denotes
    pub fn resolve(&self, address: &PathAddress) -> Result<&Resource> {
        ensure_concrete(address)?;
        let mut current = &self.root;
        for element in address {
            current = current
                .child(element)
                .ok_or_else(|| ModelError::NotFound(address.clone()))?;
        }
        Ok(current)
    }

    pub fn resolve_mut(&mut self, address: &PathAddress) -> Result<&mut Resource> {
        ensure_concrete(address)?;
        let mut current = &mut self.root;
        for element in address {
            current = current
                .child_mut(element)
                .ok_or_else(|| ModelError::NotFound(address.clone()))?;
        }
        Ok(current)
    }

    pub fn contains(&self, address: &PathAddress) -> bool {
        self.resolve(address).is_ok()
    }

    /// Create `element` under the resource at `parent`
    pub fn create_child(
        &mut self,
        parent: &PathAddress,
        element: PathElement,
        resource: Resource,
    ) -> Result<&mut Resource> {
        let address = parent.append(element.clone());
        ensure_concrete(&address)?;
        let parent_resource = self
            .resolve_mut(parent)
            .map_err(|_| ModelError::MissingParent(address.clone()))?;
        if parent_resource.has_child(&element) {
            return Err(ModelError::DuplicateResource(address));
        }
        parent_resource.insert_child(&element, resource);
        parent_resource
            .child_mut(&element)
            .ok_or(ModelError::NotFound(address))
    }

    /// Create the resource at a full address
    pub fn create(&mut self, address: &PathAddress, resource: Resource) -> Result<&mut Resource> {
        let (parent, element) = split(address)?;
        self.create_child(&parent, element, resource)
    }

    /// Remove the resource at `address` together with its subtree
    pub fn remove(&mut self, address: &PathAddress) -> Result<Resource> {
        let (parent, element) = split(address)?;
        let parent_resource = self
            .resolve_mut(&parent)
            .map_err(|_| ModelError::NotFound(address.clone()))?;
        parent_resource
            .remove_child(&element)
            .ok_or_else(|| ModelError::NotFound(address.clone()))
    }

    /// Swap in a new resource at an existing address, returning the old one
    pub fn replace(&mut self, address: &PathAddress, resource: Resource) -> Result<Resource> {
        let target = self.resolve_mut(address)?;
        Ok(std::mem::replace(target, resource))
    }

    /// Pre-order walk of the subtree at `address`, parents before children
    pub fn walk(&self, address: &PathAddress) -> Result<Vec<(PathAddress, &Resource)>> {
        let start = self.resolve(address)?;
        let mut out = Vec::new();
        collect(address.clone(), start, &mut out);
        Ok(out)
    }
}

fn collect<'a>(
    address: PathAddress,
    resource: &'a Resource,
    out: &mut Vec<(PathAddress, &'a Resource)>,
) {
    let children: Vec<_> = resource.children().collect();
    out.push((address.clone(), resource));
    for (element, child) in children {
        collect(address.append(element), child, out);
    }
}

fn split(address: &PathAddress) -> Result<(PathAddress, PathElement)> {
    match (address.parent(), address.last()) {
        (Some(parent), Some(last)) => Ok((parent, last.clone())),
        _ => Err(ModelError::invalid_address(address, "the root cannot be created or removed")),
    }
}

fn ensure_concrete(address: &PathAddress) -> Result<()> {
    if address.has_wildcard() {
        Err(ModelError::invalid_address(address, "wildcards only appear in registration patterns"))
    } else {
        Ok(())
    }
}
