//! Scoped view handed to a handler for one dispatch
//!
//! A handler sees exactly one resource: the one its address denotes. It works
//! on a staged copy of that resource's subtree; the dispatcher commits the
//! staged result only after the handler returns successfully, so a failed
//! operation never leaves a partial write behind.

use crate::attributes::{AttributeAccess, AttributeDefinition};
use crate::error::{OperationFailure, Result};
use crate::registry::OperationRegistry;
use keel_model::{ModelError, Resource};
use keel_types::PathAddress;

/// What caller is dispatching
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Authenticated principal, if any
    pub actor: Option<String>,
}

impl RequestContext {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
        }
    }
}

/// A handler's scoped view of the model
pub struct OperationContext<'a> {
    address: &'a PathAddress,
    operation: &'a str,
    read_only: bool,
    registry: &'a OperationRegistry,
    request: &'a RequestContext,
    parent: Option<Resource>,
    original: Option<Resource>,
    staged: Option<Resource>,
}

impl<'a> OperationContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        address: &'a PathAddress,
        operation: &'a str,
        read_only: bool,
        registry: &'a OperationRegistry,
        request: &'a RequestContext,
        parent: Option<Resource>,
        original: Option<Resource>,
    ) -> Self {
        let staged = original.clone();
        Self {
            address,
            operation,
            read_only,
            registry,
            request,
            parent,
            original,
            staged,
        }
    }

    pub fn address(&self) -> &PathAddress {
        self.address
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn request(&self) -> &RequestContext {
        self.request
    }

    pub fn registry(&self) -> &OperationRegistry {
        self.registry
    }

    /// The local name of the target, i.e. the last address segment's value
    pub fn local_name(&self) -> Option<&str> {
        self.address.last().map(|e| e.value())
    }

    /// Attributes of the parent resource, without its children
    pub fn parent(&self) -> Option<&Resource> {
        self.parent.as_ref()
    }

    pub fn resource_exists(&self) -> bool {
        self.staged.is_some()
    }

    /// The target resource as currently staged
    pub fn read_resource(&self) -> Result<&Resource> {
        self.staged
            .as_ref()
            .ok_or_else(|| ModelError::NotFound(self.address.clone()).into())
    }

    /// Mutable access to the staged target
    pub fn resource_mut(&mut self) -> Result<&mut Resource> {
        self.ensure_writable()?;
        let address = self.address;
        self.staged
            .as_mut()
            .ok_or_else(|| ModelError::NotFound(address.clone()).into())
    }

    /// Materialize the target resource
    ///
    /// Fails with `DuplicateResource` if something already lives at the address
    /// and with `MissingParent` if the parent does not exist.
    pub fn create_resource(&mut self, resource: Resource) -> Result<&mut Resource> {
        self.ensure_writable()?;
        if self.staged.is_some() {
            return Err(ModelError::DuplicateResource(self.address.clone()).into());
        }
        if self.parent.is_none() {
            return Err(ModelError::MissingParent(self.address.clone()).into());
        }
        Ok(self.staged.insert(resource))
    }

    /// Replace an existing resource wholesale, returning what was there
    pub fn replace_resource(&mut self, resource: Resource) -> Result<Resource> {
        self.ensure_writable()?;
        match self.staged.as_mut() {
            Some(current) => Ok(std::mem::replace(current, resource)),
            None => Err(ModelError::NotFound(self.address.clone()).into()),
        }
    }

    /// Remove the target, returning a snapshot of what was removed
    pub fn remove_resource(&mut self) -> Result<Resource> {
        self.ensure_writable()?;
        self.staged
            .take()
            .ok_or_else(|| ModelError::NotFound(self.address.clone()).into())
    }

    /// Registered definition and access for an attribute of the target
    pub fn attribute(&self, name: &str) -> Option<(AttributeDefinition, AttributeAccess)> {
        self.registry.attribute(self.address, name)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            Err(OperationFailure::ReadOnly {
                operation: self.operation.to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Split into the pre-operation snapshot and the staged result
    pub(crate) fn into_changes(self) -> (Option<Resource>, Option<Resource>) {
        (self.original, self.staged)
    }
}
