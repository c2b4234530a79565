//! The operation dispatcher
//!
//! The dispatcher is the only code that mutates the resource tree. For each
//! operation it:
//!
//! 1. finds the most specific handler for `(address, name)`,
//! 2. takes a shared or exclusive lock on the target subtree,
//! 3. consults the authorizer,
//! 4. runs the handler against a staged copy of the target,
//! 5. commits the staged copy and emits events,
//! 6. hands the rebuilt configuration to the persister.
//!
//! Any failure along the way becomes a failed [`OperationOutcome`] carrying a
//! message; nothing raised inside a handler crosses this boundary.

use crate::authorization::{AllowAllAuthorizer, AuthorizationDecision, OperationAuthorizer};
use crate::context::{OperationContext, RequestContext};
use crate::error::{OperationFailure, RegistryError, Result};
use crate::handlers::register_globals;
use crate::locks::SubtreeLockManager;
use crate::persistence::{ConfigurationPersister, NullPersister};
use crate::registry::OperationRegistry;
use keel_model::{ModelError, Resource, ResourceTree};
use keel_types::{
    names, EventSource, ManagementEvent, ManagementEventEnvelope, ModelValue, Operation,
    OperationOutcome, PathAddress,
};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

/// Channel capacity for management events
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Routes operations to handlers and owns the resource tree
pub struct Dispatcher {
    registry: Arc<OperationRegistry>,
    tree: RwLock<ResourceTree>,
    locks: SubtreeLockManager,
    authorizer: Arc<dyn OperationAuthorizer>,
    persister: Arc<dyn ConfigurationPersister>,
    event_tx: broadcast::Sender<ManagementEventEnvelope>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Subscribe to model change events
    pub fn subscribe(&self) -> broadcast::Receiver<ManagementEventEnvelope> {
        self.event_tx.subscribe()
    }

    /// Dispatch on behalf of an anonymous caller
    pub fn dispatch(&self, operation: &Operation) -> OperationOutcome {
        self.dispatch_as(operation, &RequestContext::default())
    }

    /// Dispatch one operation and wait for its outcome
    #[instrument(
        skip(self, operation, request),
        fields(address = %operation.address, operation = %operation.name)
    )]
    pub fn dispatch_as(&self, operation: &Operation, request: &RequestContext) -> OperationOutcome {
        match self.execute(operation, request) {
            Ok(outcome) => outcome,
            Err(failure) => {
                let message = failure.to_string();
                debug!(error = %message, "Operation failed");
                self.emit(
                    ManagementEvent::OperationFailed {
                        address: operation.address.clone(),
                        operation: operation.name.clone(),
                        message: message.clone(),
                    },
                    request,
                );
                OperationOutcome::failed(message)
            }
        }
    }

    /// Clone of the current tree
    pub fn model_snapshot(&self) -> ResourceTree {
        self.tree.read().clone()
    }

    /// Deterministic rendering of the current tree
    pub fn render(&self) -> serde_json::Result<String> {
        keel_model::render(&self.tree.read())
    }

    /// Clone of one resource, if present
    pub fn resource(&self, address: &PathAddress) -> Option<Resource> {
        self.tree.read().resolve(address).ok().cloned()
    }

    fn execute(&self, operation: &Operation, request: &RequestContext) -> Result<OperationOutcome> {
        let address = &operation.address;
        if address.has_wildcard() {
            return Err(ModelError::invalid_address(
                address,
                "wildcards only appear in registration patterns",
            )
            .into());
        }

        let entry = self
            .registry
            .find(address, &operation.name)
            .ok_or_else(|| RegistryError::UnknownOperation {
                address: address.clone(),
                operation: operation.name.clone(),
            })?;
        let read_only = entry.flags.read_only;

        let _guard = if read_only {
            self.locks.shared(address)
        } else {
            self.locks.exclusive(address)
        };

        if let AuthorizationDecision::Deny { reason } =
            self.authorizer.authorize(operation, request, read_only)
        {
            return Err(OperationFailure::Unauthorized(reason));
        }

        let (parent, original) = {
            let tree = self.tree.read();
            let parent = address
                .parent()
                .and_then(|p| tree.resolve(&p).ok().map(Resource::shallow_copy));
            (parent, tree.resolve(address).ok().cloned())
        };
        if original.is_none() && !entry.flags.creates_resource {
            return Err(ModelError::NotFound(address.clone()).into());
        }

        let mut ctx = OperationContext::new(
            address,
            &operation.name,
            read_only,
            &self.registry,
            request,
            parent,
            original,
        );
        let outcome = entry.handler.execute(&mut ctx, operation)?;
        if entry.flags.creates_resource {
            if let Some(snapshot) = operation.param(names::DESCENDANTS) {
                restore_descendants(&mut ctx, snapshot)?;
            }
        }
        if !read_only {
            let (original, staged) = ctx.into_changes();
            self.commit(operation, original, staged, request)?;
        }
        Ok(OperationOutcome::success(outcome.value, outcome.compensating))
    }

    fn commit(
        &self,
        operation: &Operation,
        original: Option<Resource>,
        staged: Option<Resource>,
        request: &RequestContext,
    ) -> Result<()> {
        let address = &operation.address;
        let mut tree = self.tree.write();
        let events = match (original, staged) {
            (None, None) => Vec::new(),
            (None, Some(created)) => {
                tree.create(address, created)?;
                info!(address = %address, "Resource added");
                vec![ManagementEvent::ResourceAdded {
                    address: address.clone(),
                    operation: operation.name.clone(),
                }]
            }
            (Some(_), None) => {
                tree.remove(address)?;
                info!(address = %address, "Resource removed");
                vec![ManagementEvent::ResourceRemoved {
                    address: address.clone(),
                    operation: operation.name.clone(),
                }]
            }
            (Some(before), Some(after)) if before == after => Vec::new(),
            (Some(before), Some(after)) => {
                let events = change_events(operation, &before, &after);
                tree.replace(address, after)?;
                debug!(address = %address, "Resource updated");
                events
            }
        };
        if events.is_empty() {
            return Ok(());
        }

        // Persist while still excluding writers so snapshots land in commit order
        let tree = RwLockWriteGuard::downgrade(tree);
        match keel_model::rebuild_operations(&tree, &PathAddress::root()) {
            Ok(ops) => {
                if let Err(e) = self.persister.persist(&ops) {
                    warn!(error = %e, "Configuration was not persisted");
                }
            }
            Err(e) => warn!(error = %e, "Failed to describe model for persistence"),
        }
        drop(tree);

        for event in events {
            self.emit(event, request);
        }
        Ok(())
    }

    fn emit(&self, event: ManagementEvent, request: &RequestContext) {
        let mut envelope = ManagementEventEnvelope::new(event, EventSource::Controller);
        if let Some(actor) = &request.actor {
            envelope = envelope.with_actor(actor.clone());
        }
        // No subscribers is fine
        let _ = self.event_tx.send(envelope);
    }
}

/// Attribute-level events when only attributes changed, otherwise one replace event
fn change_events(
    operation: &Operation,
    before: &Resource,
    after: &Resource,
) -> Vec<ManagementEvent> {
    let address = &operation.address;
    let same_shape =
        before.is_implicit() == after.is_implicit() && before.children().eq(after.children());
    if !same_shape {
        return vec![ManagementEvent::ResourceReplaced {
            address: address.clone(),
            operation: operation.name.clone(),
        }];
    }

    let mut names: Vec<&String> = before
        .attributes()
        .keys()
        .chain(after.attributes().keys())
        .collect();
    names.sort();
    names.dedup();
    names
        .into_iter()
        .filter(|name| before.attribute(name) != after.attribute(name))
        .map(|name| ManagementEvent::AttributeWritten {
            address: address.clone(),
            attribute: name.clone(),
            value: after.attribute(name).cloned().unwrap_or(ModelValue::Undefined),
        })
        .collect()
}

/// Install a subtree carried by a compensating add over the handler's children
fn restore_descendants(ctx: &mut OperationContext<'_>, snapshot: &ModelValue) -> Result<()> {
    let descendants = keel_model::descendants_from_value(snapshot).map_err(|e| {
        OperationFailure::invalid(
            ctx.address(),
            format!("'{}' is not a resource snapshot: {}", names::DESCENDANTS, e),
        )
    })?;
    ctx.resource_mut()?.adopt_children(descendants);
    Ok(())
}

/// Builder for [`Dispatcher`]
#[derive(Default)]
pub struct DispatcherBuilder {
    registry: Option<Arc<OperationRegistry>>,
    tree: Option<ResourceTree>,
    authorizer: Option<Arc<dyn OperationAuthorizer>>,
    persister: Option<Arc<dyn ConfigurationPersister>>,
}

impl DispatcherBuilder {
    /// Use an existing registry; global operations are added to it
    pub fn with_registry(mut self, registry: Arc<OperationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Start from an existing tree instead of an empty one
    pub fn with_model(mut self, tree: ResourceTree) -> Self {
        self.tree = Some(tree);
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn OperationAuthorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn with_persister(mut self, persister: Arc<dyn ConfigurationPersister>) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Fails if the registry already binds one of the global operations
    pub fn build(self) -> std::result::Result<Dispatcher, RegistryError> {
        let registry = self.registry.unwrap_or_default();
        register_globals(&registry)?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Dispatcher {
            registry,
            tree: RwLock::new(self.tree.unwrap_or_default()),
            locks: SubtreeLockManager::new(),
            authorizer: self
                .authorizer
                .unwrap_or_else(|| Arc::new(AllowAllAuthorizer)),
            persister: self.persister.unwrap_or_else(|| Arc::new(NullPersister)),
            event_tx,
        })
    }
}
