//! Host resources and the local host name

use crate::attributes::{validate_parameters, AttributeDefinition};
use crate::common::interface::loopback_criteria;
use crate::context::OperationContext;
use crate::error::{OperationFailure, Result};
use crate::handler::{HandlerOutcome, OperationDescription, OperationHandler};
use crate::handlers::{commit_add, prepare_add, remove_resource, requested_implicit, AddMode};
use keel_model::Resource;
use keel_types::{names, ModelType, ModelValue, Operation, PathElement};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub const MANAGEMENT_INTERFACE: &str = "management-interface";
pub const DEFAULT_MANAGEMENT_INTERFACE: &str = "management";

/// Name of the host this process runs as
#[derive(Debug, Default)]
pub struct LocalHostState {
    name: RwLock<Option<String>>,
}

impl LocalHostState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    fn set(&self, name: &str) {
        *self.name.write() = Some(name.to_string());
    }

    fn clear_if(&self, name: &str) {
        let mut current = self.name.write();
        if current.as_deref() == Some(name) {
            *current = None;
        }
    }
}

fn host_parameters() -> Vec<AttributeDefinition> {
    vec![
        AttributeDefinition::new(names::NAME, ModelType::String).required(),
        AttributeDefinition::new(MANAGEMENT_INTERFACE, ModelType::String)
            .with_default(DEFAULT_MANAGEMENT_INTERFACE),
    ]
}

/// `add` / `add-host`: initializes the host's core model
///
/// Besides the host attributes this creates the default management
/// interface as an implicit child, which a specified interface add may later
/// overwrite.
#[derive(Debug, Clone)]
pub struct HostAddHandler {
    state: Arc<LocalHostState>,
}

impl HostAddHandler {
    pub fn new(state: Arc<LocalHostState>) -> Self {
        Self { state }
    }
}

impl OperationHandler for HostAddHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let overwritten = prepare_add(ctx, AddMode::Named)?;
        let attributes = validate_parameters(&host_parameters(), &operation.params, false)
            .map_err(|violations| OperationFailure::validation(ctx.address(), violations))?;
        let host_name = attributes
            .get(names::NAME)
            .and_then(ModelValue::as_str)
            .unwrap_or_default()
            .to_string();
        let management = attributes
            .get(MANAGEMENT_INTERFACE)
            .and_then(ModelValue::as_str)
            .unwrap_or(DEFAULT_MANAGEMENT_INTERFACE)
            .to_string();

        let outcome = commit_add(ctx, attributes, requested_implicit(operation), overwritten)?;

        let mut defaults = BTreeMap::new();
        defaults.insert(names::NAME.to_string(), ModelValue::from(management.as_str()));
        defaults.insert(names::CRITERIA.to_string(), loopback_criteria());
        ctx.resource_mut()?.insert_child(
            &PathElement::new(names::INTERFACE, management),
            Resource::implicit_default(defaults),
        );

        self.state.set(&host_name);
        info!(host = %host_name, "Local host registered");
        Ok(outcome)
    }

    fn describe(&self) -> OperationDescription {
        OperationDescription::new(names::ADD_HOST, "Add the local host")
            .with_parameters(host_parameters())
    }
}

/// `remove` for hosts; forgets the local host name
#[derive(Debug, Clone)]
pub struct HostRemoveHandler {
    state: Arc<LocalHostState>,
}

impl HostRemoveHandler {
    pub fn new(state: Arc<LocalHostState>) -> Self {
        Self { state }
    }
}

impl OperationHandler for HostRemoveHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let (removed, outcome) = remove_resource(ctx)?;
        if let Some(name) = removed.attribute(names::NAME).and_then(ModelValue::as_str) {
            self.state.clear_if(name);
        }
        Ok(outcome)
    }
}
