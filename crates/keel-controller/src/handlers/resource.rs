//! Generic add and remove handlers
//!
//! Most resource types need nothing more than "validate the parameters and
//! store them as attributes". Handlers with extra behaviour reuse the
//! building blocks here ([`prepare_add`], [`commit_add`], [`remove_resource`]).

use crate::attributes::{validate_parameters, AttributeDefinition};
use crate::compensation;
use crate::context::OperationContext;
use crate::error::{OperationFailure, Result};
use crate::handler::{HandlerOutcome, OperationDescription, OperationHandler};
use keel_model::{ModelError, Resource};
use keel_types::{names, ModelValue, Operation};
use std::collections::BTreeMap;

/// How an add treats an address that already holds a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddMode {
    /// The address must be free
    #[default]
    Named,
    /// An implicit default at the address may be overwritten
    Specified,
}

/// Check the target for an add and return the implicit default being
/// overwritten, if any
pub fn prepare_add(ctx: &OperationContext<'_>, mode: AddMode) -> Result<Option<Resource>> {
    match ctx.read_resource() {
        Err(_) => Ok(None),
        Ok(existing) if mode == AddMode::Specified && existing.is_implicit() => {
            Ok(Some(existing.shallow_copy()))
        }
        Ok(_) => Err(ModelError::DuplicateResource(ctx.address().clone()).into()),
    }
}

/// Whether the operation asks for the resource to be marked as a default
pub fn requested_implicit(operation: &Operation) -> bool {
    operation
        .param(names::IMPLICIT)
        .and_then(ModelValue::as_bool)
        .unwrap_or(false)
}

/// Materialize the target with `attributes` and return its compensation
///
/// `overwritten` is what [`prepare_add`] returned. A fresh resource is undone
/// by `remove`; an overwritten default keeps its children and is undone by
/// `replace-resource`.
pub fn commit_add(
    ctx: &mut OperationContext<'_>,
    attributes: BTreeMap<String, ModelValue>,
    implicit: bool,
    overwritten: Option<Resource>,
) -> Result<HandlerOutcome> {
    let address = ctx.address().clone();
    match overwritten {
        Some(prior) => {
            let resource = ctx.resource_mut()?;
            resource.replace_attributes(attributes);
            resource.set_implicit(implicit);
            Ok(HandlerOutcome::compensated_by(compensation::undo_replace(
                &address, &prior,
            )))
        }
        None => {
            let mut resource = Resource::with_attributes(attributes);
            resource.set_implicit(implicit);
            ctx.create_resource(resource)?;
            Ok(HandlerOutcome::compensated_by(compensation::undo_add(&address)))
        }
    }
}

/// Remove the target and return the compensating add
///
/// A resource with explicit children is refused; those are removed through
/// their own handlers first. Implicit descendants are snapshotted into the
/// compensating add.
pub fn remove_resource(ctx: &mut OperationContext<'_>) -> Result<(Resource, HandlerOutcome)> {
    let snapshot = ctx.read_resource()?;
    if !only_implicit_children(snapshot) {
        let children: Vec<String> = snapshot
            .children()
            .filter(|(_, child)| !child.is_implicit())
            .map(|(element, _)| format!("{}={}", element.key(), element.value()))
            .collect();
        return Err(OperationFailure::invalid(
            ctx.address(),
            format!("cannot remove a resource with children ({})", children.join(", ")),
        ));
    }
    let removed = ctx.remove_resource()?;
    let undo = compensation::undo_remove(ctx.address(), &removed).map_err(|e| {
        OperationFailure::Failed(format!("Failed to snapshot {}: {}", ctx.address(), e))
    })?;
    Ok((removed, HandlerOutcome::compensated_by(undo)))
}

fn only_implicit_children(resource: &Resource) -> bool {
    resource
        .children()
        .all(|(_, child)| child.is_implicit() && only_implicit_children(child))
}

/// Validate-and-store add handler
#[derive(Debug, Clone, Default)]
pub struct ResourceAddHandler {
    mode: AddMode,
    parameters: Vec<AttributeDefinition>,
    allow_unknown: bool,
    description: String,
}

impl ResourceAddHandler {
    pub fn new(parameters: Vec<AttributeDefinition>) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }

    /// An add that stores any parameter it is given
    pub fn permissive() -> Self {
        Self {
            allow_unknown: true,
            ..Self::default()
        }
    }

    pub fn specified(mut self) -> Self {
        self.mode = AddMode::Specified;
        self
    }

    pub fn describe_as(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl OperationHandler for ResourceAddHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let overwritten = prepare_add(ctx, self.mode)?;
        let attributes =
            validate_parameters(&self.parameters, &operation.params, self.allow_unknown)
                .map_err(|violations| OperationFailure::validation(ctx.address(), violations))?;
        commit_add(ctx, attributes, requested_implicit(operation), overwritten)
    }

    fn describe(&self) -> OperationDescription {
        OperationDescription::new(names::ADD, self.description.clone())
            .with_parameters(self.parameters.clone())
    }
}

/// Remove handler
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceRemoveHandler;

impl OperationHandler for ResourceRemoveHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _operation: &Operation,
    ) -> Result<HandlerOutcome> {
        remove_resource(ctx).map(|(_, outcome)| outcome)
    }

    fn describe(&self) -> OperationDescription {
        OperationDescription::new(names::REMOVE, "Remove the resource")
    }
}
