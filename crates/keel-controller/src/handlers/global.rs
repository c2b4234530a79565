//! Operations available at every address

use crate::attributes::{AttributeAccess, AttributeDefinition};
use crate::compensation;
use crate::context::OperationContext;
use crate::error::{OperationFailure, Result};
use crate::handler::{HandlerOutcome, OperationDescription, OperationFlags, OperationHandler};
use crate::registry::OperationRegistry;
use crate::RegistryError;
use keel_types::{names, ModelType, ModelValue, Operation};
use std::sync::Arc;

/// Bind every global operation into `registry`
pub fn register_globals(registry: &OperationRegistry) -> std::result::Result<(), RegistryError> {
    let read = OperationFlags::read_only();
    registry.register_global(names::READ_RESOURCE, Arc::new(ReadResourceHandler), read)?;
    registry.register_global(names::READ_ATTRIBUTE, Arc::new(ReadAttributeHandler), read)?;
    registry.register_global(
        names::WRITE_ATTRIBUTE,
        Arc::new(WriteAttributeHandler),
        OperationFlags::mutating(),
    )?;
    registry.register_global(
        names::READ_CHILDREN_NAMES,
        Arc::new(ReadChildrenNamesHandler),
        read,
    )?;
    registry.register_global(
        names::READ_OPERATION_NAMES,
        Arc::new(ReadOperationNamesHandler),
        read,
    )?;
    registry.register_global(names::DESCRIBE, Arc::new(DescribeHandler), read)?;
    registry.register_global(
        names::REPLACE_RESOURCE,
        Arc::new(ReplaceResourceHandler),
        OperationFlags::mutating().private(),
    )?;
    Ok(())
}

fn required_str<'o>(
    ctx: &OperationContext<'_>,
    operation: &'o Operation,
    name: &str,
) -> Result<&'o str> {
    operation
        .param_str(name)
        .ok_or_else(|| OperationFailure::invalid(ctx.address(), format!("'{}' is required", name)))
}

/// `read-resource`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadResourceHandler;

impl OperationHandler for ReadResourceHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let recursive = operation
            .param(names::RECURSIVE)
            .and_then(ModelValue::as_bool)
            .unwrap_or(false);
        Ok(HandlerOutcome::value(ctx.read_resource()?.to_model_value(recursive)))
    }

    fn describe(&self) -> OperationDescription {
        OperationDescription::new(
            names::READ_RESOURCE,
            "Read the attributes and children of a resource",
        )
        .with_parameters(vec![
                AttributeDefinition::new(names::RECURSIVE, ModelType::Bool).with_default(false)
            ])
    }
}

/// `read-attribute`; an unset attribute reads as its registered default, or undefined
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadAttributeHandler;

impl OperationHandler for ReadAttributeHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let name = required_str(ctx, operation, names::NAME)?;
        let value = match ctx.read_resource()?.attribute(name) {
            Some(value) => value.clone(),
            None => ctx
                .attribute(name)
                .and_then(|(definition, _)| definition.default)
                .unwrap_or_default(),
        };
        Ok(HandlerOutcome::value(value))
    }
}

/// `write-attribute`; only attributes registered read-write may be written
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteAttributeHandler;

impl OperationHandler for WriteAttributeHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let name = required_str(ctx, operation, names::NAME)?;
        let value = operation
            .params
            .get(names::VALUE)
            .cloned()
            .unwrap_or_default();

        match ctx.attribute(name) {
            Some((definition, AttributeAccess::ReadWrite)) => {
                let violations = definition.violations(Some(&value));
                if !violations.is_empty() {
                    return Err(OperationFailure::validation(ctx.address(), violations));
                }
            }
            Some((_, AttributeAccess::ReadOnly)) => {
                return Err(OperationFailure::invalid(
                    ctx.address(),
                    format!("'{}' is read-only", name),
                ));
            }
            None => {
                return Err(OperationFailure::invalid(
                    ctx.address(),
                    format!("'{}' is not a writable attribute", name),
                ));
            }
        }

        let address = ctx.address().clone();
        let prior = ctx.resource_mut()?.set_attribute(name, value);
        Ok(HandlerOutcome::compensated_by(compensation::undo_write(
            &address, name, prior,
        )))
    }
}

/// `read-children-names`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadChildrenNamesHandler;

impl OperationHandler for ReadChildrenNamesHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let child_type = required_str(ctx, operation, names::CHILD_TYPE)?;
        let names: Vec<ModelValue> = ctx
            .read_resource()?
            .child_names(child_type)
            .into_iter()
            .map(ModelValue::from)
            .collect();
        Ok(HandlerOutcome::value(names))
    }
}

/// `read-operation-names`; private operations are left out
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOperationNamesHandler;

impl OperationHandler for ReadOperationNamesHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let names: Vec<ModelValue> = ctx
            .registry()
            .operation_names(ctx.address(), false)
            .into_iter()
            .map(ModelValue::from)
            .collect();
        Ok(HandlerOutcome::value(names))
    }
}

/// `describe`: the operations that rebuild the addressed subtree
#[derive(Debug, Clone, Copy, Default)]
pub struct DescribeHandler;

impl OperationHandler for DescribeHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let ops = keel_model::subtree_operations(ctx.address(), ctx.read_resource()?);
        let value = keel_model::operations_value(&ops)
            .map_err(|e| OperationFailure::Failed(format!("Failed to describe: {}", e)))?;
        Ok(HandlerOutcome::value(value))
    }
}

/// `replace-resource`: swap attributes and the implicit flag, keeping children
///
/// Exists to undo an add that overwrote an implicit default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceResourceHandler;

impl OperationHandler for ReplaceResourceHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let attributes = match operation.param(names::ATTRIBUTES) {
            None => Default::default(),
            Some(value) => value.as_object().cloned().ok_or_else(|| {
                OperationFailure::invalid(ctx.address(), "'attributes' must be an object")
            })?,
        };
        let implicit = operation
            .param(names::IMPLICIT)
            .and_then(ModelValue::as_bool)
            .unwrap_or(false);

        let address = ctx.address().clone();
        let resource = ctx.resource_mut()?;
        let prior = resource.shallow_copy();
        resource.replace_attributes(attributes);
        resource.set_implicit(implicit);
        Ok(HandlerOutcome::compensated_by(compensation::undo_replace(
            &address, &prior,
        )))
    }
}
