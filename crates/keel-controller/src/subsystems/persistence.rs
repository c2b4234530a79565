//! The `persistence` subsystem
//!
//! Holds the name of the default data source used by persistence units. What
//! the data source means is decided by the runtime; the model only records it.

use crate::attributes::{AttributeAccess, AttributeDefinition};
use crate::context::OperationContext;
use crate::error::{OperationFailure, RegistryError, Result};
use crate::extension::{Extension, ExtensionContext};
use crate::handler::{HandlerOutcome, OperationDescription, OperationFlags, OperationHandler};
use crate::handlers::{ResourceAddHandler, ResourceRemoveHandler};
use keel_types::{names, ModelType, Operation, PathAddress, PathElement};
use std::sync::Arc;

pub const SUBSYSTEM_NAME: &str = "persistence";
pub const DEFAULT_DATASOURCE: &str = "default-datasource";

pub fn subsystem_address() -> PathAddress {
    PathAddress::new(vec![PathElement::new(names::SUBSYSTEM, SUBSYSTEM_NAME)])
}

/// The add operation that recreates the subsystem
pub fn add_operation(default_datasource: &str) -> Operation {
    Operation::add(subsystem_address()).with_param(DEFAULT_DATASOURCE, default_datasource)
}

fn default_datasource() -> AttributeDefinition {
    AttributeDefinition::new(DEFAULT_DATASOURCE, ModelType::String)
        .required()
        .describe("Data source used by persistence units that name none")
}

/// Private `describe`: the single add that rebuilds the subsystem
#[derive(Debug, Clone, Copy, Default)]
struct DescribeSubsystemHandler;

impl OperationHandler for DescribeSubsystemHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let datasource = ctx
            .read_resource()?
            .attribute(DEFAULT_DATASOURCE)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                OperationFailure::invalid(
                    ctx.address(),
                    format!("'{}' is not set", DEFAULT_DATASOURCE),
                )
            })?
            .to_string();
        let ops = [add_operation(&datasource)];
        let value = keel_model::operations_value(&ops)
            .map_err(|e| OperationFailure::Failed(format!("Failed to describe: {}", e)))?;
        Ok(HandlerOutcome::value(value))
    }

    fn describe(&self) -> OperationDescription {
        OperationDescription::new(names::DESCRIBE, "Operations that recreate the subsystem")
    }
}

/// Registers `/subsystem=persistence`
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistenceExtension;

impl Extension for PersistenceExtension {
    fn name(&self) -> &str {
        SUBSYSTEM_NAME
    }

    fn initialize(&self, ctx: &mut ExtensionContext<'_>) -> std::result::Result<(), RegistryError> {
        let address = subsystem_address();
        ctx.register_operation(
            address.clone(),
            names::ADD,
            Arc::new(
                ResourceAddHandler::new(vec![default_datasource()])
                    .describe_as("Add the persistence subsystem"),
            ),
            OperationFlags::creates(),
        )?;
        ctx.register_operation(
            address.clone(),
            names::REMOVE,
            Arc::new(ResourceRemoveHandler),
            OperationFlags::mutating(),
        )?;
        ctx.register_operation(
            address.clone(),
            names::DESCRIBE,
            Arc::new(DescribeSubsystemHandler),
            OperationFlags::read_only().private(),
        )?;
        ctx.register_attribute(address, default_datasource(), AttributeAccess::ReadWrite)?;
        Ok(())
    }
}
