//! Deployment resources in the management model
//!
//! `/server-group=*/deployment=*` records which content is deployed under
//! which runtime name. The `deploy` and `undeploy` operations drive the
//! [`DeploymentService`] and are each other's compensation.

use crate::mount::ArchiveMounter;
use crate::processor::Processor;
use crate::processors::standard_processors;
use crate::service::DeploymentService;
use keel_controller::handlers::{
    commit_add, prepare_add, remove_resource, requested_implicit, AddMode,
};
use keel_controller::{
    validate_parameters, AttributeAccess, AttributeDefinition, Extension, ExtensionContext,
    HandlerOutcome, OperationContext, OperationDescription, OperationFailure, OperationFlags,
    OperationHandler, RegistryError, ResourceAddHandler,
};
use keel_model::Resource;
use keel_types::{names, ModelType, ModelValue, Operation, PathAddress, PathElement};
use std::sync::Arc;
use tracing::{info, warn};

pub const RUNTIME_NAME: &str = "runtime-name";
pub const HASH: &str = "hash";
pub const ENABLED: &str = "enabled";

/// Pattern of deployment resources
pub fn deployment_pattern() -> PathAddress {
    PathAddress::new(vec![
        PathElement::wildcard(names::SERVER_GROUP),
        PathElement::wildcard(names::DEPLOYMENT),
    ])
}

/// Address of deployment `name` in `server_group`
pub fn deployment_address(server_group: &str, name: &str) -> PathAddress {
    PathAddress::new(vec![
        PathElement::new(names::SERVER_GROUP, server_group),
        PathElement::new(names::DEPLOYMENT, name),
    ])
}

/// Attributes of a deployment resource
///
/// `enabled` is accepted by `add` only as `false`; it turns true through
/// `deploy` alone.
fn deployment_parameters() -> Vec<AttributeDefinition> {
    vec![
        AttributeDefinition::new(RUNTIME_NAME, ModelType::String)
            .describe("Name the content is deployed under; defaults to the deployment name"),
        AttributeDefinition::new(HASH, ModelType::String)
            .required()
            .describe("Hash of the content in the content repository"),
        AttributeDefinition::new(ENABLED, ModelType::Bool)
            .with_default(false)
            .describe("Whether the content is deployed"),
    ]
}

fn enabled(resource: &Resource) -> bool {
    resource
        .attribute(ENABLED)
        .and_then(ModelValue::as_bool)
        .unwrap_or(false)
}

fn is_enabled(ctx: &OperationContext<'_>) -> keel_controller::Result<bool> {
    Ok(enabled(ctx.read_resource()?))
}

fn deployment_name(ctx: &OperationContext<'_>) -> String {
    ctx.local_name().unwrap_or_default().to_string()
}

/// `add`: records a deployment without deploying it
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentAddHandler;

impl OperationHandler for DeploymentAddHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        operation: &Operation,
    ) -> keel_controller::Result<HandlerOutcome> {
        let overwritten = prepare_add(ctx, AddMode::Named)?;
        let mut attributes =
            validate_parameters(&deployment_parameters(), &operation.params, false)
                .map_err(|violations| OperationFailure::validation(ctx.address(), violations))?;
        if attributes.get(ENABLED).and_then(ModelValue::as_bool) == Some(true) {
            return Err(OperationFailure::invalid(
                ctx.address(),
                format!("'{}' cannot be set by add; use '{}'", ENABLED, names::DEPLOY),
            ));
        }
        attributes
            .entry(RUNTIME_NAME.to_string())
            .or_insert_with(|| ModelValue::from(deployment_name(ctx)));
        commit_add(ctx, attributes, requested_implicit(operation), overwritten)
    }

    fn describe(&self) -> OperationDescription {
        OperationDescription::new(names::ADD, "Add a deployment")
            .with_parameters(deployment_parameters())
    }
}

/// `remove`: only disabled deployments may be removed
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentRemoveHandler;

impl OperationHandler for DeploymentRemoveHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _operation: &Operation,
    ) -> keel_controller::Result<HandlerOutcome> {
        if is_enabled(ctx)? {
            return Err(OperationFailure::invalid(
                ctx.address(),
                format!(
                    "deployment '{}' is enabled and must be undeployed first",
                    deployment_name(ctx)
                ),
            ));
        }
        remove_resource(ctx).map(|(_, outcome)| outcome)
    }
}

/// `remove` for server groups: refused while one of its deployments is enabled
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerGroupRemoveHandler;

impl OperationHandler for ServerGroupRemoveHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _operation: &Operation,
    ) -> keel_controller::Result<HandlerOutcome> {
        let running: Vec<String> = ctx
            .read_resource()?
            .children()
            .filter(|(element, child)| element.key() == names::DEPLOYMENT && enabled(child))
            .map(|(element, _)| element.value().to_string())
            .collect();
        if !running.is_empty() {
            return Err(OperationFailure::invalid(
                ctx.address(),
                format!(
                    "enabled deployments must be undeployed first ({})",
                    running.join(", ")
                ),
            ));
        }
        remove_resource(ctx).map(|(_, outcome)| outcome)
    }

    fn describe(&self) -> OperationDescription {
        OperationDescription::new(names::REMOVE, "Remove a server group")
    }
}

/// `deploy`: runs the deployment through the pipeline
pub struct DeployHandler {
    service: Arc<DeploymentService>,
}

impl DeployHandler {
    pub fn new(service: Arc<DeploymentService>) -> Self {
        Self { service }
    }
}

impl OperationHandler for DeployHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _operation: &Operation,
    ) -> keel_controller::Result<HandlerOutcome> {
        let name = deployment_name(ctx);
        if is_enabled(ctx)? {
            return Err(OperationFailure::invalid(
                ctx.address(),
                format!("deployment '{}' is already deployed", name),
            ));
        }
        let resource = ctx.read_resource()?;
        let hash = resource
            .attribute(HASH)
            .and_then(ModelValue::as_str)
            .ok_or_else(|| {
                OperationFailure::invalid(ctx.address(), format!("'{}' is not set", HASH))
            })?
            .to_string();
        let runtime_name = resource
            .attribute(RUNTIME_NAME)
            .and_then(ModelValue::as_str)
            .unwrap_or(name.as_str())
            .to_string();

        self.service
            .deploy(&name, &runtime_name, &hash)
            .map_err(|e| OperationFailure::Failed(e.to_string()))?;

        ctx.resource_mut()?.set_attribute(ENABLED, ModelValue::from(true));
        info!(deployment = %name, address = %ctx.address(), "Deployment enabled");
        Ok(HandlerOutcome::compensated_by(Operation::new(
            names::UNDEPLOY,
            ctx.address().clone(),
        )))
    }

    fn describe(&self) -> OperationDescription {
        OperationDescription::new(
            names::DEPLOY,
            "Deploy the content and mark the deployment enabled",
        )
    }
}

/// `undeploy`: tears the unit down and marks the deployment disabled
pub struct UndeployHandler {
    service: Arc<DeploymentService>,
}

impl UndeployHandler {
    pub fn new(service: Arc<DeploymentService>) -> Self {
        Self { service }
    }
}

impl OperationHandler for UndeployHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _operation: &Operation,
    ) -> keel_controller::Result<HandlerOutcome> {
        let name = deployment_name(ctx);
        if !is_enabled(ctx)? {
            return Err(OperationFailure::invalid(
                ctx.address(),
                format!("deployment '{}' is not deployed", name),
            ));
        }

        // The unit is gone even when teardown reports errors
        match self.service.undeploy(&name) {
            Ok(()) => {}
            Err(crate::DeploymentError::UnknownDeployment(_)) => {
                warn!(deployment = %name, "Enabled deployment had no running unit")
            }
            Err(e) => warn!(deployment = %name, error = %e, "Undeploy completed with errors"),
        }

        ctx.resource_mut()?.set_attribute(ENABLED, ModelValue::from(false));
        info!(deployment = %name, address = %ctx.address(), "Deployment disabled");
        Ok(HandlerOutcome::compensated_by(Operation::new(
            names::DEPLOY,
            ctx.address().clone(),
        )))
    }

    fn describe(&self) -> OperationDescription {
        OperationDescription::new(
            names::UNDEPLOY,
            "Undeploy the content and mark the deployment disabled",
        )
    }
}

/// Registers server groups, deployments and the built-in processors
pub struct DeploymentExtension {
    service: Arc<DeploymentService>,
    mounter: Arc<dyn ArchiveMounter>,
}

impl DeploymentExtension {
    pub const NAME: &'static str = "deployment";

    pub fn new(service: Arc<DeploymentService>, mounter: Arc<dyn ArchiveMounter>) -> Self {
        Self { service, mounter }
    }
}

impl Extension for DeploymentExtension {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&self, ctx: &mut ExtensionContext<'_>) -> Result<(), RegistryError> {
        let group = PathAddress::new(vec![PathElement::wildcard(names::SERVER_GROUP)]);
        ctx.register_operation(
            group.clone(),
            names::ADD,
            Arc::new(ResourceAddHandler::permissive().describe_as("Add a server group")),
            OperationFlags::creates(),
        )?;
        ctx.register_operation(
            group,
            names::REMOVE,
            Arc::new(ServerGroupRemoveHandler),
            OperationFlags::mutating(),
        )?;

        let deployment = deployment_pattern();
        ctx.register_operation(
            deployment.clone(),
            names::ADD,
            Arc::new(DeploymentAddHandler),
            OperationFlags::creates(),
        )?;
        ctx.register_operation(
            deployment.clone(),
            names::REMOVE,
            Arc::new(DeploymentRemoveHandler),
            OperationFlags::mutating(),
        )?;
        ctx.register_operation(
            deployment.clone(),
            names::DEPLOY,
            Arc::new(DeployHandler::new(Arc::clone(&self.service))),
            OperationFlags::mutating(),
        )?;
        ctx.register_operation(
            deployment.clone(),
            names::UNDEPLOY,
            Arc::new(UndeployHandler::new(Arc::clone(&self.service))),
            OperationFlags::mutating(),
        )?;
        for definition in deployment_parameters() {
            ctx.register_attribute(deployment.clone(), definition, AttributeAccess::ReadOnly)?;
        }

        let pipeline = Arc::clone(self.service.pipeline());
        let mut registered: Vec<Arc<dyn Processor>> = Vec::new();
        for (phase, processor) in standard_processors(Arc::clone(&self.mounter)) {
            registered.push(Arc::clone(&processor));
            pipeline.register(phase, processor);
        }
        ctx.on_unload(move || {
            for processor in &registered {
                pipeline.unregister(processor);
            }
        });
        Ok(())
    }
}
