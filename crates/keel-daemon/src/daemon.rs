//! Daemon setup and lifecycle management

use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::persister::{load_boot_file, JsonFilePersister};
use keel_controller::common::{CoreManagementExtension, LocalHostState};
use keel_controller::subsystems::PersistenceExtension;
use keel_controller::{
    ConfigurationPersister, Dispatcher, ExtensionRegistry, NullPersister, OperationRegistry,
};
use keel_deployment::management::{deployment_pattern, ENABLED, HASH};
use keel_deployment::{
    deployment_address, ContentRepository, DeploymentExtension, DeploymentPipeline,
    DeploymentService, DirectoryContentRepository, InMemoryContentRepository, MountTable,
};
use keel_types::{names, ModelValue, Operation, PathAddress, PathElement};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A booted management model with its deployment service
pub struct Daemon {
    config: DaemonConfig,
    dispatcher: Arc<Dispatcher>,
    extensions: ExtensionRegistry,
    service: Arc<DeploymentService>,
    mounts: MountTable,
    directory: Option<Arc<DirectoryContentRepository>>,
    persister: Option<Arc<JsonFilePersister>>,
}

impl Daemon {
    /// Build the dispatcher, load the extensions and open the content directory
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let directory = match &config.deployments.content_dir {
            Some(dir) => Some(Arc::new(DirectoryContentRepository::open(dir)?)),
            None => None,
        };
        let content: Arc<dyn ContentRepository> = match &directory {
            Some(directory) => directory.clone(),
            None => Arc::new(InMemoryContentRepository::new()),
        };

        let mounts = MountTable::new();
        let service =
            Arc::new(DeploymentService::new(Arc::new(DeploymentPipeline::new()), content));

        let registry = Arc::new(OperationRegistry::new());
        let extensions = ExtensionRegistry::new(Arc::clone(&registry));
        extensions.load(&CoreManagementExtension::new(Arc::new(LocalHostState::new())))?;
        extensions.load(&PersistenceExtension)?;
        extensions.load(&DeploymentExtension::new(Arc::clone(&service), Arc::new(mounts.clone())))?;

        let persister = match (&config.model.boot_file, config.model.persist) {
            (Some(path), true) => Some(Arc::new(JsonFilePersister::new(path))),
            _ => None,
        };
        let dispatcher = Dispatcher::builder()
            .with_registry(registry)
            .with_persister(match &persister {
                Some(p) => Arc::clone(p) as Arc<dyn ConfigurationPersister>,
                None => Arc::new(NullPersister),
            })
            .build()?;

        Ok(Self {
            config,
            dispatcher: Arc::new(dispatcher),
            extensions,
            service,
            mounts,
            directory,
            persister,
        })
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn deployments(&self) -> &Arc<DeploymentService> {
        &self.service
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Replay the boot file, then deploy what should be running.
    ///
    /// Replay stops at the first failed operation. Deployment failures are
    /// logged and do not stop the boot.
    pub fn boot(&self) -> DaemonResult<()> {
        let operations = match &self.config.model.boot_file {
            Some(path) => load_boot_file(path)?,
            None => Vec::new(),
        };
        info!(operations = operations.len(), "Replaying boot operations");

        let pattern = deployment_pattern();
        let mut enabled = Vec::new();
        for (index, operation) in operations.into_iter().enumerate() {
            let operation = if operation.name == names::ADD && operation.address.matches(&pattern) {
                // Running state is restored by deploy once the model is complete
                if operation.param(ENABLED).and_then(ModelValue::as_bool) == Some(true) {
                    enabled.push(operation.address.clone());
                }
                operation.with_param(ENABLED, false)
            } else {
                operation
            };
            let outcome = self.dispatcher.dispatch(&operation);
            if let Some(message) = outcome.failure_message() {
                return Err(DaemonError::Boot {
                    index,
                    operation: operation.name.clone(),
                    address: operation.address.to_string(),
                    message: message.to_string(),
                });
            }
        }

        if let Some(persister) = &self.persister {
            persister.arm();
        }

        for address in self.content_directory_deployments() {
            if !enabled.contains(&address) {
                enabled.push(address);
            }
        }
        for address in enabled {
            self.deploy(&address);
        }
        let model = self.render()?;
        debug!(model = %model, "Model booted");
        info!(deployed = self.service.deployed().len(), "Boot complete");
        Ok(())
    }

    /// Add content directory entries missing from the model; returns the
    /// ones to deploy
    fn content_directory_deployments(&self) -> Vec<PathAddress> {
        let Some(directory) = &self.directory else {
            return Vec::new();
        };
        if !self.config.deployments.deploy_on_boot {
            return Vec::new();
        }

        let group = &self.config.deployments.server_group;
        let group_address =
            PathAddress::new(vec![PathElement::new(names::SERVER_GROUP, group.as_str())]);
        if self.dispatcher.resource(&group_address).is_none() {
            let outcome = self.dispatcher.dispatch(&Operation::add(group_address));
            if let Some(message) = outcome.failure_message() {
                error!(server_group = %group, error = %message, "Failed to add server group");
                return Vec::new();
            }
        }

        let mut pending = Vec::new();
        for (name, hash) in directory.entries() {
            let address = deployment_address(group, &name);
            let enabled = self
                .dispatcher
                .resource(&address)
                .map(|existing| existing.attribute(ENABLED).and_then(ModelValue::as_bool));
            match enabled {
                Some(Some(true)) => {}
                Some(_) => pending.push(address),
                None => {
                    let outcome = self
                        .dispatcher
                        .dispatch(&Operation::add(address.clone()).with_param(HASH, hash));
                    match outcome.failure_message() {
                        None => pending.push(address),
                        Some(message) => {
                            warn!(deployment = %name, error = %message, "Failed to add deployment")
                        }
                    }
                }
            }
        }
        pending
    }

    fn deploy(&self, address: &PathAddress) {
        let outcome = self.dispatcher.dispatch(&Operation::new(names::DEPLOY, address.clone()));
        match outcome.failure_message() {
            None => info!(address = %address, "Deployment started"),
            Some(message) => error!(address = %address, error = %message, "Deployment failed"),
        }
    }

    /// Deterministic JSON rendering of the model
    pub fn render(&self) -> DaemonResult<String> {
        Ok(self.dispatcher.render()?)
    }

    /// Undeploy everything
    pub fn shutdown(&self) {
        info!("Keel daemon shutting down");
        let failures = self.service.undeploy_all();
        for failure in &failures {
            warn!(error = %failure, "Undeploy failed during shutdown");
        }
        info!(
            active_mounts = self.mounts.active_mounts(),
            failures = failures.len(),
            "Shutdown complete",
        );
    }

    /// Boot, wait for a shutdown signal unless `once`, then shut down
    pub async fn run(self, once: bool) -> DaemonResult<()> {
        let mut result = self.boot();
        if result.is_ok() {
            if once {
                match self.render() {
                    Ok(model) => println!("{}", model),
                    Err(e) => result = Err(e),
                }
            } else {
                shutdown_signal().await;
            }
        }
        self.shutdown();
        result
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
