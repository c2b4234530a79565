//! Deployment units by name

use crate::content::ContentRepository;
use crate::error::{DeploymentError, Result};
use crate::pipeline::DeploymentPipeline;
use crate::unit::{DeploymentState, DeploymentUnit};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use keel_types::{EventSource, ManagementEvent, ManagementEventEnvelope};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Runs units through the pipeline and keeps them until undeploy
///
/// Each unit sits behind its own mutex; the table lock is never held while
/// a pipeline runs, so distinct units deploy concurrently.
pub struct DeploymentService {
    pipeline: Arc<DeploymentPipeline>,
    content: Arc<dyn ContentRepository>,
    units: DashMap<String, Arc<Mutex<DeploymentUnit>>>,
    event_tx: broadcast::Sender<ManagementEventEnvelope>,
}

impl DeploymentService {
    pub fn new(pipeline: Arc<DeploymentPipeline>, content: Arc<dyn ContentRepository>) -> Self {
        let (event_tx, _) = broadcast::channel(4096);
        Self {
            pipeline,
            content,
            units: DashMap::new(),
            event_tx,
        }
    }

    pub fn pipeline(&self) -> &Arc<DeploymentPipeline> {
        &self.pipeline
    }

    pub fn content(&self) -> &Arc<dyn ContentRepository> {
        &self.content
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagementEventEnvelope> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: ManagementEvent, source: EventSource) {
        let _ = self.event_tx.send(ManagementEventEnvelope::new(event, source));
    }

    fn emit_cleanup_failures(&self, unit: &mut DeploymentUnit) {
        for failure in unit.lifecycle_mut().take_failures() {
            self.emit(
                ManagementEvent::CleanupFailed {
                    unit: unit.name().to_string(),
                    path: failure.path,
                    message: failure.message,
                },
                EventSource::Lifecycle,
            );
        }
    }

    /// Deploy the content stored under `hash` as unit `name`.
    ///
    /// A unit left behind by a failed or interrupted attempt is torn down
    /// first. A failed unit stays registered, so its state can be inspected,
    /// until it is undeployed or deployed again.
    pub fn deploy(&self, name: &str, runtime_name: &str, hash: &str) -> Result<()> {
        let content = self.content.get(hash)?;
        let unit = Arc::new(Mutex::new(DeploymentUnit::new(name, runtime_name, content)));

        // Hold the new unit's lock before publishing it so no one else can run it
        let mut guard = unit.lock();
        let stale = match self.units.entry(name.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&unit));
                None
            }
            Entry::Occupied(mut entry) => {
                let state = match entry.get().try_lock() {
                    Some(existing) => existing.state(),
                    None => return Err(DeploymentError::InProgress(name.to_string())),
                };
                if state == DeploymentState::Deployed {
                    return Err(DeploymentError::AlreadyDeployed(name.to_string()));
                }
                Some(entry.insert(Arc::clone(&unit)))
            }
        };

        if let Some(stale) = stale {
            let mut stale = stale.lock();
            if let Err(e) = self.pipeline.undeploy(&mut stale) {
                warn!(unit = %name, error = %e, "Cleanup of previous attempt failed");
            }
            self.emit_cleanup_failures(&mut stale);
        }

        self.emit(
            ManagementEvent::DeploymentStarted { unit: name.to_string() },
            EventSource::Deployment,
        );
        let result = self.pipeline.deploy(&mut guard);
        self.emit_cleanup_failures(&mut guard);
        match &result {
            Ok(()) => {
                info!(unit = %name, runtime_name = %runtime_name, "Deployed");
                self.emit(
                    ManagementEvent::DeploymentCompleted { unit: name.to_string() },
                    EventSource::Deployment,
                );
            }
            Err(DeploymentError::ProcessingFailed { phase, message, .. }) => {
                self.emit(
                    ManagementEvent::DeploymentFailed {
                        unit: name.to_string(),
                        phase: phase.value(),
                        message: message.clone(),
                    },
                    EventSource::Deployment,
                );
            }
            Err(_) => {}
        }
        result
    }

    /// Tear unit `name` down and forget it
    pub fn undeploy(&self, name: &str) -> Result<()> {
        let (_, unit) = self
            .units
            .remove(name)
            .ok_or_else(|| DeploymentError::UnknownDeployment(name.to_string()))?;
        let mut unit = unit.lock();
        let result = self.pipeline.undeploy(&mut unit);
        self.emit_cleanup_failures(&mut unit);
        self.emit(
            ManagementEvent::DeploymentUndeployed { unit: name.to_string() },
            EventSource::Deployment,
        );
        info!(unit = %name, "Undeployed");
        result
    }

    /// State of unit `name`; `Admitted` while its pipeline is running
    pub fn status(&self, name: &str) -> Option<DeploymentState> {
        let unit = self.units.get(name).map(|entry| Arc::clone(entry.value()))?;
        let state = unit.try_lock().map_or(DeploymentState::Admitted, |u| u.state());
        Some(state)
    }

    /// Names of the units that reached `Deployed`, sorted
    pub fn deployed(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .units
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .try_lock()
                    .is_some_and(|u| u.state() == DeploymentState::Deployed)
            })
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Undeploy every unit, in reverse name order; returns the failures
    pub fn undeploy_all(&self) -> Vec<DeploymentError> {
        let mut names: Vec<String> = self.units.iter().map(|e| e.key().clone()).collect();
        names.sort();
        let mut failures = Vec::new();
        for name in names.into_iter().rev() {
            match self.undeploy(&name) {
                Ok(()) | Err(DeploymentError::UnknownDeployment(_)) => {}
                Err(e) => {
                    warn!(unit = %name, error = %e, "Undeploy failed");
                    failures.push(e);
                }
            }
        }
        failures
    }
}

impl std::fmt::Debug for DeploymentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentService")
            .field("pipeline", &self.pipeline)
            .field("units", &self.units.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContentRepository;
    use crate::mount::MountTable;
    use crate::processors::{standard_processors, NESTED_MOUNTS};
    use crate::vfs::VirtualFile;

    fn service() -> (DeploymentService, Arc<InMemoryContentRepository>, MountTable) {
        let mounts = MountTable::new();
        let pipeline = Arc::new(DeploymentPipeline::new());
        for (phase, processor) in standard_processors(Arc::new(mounts.clone())) {
            pipeline.register(phase, processor);
        }
        let content = Arc::new(InMemoryContentRepository::new());
        let service = DeploymentService::new(pipeline, content.clone());
        (service, content, mounts)
    }

    fn app() -> VirtualFile {
        VirtualFile::archive().with_entry(
            "lib",
            VirtualFile::directory()
                .with_entry("a.jar", VirtualFile::archive())
                .with_entry("b.jar", VirtualFile::archive()),
        )
    }

    #[test]
    fn test_deploy_and_undeploy() {
        let (service, content, mounts) = service();
        let hash = content.add(app()).unwrap();
        let mut events = service.subscribe();

        service.deploy("app.war", "app.war", &hash).unwrap();
        assert_eq!(service.status("app.war"), Some(DeploymentState::Deployed));
        assert_eq!(service.deployed(), vec!["app.war".to_string()]);
        assert_eq!(mounts.active_mounts(), 3);
        assert!(matches!(
            service.deploy("app.war", "app.war", &hash),
            Err(DeploymentError::AlreadyDeployed(_))
        ));

        service.undeploy("app.war").unwrap();
        assert_eq!(mounts.active_mounts(), 0);
        assert_eq!(service.status("app.war"), None);

        let kinds: Vec<String> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| format!("{:?}", e.event).split(' ').next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            kinds,
            vec!["DeploymentStarted", "DeploymentCompleted", "DeploymentUndeployed"]
        );
    }

    #[test]
    fn test_unknown_content_and_unit() {
        let (service, _, _) = service();
        assert!(matches!(
            service.deploy("x.jar", "x.jar", "nope"),
            Err(DeploymentError::Content(_))
        ));
        assert_eq!(service.status("x.jar"), None);
        assert!(matches!(
            service.undeploy("x.jar"),
            Err(DeploymentError::UnknownDeployment(_))
        ));
    }

    #[test]
    fn test_failed_unit_is_replaced_by_next_attempt() {
        let (service, content, mounts) = service();
        let broken = app().with_entry(
            "META-INF",
            VirtualFile::directory().with_entry("keel-deployment.json", VirtualFile::file("{")),
        );
        let broken_hash = content.add(broken).unwrap();
        let err = service.deploy("app.war", "app.war", &broken_hash).unwrap_err();
        assert!(matches!(err, DeploymentError::ProcessingFailed { .. }));
        assert_eq!(
            service.status("app.war"),
            Some(DeploymentState::FailedAtPhase(crate::phase::Phase::PARSE))
        );
        assert_eq!(mounts.active_mounts(), 0);

        let hash = content.add(app()).unwrap();
        service.deploy("app.war", "app.war", &hash).unwrap();
        assert_eq!(service.status("app.war"), Some(DeploymentState::Deployed));
        assert_eq!(mounts.active_mounts(), 3);

        assert!(service.undeploy_all().is_empty());
        assert_eq!(mounts.active_mounts(), 0);
    }

    #[test]
    fn test_nested_mounts_attached() {
        let (_, _, mounts) = service();
        let pipeline = DeploymentPipeline::new();
        for (phase, processor) in standard_processors(Arc::new(mounts.clone())) {
            pipeline.register(phase, processor);
        }
        let mut unit = DeploymentUnit::new("app.war", "app.war", app());
        pipeline.deploy(&mut unit).unwrap();
        let nested: Vec<&str> = unit
            .attachments
            .get(&NESTED_MOUNTS)
            .unwrap()
            .iter()
            .map(|m| m.path.as_str())
            .collect();
        assert_eq!(nested, vec!["lib/a.jar", "lib/b.jar"]);
        pipeline.undeploy(&mut unit).unwrap();
        assert!(!unit.attachments.contains(&NESTED_MOUNTS));
    }
}
