//! Phase-ordered processor execution

use crate::error::{DeploymentError, ProcessingError, Result};
use crate::phase::Phase;
use crate::processor::Processor;
use crate::unit::{DeploymentState, DeploymentUnit};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Processors by phase, in registration order within a phase
#[derive(Default)]
pub struct DeploymentPipeline {
    processors: RwLock<BTreeMap<Phase, Vec<Arc<dyn Processor>>>>,
}

impl DeploymentPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, phase: Phase, processor: Arc<dyn Processor>) {
        debug!(phase = %phase, processor = processor.name(), "Processor registered");
        self.processors.write().entry(phase).or_default().push(processor);
    }

    /// Remove this exact processor instance from every phase it was registered at.
    ///
    /// Other processors sharing its name stay registered. Returns whether
    /// anything was removed.
    pub fn unregister(&self, processor: &Arc<dyn Processor>) -> bool {
        let mut processors = self.processors.write();
        let mut removed = false;
        for list in processors.values_mut() {
            let before = list.len();
            list.retain(|p| !Arc::ptr_eq(p, processor));
            removed |= list.len() != before;
        }
        processors.retain(|_, list| !list.is_empty());
        if removed {
            debug!(processor = processor.name(), "Processor unregistered");
        }
        removed
    }

    /// `(phase, processor name)` in execution order
    pub fn processors(&self) -> Vec<(Phase, String)> {
        self.snapshot()
            .into_iter()
            .map(|(phase, p)| (phase, p.name().to_string()))
            .collect()
    }

    fn snapshot(&self) -> Vec<(Phase, Arc<dyn Processor>)> {
        self.processors
            .read()
            .iter()
            .flat_map(|(phase, list)| list.iter().map(move |p| (*phase, Arc::clone(p))))
            .collect()
    }

    /// Run every deploy step in phase order.
    ///
    /// Registrations made while a unit is deploying do not affect that run.
    /// On the first fault the remaining processors are skipped, every handle
    /// opened so far is closed, and the unit moves to `FailedAtPhase`.
    #[instrument(skip(self, unit), fields(unit = %unit.name()))]
    pub fn deploy(&self, unit: &mut DeploymentUnit) -> Result<()> {
        unit.set_state(DeploymentState::Admitted);
        for (phase, processor) in self.snapshot() {
            debug!(phase = %phase, processor = processor.name(), "Running deploy step");
            if let Err(e) = processor.deploy(unit) {
                warn!(
                    phase = %phase,
                    processor = processor.name(),
                    error = %e,
                    "Deployment processing failed"
                );
                // Cleanup failures are kept on the lifecycle manager for the caller
                let _ = unit.lifecycle_mut().close_all();
                unit.set_state(DeploymentState::FailedAtPhase(phase));
                return Err(DeploymentError::ProcessingFailed {
                    unit: unit.name().to_string(),
                    phase,
                    message: e.message,
                });
            }
            unit.executed.push((phase, processor));
        }
        unit.set_state(DeploymentState::Deployed);
        info!(processors = unit.executed.len(), "Deployment completed");
        Ok(())
    }

    /// Run the undeploy steps of the processors that executed, in reverse.
    ///
    /// A failing step is logged and the rest still run; handles are closed
    /// afterwards. Valid for failed units too. Returns the first failure.
    #[instrument(skip(self, unit), fields(unit = %unit.name(), state = %unit.state()))]
    pub fn undeploy(&self, unit: &mut DeploymentUnit) -> Result<()> {
        let executed = std::mem::take(&mut unit.executed);
        let mut first: Option<ProcessingError> = None;
        for (phase, processor) in executed.iter().rev() {
            debug!(phase = %phase, processor = processor.name(), "Running undeploy step");
            if let Err(e) = processor.undeploy(unit) {
                warn!(
                    phase = %phase,
                    processor = processor.name(),
                    error = %e,
                    "Undeploy step failed"
                );
                first.get_or_insert(e);
            }
        }

        let cleanup = unit.lifecycle_mut().close_all();
        unit.set_state(DeploymentState::Undeployed);

        if let Some(e) = first {
            return Err(DeploymentError::UndeployFailed {
                unit: unit.name().to_string(),
                message: e.message,
            });
        }
        cleanup?;
        info!("Deployment undeployed");
        Ok(())
    }
}

impl std::fmt::Debug for DeploymentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentPipeline")
            .field("processors", &self.processors())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::AttachmentKey;
    use crate::vfs::VirtualFile;

    const SEEN: AttachmentKey<Vec<String>> = AttachmentKey::new("seen");

    struct Marker(&'static str);

    impl Processor for Marker {
        fn name(&self) -> &str {
            self.0
        }

        fn deploy(&self, unit: &mut DeploymentUnit) -> std::result::Result<(), ProcessingError> {
            unit.attachments.add_to_list(&SEEN, self.0.to_string());
            Ok(())
        }

        fn undeploy(&self, unit: &mut DeploymentUnit) -> std::result::Result<(), ProcessingError> {
            if let Some(seen) = unit.attachments.get_mut(&SEEN) {
                seen.retain(|s| s != self.0);
            }
            Ok(())
        }
    }

    fn unit() -> DeploymentUnit {
        DeploymentUnit::new("app.war", "app.war", VirtualFile::directory())
    }

    #[test]
    fn test_deploy_undeploy_state_transitions() {
        let pipeline = DeploymentPipeline::new();
        pipeline.register(Phase::PARSE, Arc::new(Marker("parse")));
        pipeline.register(Phase::STRUCTURE, Arc::new(Marker("structure")));

        let mut unit = unit();
        assert_eq!(unit.state(), DeploymentState::Admitted);
        pipeline.deploy(&mut unit).unwrap();
        assert_eq!(unit.state(), DeploymentState::Deployed);
        assert_eq!(
            unit.attachments.get(&SEEN).unwrap(),
            &vec!["structure".to_string(), "parse".to_string()]
        );

        pipeline.undeploy(&mut unit).unwrap();
        assert_eq!(unit.state(), DeploymentState::Undeployed);
        assert!(unit.attachments.get(&SEEN).unwrap().is_empty());
        assert!(unit.executed_processors().is_empty());
    }

    #[test]
    fn test_unregister_removes_only_that_instance() {
        let pipeline = DeploymentPipeline::new();
        let ours: Arc<dyn Processor> = Arc::new(Marker("a"));
        let theirs: Arc<dyn Processor> = Arc::new(Marker("a"));
        pipeline.register(Phase(10), Arc::clone(&ours));
        pipeline.register(Phase(20), Arc::new(Marker("b")));
        pipeline.register(Phase(20), Arc::clone(&theirs));

        assert!(pipeline.unregister(&ours));
        assert_eq!(
            pipeline.processors(),
            vec![(Phase(20), "b".to_string()), (Phase(20), "a".to_string())]
        );
        assert!(!pipeline.unregister(&ours));
        assert!(pipeline.unregister(&theirs));
        assert_eq!(pipeline.processors(), vec![(Phase(20), "b".to_string())]);
    }
}
