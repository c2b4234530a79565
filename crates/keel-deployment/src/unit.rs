//! Deployment units

use crate::attachment::Attachments;
use crate::lifecycle::{LifecycleManager, MountHandle};
use crate::phase::Phase;
use crate::processor::Processor;
use crate::vfs::VirtualFile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where a unit is in its pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    Admitted,
    Deployed,
    FailedAtPhase(Phase),
    Undeployed,
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admitted => write!(f, "admitted"),
            Self::Deployed => write!(f, "deployed"),
            Self::FailedAtPhase(phase) => write!(f, "failed at phase {}", phase),
            Self::Undeployed => write!(f, "undeployed"),
        }
    }
}

/// One artifact travelling through the phase pipeline
///
/// The unit owns its attachments and every handle its processors opened.
/// Processors of one unit run sequentially, so nothing here is locked.
pub struct DeploymentUnit {
    name: String,
    runtime_name: String,
    content: VirtualFile,
    pub attachments: Attachments,
    lifecycle: LifecycleManager,
    state: DeploymentState,
    pub(crate) executed: Vec<(Phase, Arc<dyn Processor>)>,
}

impl DeploymentUnit {
    pub fn new(
        name: impl Into<String>,
        runtime_name: impl Into<String>,
        content: VirtualFile,
    ) -> Self {
        let name = name.into();
        Self {
            lifecycle: LifecycleManager::new(name.clone()),
            name,
            runtime_name: runtime_name.into(),
            content,
            attachments: Attachments::new(),
            state: DeploymentState::Admitted,
            executed: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runtime_name(&self) -> &str {
        &self.runtime_name
    }

    /// The unmounted deployment content
    pub fn content(&self) -> &VirtualFile {
        &self.content
    }

    pub fn state(&self) -> DeploymentState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: DeploymentState) {
        self.state = state;
    }

    /// Hand an opened resource to the unit's lifecycle manager
    pub fn register_handle(&mut self, path: impl Into<String>, handle: Box<dyn MountHandle>) {
        self.lifecycle.register_handle(path, handle);
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut LifecycleManager {
        &mut self.lifecycle
    }

    /// Names of the processors whose deploy step completed, in run order
    pub fn executed_processors(&self) -> Vec<(Phase, String)> {
        self.executed
            .iter()
            .map(|(phase, processor)| (*phase, processor.name().to_string()))
            .collect()
    }
}

impl fmt::Debug for DeploymentUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentUnit")
            .field("name", &self.name)
            .field("runtime_name", &self.runtime_name)
            .field("state", &self.state)
            .field("attachments", &self.attachments)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}
