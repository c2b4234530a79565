//! Mounts the deployment content

use crate::attachment::AttachmentKey;
use crate::error::ProcessingError;
use crate::mount::ArchiveMounter;
use crate::processor::Processor;
use crate::unit::DeploymentUnit;
use crate::vfs::VirtualFile;
use std::sync::Arc;
use tracing::debug;

/// Directory view of the mounted deployment content
pub const DEPLOYMENT_ROOT: AttachmentKey<VirtualFile> = AttachmentKey::new("deployment-root");

pub struct DeploymentRootMountProcessor {
    mounter: Arc<dyn ArchiveMounter>,
}

impl DeploymentRootMountProcessor {
    pub const NAME: &'static str = "deployment-root-mount";

    pub fn new(mounter: Arc<dyn ArchiveMounter>) -> Self {
        Self { mounter }
    }
}

impl Processor for DeploymentRootMountProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn deploy(&self, unit: &mut DeploymentUnit) -> Result<(), ProcessingError> {
        let mount = self.mounter.mount(unit.runtime_name(), unit.content())?;
        unit.register_handle("", mount.handle);
        unit.attachments.put(&DEPLOYMENT_ROOT, mount.root);
        debug!(unit = %unit.name(), "Deployment root mounted");
        Ok(())
    }

    fn undeploy(&self, unit: &mut DeploymentUnit) -> Result<(), ProcessingError> {
        unit.attachments.remove(&DEPLOYMENT_ROOT);
        Ok(())
    }
}
