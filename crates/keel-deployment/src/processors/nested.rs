//! Mounts archives nested in the deployment root

use crate::attachment::AttachmentKey;
use crate::error::ProcessingError;
use crate::mount::ArchiveMounter;
use crate::processor::Processor;
use crate::processors::root::DEPLOYMENT_ROOT;
use crate::unit::DeploymentUnit;
use crate::vfs::VirtualFile;
use std::sync::Arc;
use tracing::{debug, warn};

/// A nested archive mounted during deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedMount {
    /// Path relative to the deployment root
    pub path: String,
    pub root: VirtualFile,
}

pub const NESTED_MOUNTS: AttachmentKey<Vec<NestedMount>> = AttachmentKey::new("nested-mounts");

const NESTED_SUFFIX: &str = ".jar";

/// Finds `.jar` entries reachable from the root without entering another
/// archive, and mounts each of them
///
/// Archives inside a nested archive are left for whoever scans that archive
/// after it is mounted. An entry that fails to mount is skipped.
pub struct NestedArchiveProcessor {
    mounter: Arc<dyn ArchiveMounter>,
}

impl NestedArchiveProcessor {
    pub const NAME: &'static str = "nested-archive";

    pub fn new(mounter: Arc<dyn ArchiveMounter>) -> Self {
        Self { mounter }
    }
}

/// Paths of the nested archive candidates below `root`
pub fn nested_archive_paths(root: &VirtualFile) -> Vec<String> {
    let mut found = Vec::new();
    root.visit_leaves(&mut |path, _| {
        if path.ends_with(NESTED_SUFFIX) {
            found.push(path.to_string());
        }
    });
    found
}

impl Processor for NestedArchiveProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn deploy(&self, unit: &mut DeploymentUnit) -> Result<(), ProcessingError> {
        let root = unit
            .attachments
            .get(&DEPLOYMENT_ROOT)
            .cloned()
            .ok_or_else(|| {
                ProcessingError::new(format!("Deployment root is not mounted for {}", unit.name()))
            })?;

        let mut mounts = Vec::new();
        for path in nested_archive_paths(&root) {
            let Some(file) = root.lookup(&path) else {
                continue;
            };
            match self.mounter.mount(&path, file) {
                Ok(mount) => {
                    debug!(unit = %unit.name(), path = %path, "Nested archive mounted");
                    unit.register_handle(path.clone(), mount.handle);
                    mounts.push(NestedMount {
                        path,
                        root: mount.root,
                    });
                }
                Err(e) => {
                    warn!(
                        unit = %unit.name(),
                        path = %path,
                        error = %e,
                        "Failed to mount nested archive"
                    );
                }
            }
        }
        unit.attachments.put(&NESTED_MOUNTS, mounts);
        Ok(())
    }

    fn undeploy(&self, unit: &mut DeploymentUnit) -> Result<(), ProcessingError> {
        unit.attachments.remove(&NESTED_MOUNTS);
        Ok(())
    }
}
