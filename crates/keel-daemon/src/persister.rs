//! Boot file persistence

use crate::error::{DaemonError, DaemonResult};
use keel_controller::{ConfigurationPersister, PersistError};
use keel_types::Operation;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Read the operations of a boot file; a missing file is an empty model
pub fn load_boot_file(path: &Path) -> DaemonResult<Vec<Operation>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| DaemonError::BootFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Rewrites the boot file with the rebuild operations of the model
///
/// Writes go to a sibling temporary file that is then renamed over the boot
/// file. The persister starts disarmed so that replaying the boot file does
/// not rewrite it with a partial model.
#[derive(Debug)]
pub struct JsonFilePersister {
    path: PathBuf,
    armed: AtomicBool,
}

impl JsonFilePersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start writing on the next persist
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    fn write(&self, operations: &[Operation]) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(operations)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }
}

impl ConfigurationPersister for JsonFilePersister {
    fn persist(&self, operations: &[Operation]) -> Result<(), PersistError> {
        if !self.armed.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.write(operations).map_err(PersistError::new)?;
        debug!(path = %self.path.display(), operations = operations.len(), "Boot file written");
        Ok(())
    }
}
