//! Archive mounting
//!
//! Mounting turns an archive into a browsable directory and yields a handle
//! that must be closed to release the mount.

use crate::error::{CleanupError, MountError};
use crate::lifecycle::MountHandle;
use crate::vfs::VirtualFile;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A mounted archive
pub struct Mount {
    /// Directory view of the archive's entries
    pub root: VirtualFile,
    pub handle: Box<dyn MountHandle>,
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount").field("root", &self.root).finish_non_exhaustive()
    }
}

pub trait ArchiveMounter: Send + Sync {
    fn mount(&self, path: &str, file: &VirtualFile) -> Result<Mount, MountError>;
}

/// Mounter that records every active mount
///
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    active: Arc<DashMap<u64, String>>,
    next_id: Arc<AtomicU64>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mounts not yet closed
    pub fn active_mounts(&self) -> usize {
        self.active.len()
    }

    pub fn is_mounted(&self, path: &str) -> bool {
        self.active.iter().any(|entry| entry.value() == path)
    }

    /// Paths of the active mounts, sorted
    pub fn mounted_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.active.iter().map(|e| e.value().clone()).collect();
        paths.sort();
        paths
    }
}

impl ArchiveMounter for MountTable {
    fn mount(&self, path: &str, file: &VirtualFile) -> Result<Mount, MountError> {
        let entries = match file {
            VirtualFile::Archive(entries) | VirtualFile::Directory(entries) => entries.clone(),
            VirtualFile::File(_) => return Err(MountError::NotAnArchive(path.to_string())),
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.active.insert(id, path.to_string());
        debug!(path = %path, mount = id, "Archive mounted");
        Ok(Mount {
            root: VirtualFile::Directory(entries),
            handle: Box::new(TableHandle {
                id,
                path: path.to_string(),
                table: Arc::clone(&self.active),
            }),
        })
    }
}

struct TableHandle {
    id: u64,
    path: String,
    table: Arc<DashMap<u64, String>>,
}

impl MountHandle for TableHandle {
    fn close(&mut self) -> Result<(), CleanupError> {
        match self.table.remove(&self.id) {
            Some(_) => {
                debug!(path = %self.path, mount = self.id, "Archive unmounted");
                Ok(())
            }
            None => Err(CleanupError::new(&self.path, "mount is already closed")),
        }
    }
}
