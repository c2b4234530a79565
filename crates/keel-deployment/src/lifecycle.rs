//! Ownership of external resources opened while deploying a unit
//!
//! Every handle a processor opens is registered here before its deploy step
//! returns. `close_all` closes them all, whichever processor opened them, and
//! keeps going past a handle that fails to close.

use crate::error::CleanupError;
use std::fmt;
use tracing::{debug, error, instrument, warn};

/// An opened resource that must be closed explicitly
pub trait MountHandle: Send + Sync {
    fn close(&mut self) -> Result<(), CleanupError>;
}

/// Per-unit registry of open handles
#[derive(Default)]
pub struct LifecycleManager {
    unit: String,
    handles: Vec<(String, Box<dyn MountHandle>)>,
    failures: Vec<CleanupError>,
}

impl LifecycleManager {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            ..Self::default()
        }
    }

    /// Take ownership of `handle`, opened for the unit-relative `path`
    pub fn register_handle(&mut self, path: impl Into<String>, handle: Box<dyn MountHandle>) {
        let path = path.into();
        debug!(unit = %self.unit, path = %path, "Handle registered");
        self.handles.push((path, handle));
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.handles.iter().map(|(path, _)| path.as_str()).collect()
    }

    /// Close every registered handle, most recent first.
    ///
    /// All handles are closed even when some fail; the first failure is
    /// returned and every failure is kept for [`take_failures`](Self::take_failures).
    /// The registry is drained, so a second call is a no-op.
    #[instrument(skip(self), fields(unit = %self.unit, handles = self.handles.len()))]
    pub fn close_all(&mut self) -> Result<(), CleanupError> {
        let mut failures = Vec::new();
        while let Some((path, mut handle)) = self.handles.pop() {
            match handle.close() {
                Ok(()) => debug!(path = %path, "Handle closed"),
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to close handle");
                    failures.push(e);
                }
            }
        }

        let first = failures.first().cloned();
        if !failures.is_empty() {
            error!(
                unit = %self.unit,
                failed = failures.len(),
                "Cleanup completed with errors"
            );
        }
        self.failures.extend(failures);
        first.map_or(Ok(()), Err)
    }

    /// Close failures recorded since the last call
    pub fn take_failures(&mut self) -> Vec<CleanupError> {
        std::mem::take(&mut self.failures)
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("unit", &self.unit)
            .field("handles", &self.paths())
            .field("failures", &self.failures.len())
            .finish()
    }
}
