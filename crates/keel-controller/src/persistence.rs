//! Configuration persistence seam
//!
//! Durable storage is pluggable. After every successful mutation the
//! dispatcher hands the persister the operation sequence that rebuilds the
//! whole model; what it does with them is its own business.

use keel_types::Operation;
use parking_lot::Mutex;

/// Stores the rebuild operations of the model
pub trait ConfigurationPersister: Send + Sync {
    fn persist(&self, operations: &[Operation]) -> Result<(), PersistError>;
}

/// Failure reported by a persister
#[derive(Debug, thiserror::Error)]
#[error("Failed to persist configuration: {0}")]
pub struct PersistError(pub String);

impl PersistError {
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersister;

impl ConfigurationPersister for NullPersister {
    fn persist(&self, _operations: &[Operation]) -> Result<(), PersistError> {
        Ok(())
    }
}

/// Keeps the last persisted snapshot in memory
#[derive(Debug, Default)]
pub struct InMemoryPersister {
    snapshot: Mutex<Vec<Operation>>,
    writes: Mutex<usize>,
}

impl InMemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Operation> {
        self.snapshot.lock().clone()
    }

    /// How many times `persist` has been called
    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }
}

impl ConfigurationPersister for InMemoryPersister {
    fn persist(&self, operations: &[Operation]) -> Result<(), PersistError> {
        *self.snapshot.lock() = operations.to_vec();
        *self.writes.lock() += 1;
        Ok(())
    }
}
