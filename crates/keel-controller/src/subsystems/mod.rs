//! Subsystem extensions bundled with the controller

pub mod persistence;

pub use persistence::PersistenceExtension;
