//! Keel Types - Core types for the management model
//!
//! Keel is the management and deployment core of a clustered application
//! runtime. Configuration lives in a hierarchical resource tree that is only
//! ever changed through addressed operations, and every mutating operation
//! hands back the operation that undoes it.
//!
//! ## Key Concepts
//!
//! - **PathAddress**: Ordered `(key, value)` path from the model root to a resource
//! - **ModelValue**: Typed attribute and parameter values
//! - **Operation**: A named, addressed request carrying parameters
//! - **OperationOutcome**: Success with an optional compensating operation, or a failure message
//! - **Events**: Audit stream of model and deployment activity

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod address;
pub mod events;
pub mod names;
pub mod operation;
pub mod value;

// Re-export main types
pub use address::{AddressParseError, PathAddress, PathElement, WILDCARD};
pub use events::{EventSeverity, EventSource, ManagementEvent, ManagementEventEnvelope};
pub use operation::{Operation, OperationOutcome};
pub use value::{ModelType, ModelValue};
