//! # Keel Controller
//!
//! Operation registry, dispatcher and the compensating-operation protocol.
//!
//! ## Overview
//!
//! Every configuration change is an [`Operation`](keel_types::Operation)
//! routed through the [`Dispatcher`]. The dispatcher finds the most specific
//! handler registered for the target address, runs it against a staged copy
//! of the target resource, and commits the result. A mutating handler returns
//! the operation that undoes it; callers such as the
//! [`TransactionCoordinator`] decide whether to dispatch it.
//!
//! ## Key Components
//!
//! - [`OperationRegistry`]: Handlers bound to `(address pattern, operation)` pairs
//! - [`Dispatcher`]: The sole mutator of the resource tree
//! - [`OperationHandler`]: Contract every handler implements
//! - [`OperationContext`]: A handler's scoped view of its target resource
//! - [`ExtensionRegistry`]: Loads and unloads bundles of handlers
//! - [`TransactionCoordinator`]: All-or-nothing operation sequences
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use keel_controller::{
//!     common::{CoreManagementExtension, LocalHostState},
//!     Dispatcher, ExtensionRegistry, OperationRegistry,
//! };
//! use keel_types::{names, Operation};
//!
//! let registry = Arc::new(OperationRegistry::new());
//! ExtensionRegistry::new(registry.clone())
//!     .load(&CoreManagementExtension::new(Arc::new(LocalHostState::new())))
//!     .unwrap();
//! let dispatcher = Dispatcher::builder().with_registry(registry).build().unwrap();
//!
//! let add = Operation::add("/interface=public".parse().unwrap());
//! let outcome = dispatcher.dispatch(&add);
//! assert!(outcome.is_success());
//!
//! // Undo it
//! let undo = outcome.into_compensating_operation().unwrap();
//! assert_eq!(undo.name, names::REMOVE);
//! assert!(dispatcher.dispatch(&undo).is_success());
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod attributes;
pub mod authorization;
pub mod common;
pub mod compensation;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod extension;
pub mod handler;
pub mod handlers;
pub mod locks;
pub mod persistence;
pub mod registry;
pub mod subsystems;
pub mod transaction;

// Re-exports
pub use attributes::{validate_parameters, AttributeAccess, AttributeDefinition};
pub use authorization::{
    AllowAllAuthorizer, AuthorizationDecision, OperationAuthorizer, ReadOnlyAuthorizer,
};
pub use context::{OperationContext, RequestContext};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{OperationFailure, RegistryError, Result};
pub use extension::{Extension, ExtensionContext, ExtensionRegistry};
pub use handlers::{AddMode, ResourceAddHandler, ResourceRemoveHandler};
pub use handler::{
    EntryType, HandlerOutcome, OperationDescription, OperationFlags, OperationHandler,
};
pub use locks::{SubtreeGuard, SubtreeLockManager};
pub use persistence::{ConfigurationPersister, InMemoryPersister, NullPersister, PersistError};
pub use registry::{OperationEntry, OperationRegistry};
pub use transaction::{TransactionCoordinator, TransactionOutcome};
