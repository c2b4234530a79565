//! # Keel Deployment
//!
//! Phase pipeline that turns deployment content into running state.
//!
//! ## Overview
//!
//! A [`DeploymentUnit`] is passed through every registered [`Processor`] in
//! ascending [`Phase`] order. Processors hand metadata to later phases
//! through the unit's typed [`Attachments`], and register every resource they
//! open (archive mounts) with the unit's [`LifecycleManager`], which closes
//! all of them on failure or undeploy.
//!
//! ## Key Components
//!
//! - [`DeploymentPipeline`]: Phase-ordered deploy, reverse-ordered undeploy
//! - [`Attachments`]: Type-scoped per-unit metadata
//! - [`LifecycleManager`]: Closes every registered handle, even past failures
//! - [`MountTable`]: Archive mounter tracking active mounts
//! - [`DeploymentService`]: Units by name, deployed concurrently
//! - [`DeploymentExtension`]: `deploy` / `undeploy` management operations
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use keel_deployment::{
//!     processors::standard_processors, DeploymentPipeline, DeploymentState, DeploymentUnit,
//!     MountTable, VirtualFile,
//! };
//!
//! let mounts = MountTable::new();
//! let pipeline = DeploymentPipeline::new();
//! for (phase, processor) in standard_processors(Arc::new(mounts.clone())) {
//!     pipeline.register(phase, processor);
//! }
//!
//! let content = VirtualFile::archive().with_entry("util.jar", VirtualFile::archive());
//! let mut unit = DeploymentUnit::new("app.war", "app.war", content);
//! pipeline.deploy(&mut unit).unwrap();
//! assert_eq!(unit.state(), DeploymentState::Deployed);
//! assert_eq!(mounts.active_mounts(), 2);
//!
//! pipeline.undeploy(&mut unit).unwrap();
//! assert_eq!(mounts.active_mounts(), 0);
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod attachment;
pub mod content;
pub mod error;
pub mod lifecycle;
pub mod management;
pub mod mount;
pub mod phase;
pub mod pipeline;
pub mod processor;
pub mod processors;
pub mod service;
pub mod unit;
pub mod vfs;

// Re-exports
pub use attachment::{AttachmentKey, Attachments};
pub use content::{
    content_hash, ContentRepository, DirectoryContentRepository, InMemoryContentRepository,
};
pub use error::{CleanupError, ContentError, DeploymentError, MountError, ProcessingError, Result};
pub use lifecycle::{LifecycleManager, MountHandle};
pub use management::{deployment_address, DeploymentExtension};
pub use mount::{ArchiveMounter, Mount, MountTable};
pub use phase::Phase;
pub use pipeline::DeploymentPipeline;
pub use processor::Processor;
pub use service::DeploymentService;
pub use unit::{DeploymentState, DeploymentUnit};
pub use vfs::VirtualFile;
