//! Keel Model - The hierarchical resource tree
//!
//! This crate owns the configuration tree that every management operation
//! reads and writes:
//!
//! - **Resource**: Attributes plus named child collections keyed by child type
//! - **ResourceTree**: Root-anchored tree with address resolution
//! - **Rebuild operations**: The add/write sequence that reconstructs a subtree
//!
//! Resources hold no pointer to their parent. Every traversal starts at the
//! root and parent context is supplied by the caller.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod resource;
pub mod serializer;
pub mod tree;

// Re-exports
pub use error::{ModelError, Result};
pub use resource::Resource;
pub use serializer::{
    descendants_from_value, descendants_value, operations_value, rebuild_operations, render,
    subtree_operations,
};
pub use tree::ResourceTree;
