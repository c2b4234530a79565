//! Built-in operation handlers

pub mod global;
pub mod resource;

pub use global::{
    register_globals, DescribeHandler, ReadAttributeHandler, ReadChildrenNamesHandler,
    ReadOperationNamesHandler, ReadResourceHandler, ReplaceResourceHandler, WriteAttributeHandler,
};
pub use resource::{
    commit_add, prepare_add, remove_resource, requested_implicit, AddMode, ResourceAddHandler,
    ResourceRemoveHandler,
};
