//! Well-known operation, parameter and attribute names

// Operations
pub const ADD: &str = "add";
pub const REMOVE: &str = "remove";
pub const READ_RESOURCE: &str = "read-resource";
pub const READ_ATTRIBUTE: &str = "read-attribute";
pub const WRITE_ATTRIBUTE: &str = "write-attribute";
pub const READ_CHILDREN_NAMES: &str = "read-children-names";
pub const READ_OPERATION_NAMES: &str = "read-operation-names";
pub const DESCRIBE: &str = "describe";
pub const REPLACE_RESOURCE: &str = "replace-resource";
pub const ADD_HOST: &str = "add-host";
pub const DEPLOY: &str = "deploy";
pub const UNDEPLOY: &str = "undeploy";

// Parameters
pub const NAME: &str = "name";
pub const VALUE: &str = "value";
pub const RECURSIVE: &str = "recursive";
pub const CHILD_TYPE: &str = "child-type";
pub const ATTRIBUTES: &str = "attributes";
pub const IMPLICIT: &str = "implicit";
pub const DESCENDANTS: &str = "descendants";
pub const CRITERIA: &str = "criteria";

// Resource types
pub const HOST: &str = "host";
pub const INTERFACE: &str = "interface";
pub const SUBSYSTEM: &str = "subsystem";
pub const SERVER_GROUP: &str = "server-group";
pub const DEPLOYMENT: &str = "deployment";
