//! Well-known operation, result and description keys

// Operation structure
pub const OP: &str = "operation";
pub const OP_ADDR: &str = "address";
pub const NAME: &str = "name";
pub const VALUE: &str = "value";
pub const STEPS: &str = "steps";
pub const RECURSIVE: &str = "recursive";

// Operation names
pub const ADD: &str = "add";
pub const REMOVE: &str = "remove";
pub const WRITE_ATTRIBUTE: &str = "write-attribute";
pub const UNDEFINE_ATTRIBUTE: &str = "undefine-attribute";
pub const READ_ATTRIBUTE: &str = "read-attribute";
pub const READ_RESOURCE: &str = "read-resource";
pub const READ_RESOURCE_DESCRIPTION: &str = "read-resource-description";
pub const COMPOSITE: &str = "composite";

// Results
pub const OUTCOME: &str = "outcome";
pub const SUCCESS: &str = "success";
pub const FAILED: &str = "failed";
pub const RESULT: &str = "result";
pub const FAILURE_DESCRIPTION: &str = "failure-description";

// Resource descriptions
pub const DESCRIPTION: &str = "description";
pub const ATTRIBUTES: &str = "attributes";
pub const TYPE: &str = "type";
pub const VALUE_TYPE: &str = "value-type";
pub const REQUIRED: &str = "required";
pub const NILLABLE: &str = "nillable";
pub const EXPRESSIONS_ALLOWED: &str = "expressions-allowed";
pub const ACCESS_TYPE: &str = "access-type";
pub const READ_ONLY: &str = "read-only";
pub const READ_WRITE: &str = "read-write";
pub const METRIC: &str = "metric";
pub const ALLOWED: &str = "allowed";
pub const MIN: &str = "min";
pub const MAX: &str = "max";
pub const DEFAULT: &str = "default";
pub const OPERATIONS: &str = "operations";
pub const OPERATION_NAME: &str = "operation-name";
pub const REQUEST_PROPERTIES: &str = "request-properties";
pub const REPLY_PROPERTIES: &str = "reply-properties";
pub const CHILDREN: &str = "children";
pub const MODEL_DESCRIPTION: &str = "model-description";
