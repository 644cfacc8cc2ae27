//! Management model primitives
//!
//! Tree-structured configuration values and the vocabulary used to address
//! and mutate them.
//!
//! # Core Concepts
//!
//! - [`ModelNode`]: Model tree with an explicit undefined marker
//! - [`PathAddress`]: Hierarchical resource addressing with wildcards
//! - [`Operation`]: Management operation addressed at a resource
//! - [`OperationResult`]: Outcome of executing an operation
//! - [`ModelVersion`]: Management model version of a legacy kernel
//! - [`compare`]: Structural comparison with undefined-value tolerance
//!
//! # Example
//!
//! ```rust
//! use modeltest_model::{compare, CompareOptions, ModelNode};
//!
//! let current = ModelNode::object()
//!     .with("level", "INFO")
//!     .with("filter-spec", ModelNode::Undefined);
//! let legacy = ModelNode::object().with("level", "INFO");
//!
//! assert!(compare(&current, &legacy, CompareOptions::ignoring_undefined()).is_ok());
//! assert!(compare(&current, &legacy, CompareOptions::strict()).is_err());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod compare;
mod expression;
mod node;
mod operation;
mod outcome;
mod path;
mod version;

/// Well-known keys
pub mod keys;

// Re-exports
pub use compare::{compare, trim_undefined_children, CompareError, CompareOptions};
pub use expression::{
    is_expression, resolve_expression, resolve_node, ExpressionError, ExpressionResolver,
    PropertyResolver,
};
pub use node::{ModelError, ModelNode, ModelType};
pub use operation::{Operation, OperationError};
pub use outcome::{OperationResult, Outcome, OutcomeError};
pub use path::{PathAddress, PathElement, PathError, WILDCARD};
pub use version::{ModelVersion, VersionError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
