//! Model Test Kernel
//!
//! The [`ModelExecutor`] interface the replay engine drives, and an
//! in-memory implementation of it.
//!
//! # Architecture
//!
//! 1. **Definitions**: a [`ResourceRegistry`] per model version describes
//!    resource types, attributes and constraints
//! 2. **Execution**: an [`InMemoryKernel`] validates and applies operations
//!    against its registry
//! 3. **Transformation**: a current kernel binds each legacy kernel with a
//!    [`TransformerRegistry`] mapping operations and model state onto that
//!    version
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use modeltest_kernel::prelude::*;
//! use modeltest_model::{ModelType, ModelVersion, Operation, PathAddress, PathElement};
//!
//! let registry = || {
//!     ResourceRegistry::new(ResourceDefinition::new("root").with_child(
//!         PathElement::new("subsystem", "logging"),
//!         ResourceDefinition::new("logging")
//!             .with_attribute(AttributeDefinition::new("add-logging-api-dependencies", ModelType::Boolean)),
//!     ))
//! };
//! let legacy = Arc::new(InMemoryKernel::new(ModelVersion::new(1, 2, 0), registry()));
//! let current = InMemoryKernel::builder(ModelVersion::new(3, 0, 0), registry())
//!     .with_legacy(legacy, TransformerRegistry::new())
//!     .build();
//!
//! let add = Operation::add(PathAddress::single("subsystem", "logging"));
//! assert!(current.execute(&add).unwrap().is_success());
//!
//! let transformed = current.transform_operation(ModelVersion::new(1, 2, 0), &add).unwrap();
//! assert!(current
//!     .execute_transformed(ModelVersion::new(1, 2, 0), &transformed)
//!     .unwrap()
//!     .is_success());
//! current.shutdown();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod executor;
pub mod memory;
pub mod registry;
pub mod transformer;

// Re-exports
pub use error::KernelError;
pub use executor::{ModelExecutor, RejectionPolicy, TransformedOperation};
pub use memory::{InMemoryKernel, InMemoryKernelBuilder};
pub use registry::{AccessType, AttributeDefinition, ResourceDefinition, ResourceRegistry};
pub use transformer::{
    AttributeTransformer, ResourceTransformer, TransformerRegistry, ValueConverter,
    ValuePredicate,
};

/// Commonly used kernel types
pub mod prelude {
    pub use crate::error::KernelError;
    pub use crate::executor::{ModelExecutor, TransformedOperation};
    pub use crate::memory::{InMemoryKernel, InMemoryKernelBuilder};
    pub use crate::registry::{
        AccessType, AttributeDefinition, ResourceDefinition, ResourceRegistry,
    };
    pub use crate::transformer::{AttributeTransformer, ResourceTransformer, TransformerRegistry};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
