//! Model Test Policies
//!
//! Declarative expectations about how legacy model versions treat
//! operations, and validation of operations against resource descriptions.
//!
//! # Core Concepts
//!
//! - [`CorrectionPolicy`]: Per-address table of rejected, discarded and
//!   correctable operations
//! - [`AttributeCheck`]: Attribute level rejection with a corrector
//! - [`OperationValidationFilter`]: Skip, resolve or fix operations before
//!   validation
//! - [`ModelDescriptionValidator`]: Well-formedness of resource descriptions
//! - [`OperationValidator`]: Operation parameters against a description
//!
//! # Example
//!
//! ```rust
//! use modeltest_model::{ModelNode, Operation};
//! use modeltest_policy::{AttributesRule, CorrectionPolicy, RejectExpressions};
//!
//! let policy = CorrectionPolicy::no_failures().with_attributes(
//!     "/subsystem=logging/console-handler=*".parse().unwrap(),
//!     AttributesRule::new().with_check("level", RejectExpressions::new()),
//! );
//!
//! let op = Operation::add("/subsystem=logging/console-handler=CONSOLE".parse().unwrap())
//!     .with_param("level", ModelNode::expression("${log.level:INFO}"));
//! assert!(policy.expect_failed(&op));
//!
//! let corrected = policy.correct_operation(&op).unwrap();
//! assert!(!policy.can_correct_more(&corrected));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod check;
mod correction;
mod description;
mod filter;
mod validation;

// Re-exports
pub use check::{AttributeCheck, CustomCheck, FieldCheck, NewAttribute, RejectExpressions};
pub use correction::{
    AddressRule, AttributesRule, BeforeCompositeCallback, CorrectionPolicy, PolicyError,
};
pub use description::{ModelDescriptionValidator, ValidationFailure};
pub use filter::{FilterAction, OperationFixer, OperationValidationFilter};
pub use validation::OperationValidator;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
