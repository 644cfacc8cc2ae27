//! Model Test Core
//!
//! Verifies that a current management model stays compatible with older
//! model versions. Boot operations run against a current kernel, are
//! transformed for each legacy version, checked against a
//! [`CorrectionPolicy`](modeltest_policy::CorrectionPolicy), corrected where
//! the legacy version rejects them, and replayed against the legacy kernel.
//! The transformed current model is then compared with the legacy model.
//!
//! # Example
//!
//! ```rust
//! use modeltest_core::test_harness::{find_scenario, logging, run_scenario};
//! use modeltest_core::ReplayEngine;
//!
//! let engine = ReplayEngine::new(logging::default_config());
//! let scenario = find_scenario("rejections").unwrap();
//! let report = run_scenario(&engine, &scenario);
//! assert!(report.passed(), "{}", report.generate_text());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod test_harness;

// Re-exports
pub use config::{
    ConfigError, ControllerKind, HarnessConfig, LegacyControllerEntry, LegacyVersionTable,
    DEFAULT_MAX_CORRECTION_ROUNDS,
};
pub use engine::{LegacyCheck, ModelFixer, ReplayEngine, ReplaySummary, ValidationSummary};
pub use error::{FailureCategory, ModelTestError};
pub use guard::ExecutorGuard;
pub use test_harness::{ScenarioReport, VersionReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
