//! Kernel errors
//!
//! Operation outcomes (including failures) are reported through
//! [`OperationResult`](modeltest_model::OperationResult); [`KernelError`]
//! covers problems with the executor itself.

use modeltest_model::{ModelVersion, OperationError, OutcomeError};

/// Executor level errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// Executor was shut down
    #[error("model executor has been shut down")]
    Shutdown,

    /// No legacy kernel or transformers registered for the version
    #[error("no legacy kernel registered for model version {0}")]
    UnknownVersion(ModelVersion),

    /// Operation could not be decoded
    #[error("malformed operation: {0}")]
    Operation(#[from] OperationError),

    /// A read needed to build a model failed
    #[error("model read failed: {0}")]
    ReadFailed(#[from] OutcomeError),
}
