//! Error types for the replay engine
//!
//! Every check aborts on the first failure. Failures fall into:
//! - Boot failures: the operations themselves are invalid
//! - Expectation mismatches: the transformer and the policy disagree
//! - Replay mismatches: the legacy kernel refuses the replay or ends up
//!   with a different model

use modeltest_kernel::KernelError;
use modeltest_model::{CompareError, ModelVersion};
use modeltest_policy::PolicyError;

use crate::config::{ConfigError, ControllerKind};

/// Main replay engine error type
#[derive(Debug, thiserror::Error)]
pub enum ModelTestError {
    /// Boot operations failed against the current kernel
    #[error("boot operations failed against the current model: {description}")]
    BootFailed { description: String },

    /// Operation rejected although the policy expects it to pass
    #[error("{operation} was rejected for {version}: {description}")]
    UnexpectedRejection {
        operation: String,
        version: ModelVersion,
        description: String,
    },

    /// Policy expects a rejection the transformer did not produce
    #[error("expected {operation} to be rejected for {version}")]
    MissingRejection {
        operation: String,
        version: ModelVersion,
    },

    /// Policy expects a discard the transformer did not produce
    #[error("expected {operation} to be discarded for {version}")]
    NotDiscarded {
        operation: String,
        version: ModelVersion,
    },

    /// Policy accepts an operation it would still correct
    #[error("policy accepts {operation} but still has corrections for it")]
    InconsistentPolicy { operation: String },

    /// Correction did not settle within the configured rounds
    #[error("correcting {operation} did not converge after {rounds} rounds")]
    NonConvergent { operation: String, rounds: usize },

    /// Legacy kernel failed the replayed operation
    #[error("replay of {operation} failed for {version}: {description}")]
    ReplayFailed {
        operation: String,
        version: ModelVersion,
        description: String,
    },

    /// Transformed current model and legacy model differ
    #[error("transformed model differs for {version}: {source}")]
    ModelMismatch {
        version: ModelVersion,
        #[source]
        source: CompareError,
    },

    /// Operation does not match the resource description
    #[error("{operation} is invalid: {failures}")]
    InvalidOperation { operation: String, failures: String },

    /// Resource description is malformed
    #[error("invalid resource description: {0}")]
    InvalidDescription(String),

    /// Version missing from the legacy version table
    #[error("no legacy controller configured for {0}")]
    UnknownVersion(ModelVersion),

    /// Controller hosting not supported by the harness
    #[error("legacy controller for {version} cannot be hosted {}", .kind.as_str())]
    UnsupportedController {
        version: ModelVersion,
        kind: ControllerKind,
    },

    /// Policy could not correct an operation
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Executor error
    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Broad failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    Boot,
    Expectation,
    Replay,
    Setup,
}

impl FailureCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Expectation => "expectation",
            Self::Replay => "replay",
            Self::Setup => "setup",
        }
    }
}

impl ModelTestError {
    #[must_use]
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::BootFailed { .. } | Self::InvalidOperation { .. } => FailureCategory::Boot,
            Self::UnexpectedRejection { .. }
            | Self::MissingRejection { .. }
            | Self::NotDiscarded { .. }
            | Self::InconsistentPolicy { .. }
            | Self::NonConvergent { .. }
            | Self::Policy(_) => FailureCategory::Expectation,
            Self::ReplayFailed { .. } | Self::ModelMismatch { .. } => FailureCategory::Replay,
            Self::InvalidDescription(_)
            | Self::UnknownVersion(_)
            | Self::UnsupportedController { .. }
            | Self::Kernel(_)
            | Self::Config(_) => FailureCategory::Setup,
        }
    }

    /// Check if the transformer and the policy disagree
    #[inline]
    #[must_use]
    pub fn is_expectation_mismatch(&self) -> bool {
        self.category() == FailureCategory::Expectation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_embed_operation_and_version() {
        let err = ModelTestError::UnexpectedRejection {
            operation: "/subsystem=logging:add()".to_string(),
            version: ModelVersion::new(1, 2, 0),
            description: "level: expressions are not supported".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("/subsystem=logging:add()"));
        assert!(message.contains("1.2.0"));
        assert!(message.contains("expressions"));
        assert!(err.is_expectation_mismatch());
    }

    #[test]
    fn categories() {
        let replay = ModelTestError::ModelMismatch {
            version: ModelVersion::new(1, 2, 0),
            source: CompareError {
                path: "level".to_string(),
                message: "values differ".to_string(),
            },
        };
        assert_eq!(replay.category(), FailureCategory::Replay);
        assert_eq!(
            ModelTestError::BootFailed {
                description: "x".to_string()
            }
            .category(),
            FailureCategory::Boot
        );
        assert_eq!(
            ModelTestError::from(KernelError::Shutdown).category(),
            FailureCategory::Setup
        );
    }
}
