//! Transformation-replay engine
//!
//! Drives boot operations through a current kernel, checks that each
//! operation is rejected, discarded or accepted for a legacy version exactly
//! as a [`CorrectionPolicy`] declares, corrects rejected operations one
//! attribute at a time, and replays the result against the legacy kernel.
//!
//! # Per-operation protocol
//!
//! ```text
//! Pending ──transform──┬── expected failure ──┬── correctable ──> Pending (corrected)
//!                      │                      └── otherwise ────> Rejected
//!                      ├── expected discard ────────────────────> Discarded
//!                      └── expected to pass ────────────────────> Accepted
//! ```
//!
//! Correction is bounded by [`HarnessConfig::max_correction_rounds`].

use std::sync::Arc;

use modeltest_kernel::{KernelError, ModelExecutor, TransformedOperation};
use modeltest_model::{
    compare, keys, CompareOptions, ModelNode, ModelVersion, Operation, OperationResult,
    PathAddress,
};
use modeltest_policy::{
    CorrectionPolicy, ModelDescriptionValidator, OperationValidationFilter, OperationValidator,
};
use serde::Serialize;

use crate::config::{HarnessConfig, LegacyControllerEntry};
use crate::error::ModelTestError;
use crate::guard::ExecutorGuard;

/// Fix-up applied to the legacy model before comparison
pub type ModelFixer = dyn Fn(ModelNode) -> ModelNode + Send + Sync;

/// Per-operation replay state
#[derive(Debug, Clone, PartialEq)]
enum OperationState {
    Pending(Operation),
    Settled(Settled),
}

/// Final state of an operation
#[derive(Debug, Clone, PartialEq)]
enum Settled {
    /// Replayed as part of the legacy composite
    Accepted(Operation),
    /// Rejected with nothing left to correct; not replayed
    Rejected,
    Discarded,
}

/// Outcome counts of one legacy version check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Checked legacy version
    pub version: String,
    /// Operations replayed unchanged
    pub accepted: usize,
    /// Operations replayed after correction
    pub corrected: usize,
    /// Operations rejected without a correction
    pub rejected: usize,
    /// Operations discarded by the transformer
    pub discarded: usize,
    /// Correction rounds over all operations
    pub correction_rounds: usize,
    /// Write-attribute operations replayed
    pub writes: usize,
    /// Write-attribute operations that needed a correction
    pub corrected_writes: usize,
}

/// Operations validated and skipped by [`ReplayEngine::validate_operations`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub validated: usize,
    pub skipped: usize,
}

/// What to check for every legacy version
#[derive(Clone, Copy)]
pub struct LegacyCheck<'a> {
    pub operations: &'a [Operation],
    pub policy: &'a CorrectionPolicy,
    /// Validate operations against the current description first
    pub filter: Option<&'a OperationValidationFilter>,
    /// Compare the transformed current model with the legacy model
    pub check_model: bool,
}

impl<'a> LegacyCheck<'a> {
    #[must_use]
    pub fn new(operations: &'a [Operation], policy: &'a CorrectionPolicy) -> Self {
        Self {
            operations,
            policy,
            filter: None,
            check_model: false,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: &'a OperationValidationFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_model_check(mut self) -> Self {
        self.check_model = true;
        self
    }
}

/// Replay engine bound to a harness configuration
#[derive(Debug, Clone, Default)]
pub struct ReplayEngine {
    config: HarnessConfig,
}

impl ReplayEngine {
    #[inline]
    #[must_use]
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Execute `operations` as one composite against the current kernel
    ///
    /// # Errors
    /// Returns [`ModelTestError::BootFailed`] if the composite fails
    pub fn run_boot_operations(
        &self,
        current: &dyn ModelExecutor,
        operations: &[Operation],
    ) -> Result<ModelNode, ModelTestError> {
        tracing::info!(
            version = %current.version(),
            operations = operations.len(),
            "Running boot operations"
        );
        let composite = Operation::composite(operations.iter().cloned());
        let result = current.execute(&composite)?;
        result.check_outcome().map_err(|err| {
            tracing::warn!(error = %err, "Boot operations failed");
            ModelTestError::BootFailed {
                description: err.to_string(),
            }
        })
    }

    /// Check rejection, correction and replay of `operations` for `version`
    ///
    /// # Errors
    /// Returns the first expectation or replay mismatch
    pub fn check_failed_transformed_boot_operations(
        &self,
        current: &dyn ModelExecutor,
        version: ModelVersion,
        operations: &[Operation],
        policy: &CorrectionPolicy,
    ) -> Result<ReplaySummary, ModelTestError> {
        tracing::info!(
            version = %version,
            operations = operations.len(),
            "Checking transformed boot operations"
        );
        let mut summary = ReplaySummary {
            version: version.to_string(),
            ..ReplaySummary::default()
        };

        let mut legacy_ops = Vec::with_capacity(operations.len());
        for operation in operations {
            let (state, rounds) = self.settle(current, version, operation, policy)?;
            summary.correction_rounds += rounds;
            match state {
                Settled::Accepted(op) => {
                    if rounds == 0 {
                        summary.accepted += 1;
                    } else {
                        summary.corrected += 1;
                    }
                    legacy_ops.push(op);
                }
                Settled::Rejected => summary.rejected += 1,
                Settled::Discarded => summary.discarded += 1,
            }
        }

        policy.invoke_before_composite();
        self.replay_composite(current, version, legacy_ops, policy)?;

        for operation in operations {
            for write in policy.create_write_attribute_operations(operation) {
                if self.replay_write(current, version, &write, policy)? {
                    summary.corrected_writes += 1;
                }
                summary.writes += 1;
            }
        }

        tracing::info!(
            version = %version,
            accepted = summary.accepted,
            corrected = summary.corrected,
            rejected = summary.rejected,
            discarded = summary.discarded,
            writes = summary.writes,
            "Transformed boot operations replayed"
        );
        Ok(summary)
    }

    /// Drive one operation to a final state
    ///
    /// Returns the final state and the number of corrections applied.
    fn settle(
        &self,
        current: &dyn ModelExecutor,
        version: ModelVersion,
        operation: &Operation,
        policy: &CorrectionPolicy,
    ) -> Result<(Settled, usize), ModelTestError> {
        let mut op = operation.clone();
        let mut rounds = 0;
        loop {
            let next = self.step(current, version, op, policy)?;
            tracing::debug!(operation = %operation, rounds, state = ?next, "Operation state");
            match next {
                OperationState::Pending(corrected) => {
                    rounds += 1;
                    if rounds > self.config.max_correction_rounds {
                        tracing::warn!(operation = %operation, rounds, "Correction did not converge");
                        return Err(ModelTestError::NonConvergent {
                            operation: operation.to_string(),
                            rounds: self.config.max_correction_rounds,
                        });
                    }
                    op = corrected;
                }
                OperationState::Settled(settled) => return Ok((settled, rounds)),
            }
        }
    }

    fn step(
        &self,
        current: &dyn ModelExecutor,
        version: ModelVersion,
        op: Operation,
        policy: &CorrectionPolicy,
    ) -> Result<OperationState, ModelTestError> {
        let transformed = current.transform_operation(version, &op)?;

        if policy.expect_failed(&op) {
            if !is_rejected(&transformed) || transformed.failure_description().is_none() {
                tracing::warn!(operation = %op, version = %version, "Expected rejection");
                return Err(ModelTestError::MissingRejection {
                    operation: op.to_string(),
                    version,
                });
            }
            return if policy.can_correct_more(&op) {
                Ok(OperationState::Pending(policy.correct_operation(&op)?))
            } else {
                Ok(OperationState::Settled(Settled::Rejected))
            };
        }

        if policy.expect_discarded(&op) {
            if !transformed.is_discarded() || is_rejected(&transformed) {
                tracing::warn!(operation = %op, version = %version, "Expected discard");
                return Err(ModelTestError::NotDiscarded {
                    operation: op.to_string(),
                    version,
                });
            }
            return Ok(OperationState::Settled(Settled::Discarded));
        }

        if is_rejected(&transformed) {
            return Err(unexpected_rejection(&op, version, &transformed));
        }
        if policy.can_correct_more(&op) {
            return Err(ModelTestError::InconsistentPolicy {
                operation: op.to_string(),
            });
        }
        let settled = if policy.transform_composite() {
            Settled::Accepted(op)
        } else {
            // discarded payloads have nothing to replay
            transformed
                .into_operation()
                .map_or(Settled::Discarded, Settled::Accepted)
        };
        Ok(OperationState::Settled(settled))
    }

    fn replay_composite(
        &self,
        current: &dyn ModelExecutor,
        version: ModelVersion,
        legacy_ops: Vec<Operation>,
        policy: &CorrectionPolicy,
    ) -> Result<(), ModelTestError> {
        let composite = Operation::composite(legacy_ops);
        let transformed = if policy.transform_composite() {
            let transformed = current.transform_operation(version, &composite)?;
            if is_rejected(&transformed) {
                return Err(unexpected_rejection(&composite, version, &transformed));
            }
            transformed
        } else {
            TransformedOperation::new(composite.clone())
        };

        let result = current.execute_transformed(version, &transformed)?;
        check_replayed(&composite, version, result)
    }

    /// Replay one derived write-attribute operation
    ///
    /// Returns whether the write needed a correction.
    fn replay_write(
        &self,
        current: &dyn ModelExecutor,
        version: ModelVersion,
        write: &Operation,
        policy: &CorrectionPolicy,
    ) -> Result<bool, ModelTestError> {
        let transformed = current.transform_operation(version, write)?;
        let expect_failed = policy.expect_failed_write_attribute(write);

        let (write, transformed) = if expect_failed {
            if !is_rejected(&transformed) || transformed.failure_description().is_none() {
                return Err(ModelTestError::MissingRejection {
                    operation: write.to_string(),
                    version,
                });
            }
            let corrected = policy.correct_write_attribute_operation(write)?;
            tracing::debug!(operation = %write, corrected = %corrected, "Corrected write");
            let transformed = current.transform_operation(version, &corrected)?;
            (corrected, transformed)
        } else {
            (write.clone(), transformed)
        };

        if is_rejected(&transformed) {
            return Err(unexpected_rejection(&write, version, &transformed));
        }
        let result = current.execute_transformed(version, &transformed)?;
        check_replayed(&write, version, result)?;
        Ok(expect_failed)
    }

    /// Compare the current model, transformed for `version`, with the
    /// legacy kernel's model
    ///
    /// `fixer` adjusts the legacy model before comparison. Returns the
    /// legacy model.
    ///
    /// # Errors
    /// Returns [`ModelTestError::ModelMismatch`] on the first divergence
    pub fn check_model_transformation(
        &self,
        current: &dyn ModelExecutor,
        version: ModelVersion,
        fixer: Option<&ModelFixer>,
    ) -> Result<ModelNode, ModelTestError> {
        tracing::info!(version = %version, "Checking model transformation");
        let transformed = current.read_transformed_model(version)?;
        let mut legacy = current.legacy_services(version)?.read_model()?;
        if let Some(fixer) = fixer {
            legacy = fixer(legacy);
        }

        compare(&transformed, &legacy, CompareOptions::strict()).map_err(|source| {
            tracing::warn!(version = %version, error = %source, "Model mismatch");
            ModelTestError::ModelMismatch { version, source }
        })?;
        Ok(legacy)
    }

    /// Validate operations against the executor's resource descriptions
    ///
    /// `filter` skips, resolves or fixes operations first.
    ///
    /// # Errors
    /// Returns [`ModelTestError::InvalidOperation`] for the first invalid
    /// operation
    pub fn validate_operations(
        &self,
        executor: &dyn ModelExecutor,
        operations: &[Operation],
        filter: &OperationValidationFilter,
    ) -> Result<ValidationSummary, ModelTestError> {
        let validator = OperationValidator::new();
        let mut summary = ValidationSummary::default();
        for operation in operations {
            let Some(adjusted) = filter.adjust_for_validation(operation)? else {
                tracing::debug!(operation = %operation, "Skipping validation");
                summary.skipped += 1;
                continue;
            };
            let steps = if adjusted.is_composite() {
                adjusted.steps().map_err(KernelError::from)?
            } else {
                vec![adjusted]
            };
            for step in steps {
                let description = describe(executor, step.address())?;
                validator.validate(&step, &description).map_err(|failures| {
                    ModelTestError::InvalidOperation {
                        operation: step.to_string(),
                        failures: join(&failures),
                    }
                })?;
            }
            summary.validated += 1;
        }
        Ok(summary)
    }

    /// Check the executor's whole resource description is well formed
    ///
    /// # Errors
    /// Returns [`ModelTestError::InvalidDescription`] listing every problem
    pub fn validate_model_description(
        &self,
        executor: &dyn ModelExecutor,
    ) -> Result<(), ModelTestError> {
        let root = PathAddress::root();
        let read = Operation::new(keys::READ_RESOURCE_DESCRIPTION, root.clone())
            .with_param(keys::RECURSIVE, true);
        let description = executor
            .execute(&read)?
            .check_outcome()
            .map_err(KernelError::from)?;
        let failures = ModelDescriptionValidator::new().validate(&root, &description);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ModelTestError::InvalidDescription(join(&failures)))
        }
    }

    /// Run every configured check for one legacy version
    ///
    /// `current` is shut down before returning.
    ///
    /// # Errors
    /// Returns the first failure
    pub fn check_legacy_version(
        &self,
        current: Arc<dyn ModelExecutor>,
        version: ModelVersion,
        check: &LegacyCheck<'_>,
    ) -> Result<ReplaySummary, ModelTestError> {
        let current = ExecutorGuard::new(current);
        if let Some(filter) = check.filter {
            self.validate_model_description(&*current)?;
            self.validate_operations(&*current, check.operations, filter)?;
        }
        self.run_boot_operations(&*current, check.operations)?;
        let summary = self.check_failed_transformed_boot_operations(
            &*current,
            version,
            check.operations,
            check.policy,
        )?;
        if check.check_model {
            self.check_model_transformation(&*current, version, None)?;
        }
        Ok(summary)
    }

    /// Run [`check_legacy_version`](Self::check_legacy_version) for every
    /// configured legacy version
    ///
    /// `boot` creates a fresh current kernel bound to the given legacy
    /// version.
    ///
    /// # Errors
    /// Returns the first failure
    pub fn check_legacy_versions<F>(
        &self,
        boot: F,
        check: &LegacyCheck<'_>,
    ) -> Result<Vec<ReplaySummary>, ModelTestError>
    where
        F: Fn(ModelVersion, &LegacyControllerEntry) -> Result<Arc<dyn ModelExecutor>, ModelTestError>,
    {
        self.config
            .legacy_versions
            .iter()
            .map(|(version, entry)| self.check_legacy_version(boot(version, entry)?, version, check))
            .collect()
    }
}

/// Whether the transformer would reject a successful execution
fn is_rejected(transformed: &TransformedOperation) -> bool {
    transformed.reject_operation(&OperationResult::success(ModelNode::Undefined))
}

fn unexpected_rejection(
    operation: &Operation,
    version: ModelVersion,
    transformed: &TransformedOperation,
) -> ModelTestError {
    let description = transformed
        .failure_description()
        .unwrap_or("no description")
        .to_string();
    tracing::warn!(
        operation = %operation,
        version = %version,
        description = %description,
        "Unexpected rejection"
    );
    ModelTestError::UnexpectedRejection {
        operation: operation.to_string(),
        version,
        description,
    }
}

fn check_replayed(
    operation: &Operation,
    version: ModelVersion,
    result: OperationResult,
) -> Result<(), ModelTestError> {
    match result.failure_description() {
        None => Ok(()),
        Some(description) => {
            tracing::warn!(
                operation = %operation,
                version = %version,
                description = %description,
                "Replay failed"
            );
            Err(ModelTestError::ReplayFailed {
                operation: operation.to_string(),
                version,
                description: description.to_string(),
            })
        }
    }
}

fn describe(executor: &dyn ModelExecutor, address: &PathAddress) -> Result<ModelNode, ModelTestError> {
    let read = Operation::new(keys::READ_RESOURCE_DESCRIPTION, address.clone());
    executor.execute(&read)?.check_outcome().map_err(|err| {
        ModelTestError::InvalidOperation {
            operation: read.to_string(),
            failures: err.to_string(),
        }
    })
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
