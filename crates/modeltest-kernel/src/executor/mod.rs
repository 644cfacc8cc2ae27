//! Model executor interface
//!
//! A [`ModelExecutor`] is a management kernel bound to one model version.
//! The current kernel also knows how to transform operations for, and
//! execute them against, the legacy kernels registered with it.

use std::fmt;
use std::sync::Arc;

use modeltest_model::{ModelNode, ModelVersion, Operation, OperationResult, PathAddress};

use crate::error::KernelError;

/// Decides whether a transformed operation is rejected by the legacy side
///
/// The predicate receives the result the operation produced (or a
/// synthetic [`OperationResult::success`]) and returns `true` to reject.
pub type RejectionPolicy = Arc<dyn Fn(&OperationResult) -> bool + Send + Sync>;

/// Operation transformed for a legacy model version
#[derive(Clone)]
pub struct TransformedOperation {
    transformed: Option<Operation>,
    rejection: Option<RejectionPolicy>,
    failure_description: Option<String>,
}

impl TransformedOperation {
    /// Accepted operation
    #[inline]
    #[must_use]
    pub fn new(transformed: Operation) -> Self {
        Self {
            transformed: Some(transformed),
            rejection: None,
            failure_description: None,
        }
    }

    /// Operation dropped by the transformation
    #[inline]
    #[must_use]
    pub fn discarded() -> Self {
        Self {
            transformed: None,
            rejection: None,
            failure_description: None,
        }
    }

    /// Operation the legacy version rejects whenever it would succeed
    #[must_use]
    pub fn rejected(transformed: Option<Operation>, description: impl Into<String>) -> Self {
        Self::with_rejection(
            transformed,
            Arc::new(OperationResult::is_success),
            description,
        )
    }

    /// Operation with a custom rejection predicate
    #[must_use]
    pub fn with_rejection(
        transformed: Option<Operation>,
        rejection: RejectionPolicy,
        description: impl Into<String>,
    ) -> Self {
        Self {
            transformed,
            rejection: Some(rejection),
            failure_description: Some(description.into()),
        }
    }

    /// Transformed operation, `None` when discarded
    #[inline]
    #[must_use]
    pub fn transformed_operation(&self) -> Option<&Operation> {
        self.transformed.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn into_operation(self) -> Option<Operation> {
        self.transformed
    }

    #[inline]
    #[must_use]
    pub fn is_discarded(&self) -> bool {
        self.transformed.is_none()
    }

    /// Apply the rejection predicate to `result`
    #[must_use]
    pub fn reject_operation(&self, result: &OperationResult) -> bool {
        self.rejection.as_ref().is_some_and(|reject| reject(result))
    }

    #[inline]
    #[must_use]
    pub fn failure_description(&self) -> Option<&str> {
        self.failure_description.as_deref()
    }
}

impl fmt::Debug for TransformedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformedOperation")
            .field("transformed", &self.transformed.as_ref().map(ToString::to_string))
            .field("rejection", &self.rejection.is_some())
            .field("failure_description", &self.failure_description)
            .finish()
    }
}

/// Management kernel executing operations for one model version
///
/// Methods take `&self`; implementations synchronize internally.
pub trait ModelExecutor: Send + Sync {
    /// Model version this executor implements
    fn version(&self) -> ModelVersion;

    /// Execute an operation
    ///
    /// # Errors
    /// Returns [`KernelError::Shutdown`] after [`shutdown`](Self::shutdown);
    /// operation failures are reported in the result
    fn execute(&self, operation: &Operation) -> Result<OperationResult, KernelError>;

    /// Transform `operation` for the legacy kernel of `version`
    ///
    /// # Errors
    /// Returns [`KernelError::UnknownVersion`] if no legacy kernel is
    /// registered for `version`
    fn transform_operation(
        &self,
        version: ModelVersion,
        operation: &Operation,
    ) -> Result<TransformedOperation, KernelError>;

    /// Execute an already transformed operation against the legacy kernel
    ///
    /// Discarded operations succeed without reaching the legacy kernel.
    /// Rejected operations fail with the transformer's description.
    ///
    /// # Errors
    /// Returns [`KernelError::UnknownVersion`] if no legacy kernel is
    /// registered for `version`
    fn execute_transformed(
        &self,
        version: ModelVersion,
        operation: &TransformedOperation,
    ) -> Result<OperationResult, KernelError> {
        let legacy = self.legacy_services(version)?;
        let Some(op) = operation.transformed_operation() else {
            return Ok(OperationResult::success(ModelNode::Undefined));
        };
        if operation.reject_operation(&OperationResult::success(ModelNode::Undefined)) {
            return Ok(OperationResult::failed(
                operation
                    .failure_description()
                    .unwrap_or("rejected by transformer"),
            ));
        }
        legacy.execute(op)
    }

    /// Executor bound to the legacy `version`
    ///
    /// # Errors
    /// Returns [`KernelError::UnknownVersion`] if none is registered
    fn legacy_services(&self, version: ModelVersion) -> Result<Arc<dyn ModelExecutor>, KernelError>;

    /// Whole model as the legacy `version` would see it
    ///
    /// # Errors
    /// Returns [`KernelError::UnknownVersion`] if no transformers are
    /// registered for `version`
    fn read_transformed_model(&self, version: ModelVersion) -> Result<ModelNode, KernelError>;

    /// Whole model, recursively, from the root
    ///
    /// # Errors
    /// Returns error if the executor is shut down or the read fails
    fn read_model(&self) -> Result<ModelNode, KernelError> {
        let result = self.execute(&Operation::read_resource(PathAddress::root(), true))?;
        Ok(result.check_outcome()?)
    }

    /// Release the kernel; idempotent
    fn shutdown(&self);

    fn is_shutdown(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op() -> Operation {
        Operation::add("/subsystem=logging/json-formatter=JSON".parse().unwrap())
    }

    #[test]
    fn accepted_operation_is_not_rejected() {
        let transformed = TransformedOperation::new(op());
        assert!(!transformed.is_discarded());
        assert!(!transformed.reject_operation(&OperationResult::success(ModelNode::Undefined)));
        assert_eq!(transformed.failure_description(), None);
    }

    #[test]
    fn discarded_operation_is_not_rejected() {
        let transformed = TransformedOperation::discarded();
        assert!(transformed.is_discarded());
        assert!(!transformed.reject_operation(&OperationResult::success(ModelNode::Undefined)));
    }

    #[test]
    fn rejection_applies_to_successful_results_only() {
        let transformed = TransformedOperation::rejected(Some(op()), "json-formatter unknown");
        assert!(transformed.reject_operation(&OperationResult::success(ModelNode::Undefined)));
        assert!(!transformed.reject_operation(&OperationResult::failed("already failed")));
        assert_eq!(
            transformed.failure_description(),
            Some("json-formatter unknown")
        );
    }

    #[test]
    fn custom_rejection_policy() {
        let transformed = TransformedOperation::with_rejection(
            Some(op()),
            Arc::new(|result: &OperationResult| result.result().is_defined()),
            "rejects defined results",
        );
        assert!(!transformed.reject_operation(&OperationResult::success(ModelNode::Undefined)));
        assert!(transformed.reject_operation(&OperationResult::success(ModelNode::from(1))));
    }
}
