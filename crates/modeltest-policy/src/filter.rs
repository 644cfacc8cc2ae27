//! Operation validation filter
//!
//! Decides, per operation, whether validation is skipped, whether
//! expressions are resolved first, and which fix-ups are applied before an
//! operation is validated against its resource description.

use std::fmt;
use std::sync::Arc;

use modeltest_model::{keys, resolve_node, Operation, PathAddress, PropertyResolver, WILDCARD};

use crate::correction::PolicyError;

/// Fix-up applied to an operation before validation
pub type OperationFixer = Arc<dyn Fn(Operation) -> Operation + Send + Sync>;

/// What to do with an operation matched by a filter rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterAction {
    /// Validate as is
    #[default]
    Check,

    /// Resolve expression parameters before validating
    Resolve,

    /// Skip validation
    NoCheck,
}

#[derive(Clone)]
struct FilterRule {
    address: PathAddress,
    operation: String,
    action: FilterAction,
    fixer: Option<OperationFixer>,
}

impl FilterRule {
    fn matches(&self, operation: &Operation) -> bool {
        (self.operation == WILDCARD || self.operation == operation.name())
            && operation.address().matches(&self.address)
    }
}

impl fmt::Debug for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRule")
            .field("address", &self.address.to_string())
            .field("operation", &self.operation)
            .field("action", &self.action)
            .field("fixer", &self.fixer.is_some())
            .finish()
    }
}

/// Ordered list of validation filter rules
///
/// Every matching rule applies in declaration order. A matching
/// [`FilterAction::NoCheck`] rule skips the operation immediately.
#[derive(Debug, Clone, Default)]
pub struct OperationValidationFilter {
    rules: Vec<FilterRule>,
}

impl OperationValidationFilter {
    /// Filter validating every operation as is
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule; `operation` may be `"*"`
    #[must_use]
    pub fn with_rule(
        mut self,
        address: PathAddress,
        operation: impl Into<String>,
        action: FilterAction,
    ) -> Self {
        self.rules.push(FilterRule {
            address,
            operation: operation.into(),
            action,
            fixer: None,
        });
        self
    }

    /// Add a rule that rewrites the operation before validation
    #[must_use]
    pub fn with_fixer(
        mut self,
        address: PathAddress,
        operation: impl Into<String>,
        fixer: impl Fn(Operation) -> Operation + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(FilterRule {
            address,
            operation: operation.into(),
            action: FilterAction::Check,
            fixer: Some(Arc::new(fixer)),
        });
        self
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Operation to validate in place of `operation`
    ///
    /// Returns `None` when validation is skipped. Composite operations are
    /// filtered step by step; skipped steps are dropped from the composite.
    ///
    /// # Errors
    /// Returns [`PolicyError::Unresolvable`] if a `Resolve` rule meets an
    /// expression without a default
    pub fn adjust_for_validation(
        &self,
        operation: &Operation,
    ) -> Result<Option<Operation>, PolicyError> {
        if operation.is_composite() {
            return self.adjust_composite(operation);
        }

        let mut adjusted = operation.clone();
        for rule in self.rules.iter().filter(|rule| rule.matches(operation)) {
            match rule.action {
                FilterAction::NoCheck => {
                    tracing::debug!(operation = %operation, "Validation skipped");
                    return Ok(None);
                }
                FilterAction::Resolve => adjusted = resolve_params(adjusted)?,
                FilterAction::Check => {}
            }
            if let Some(fixer) = &rule.fixer {
                adjusted = fixer(adjusted);
            }
        }
        Ok(Some(adjusted))
    }

    fn adjust_composite(&self, composite: &Operation) -> Result<Option<Operation>, PolicyError> {
        let steps = composite
            .steps()
            .map_err(|e| PolicyError::InvalidOperation {
                operation: composite.to_string(),
                message: e.to_string(),
            })?;
        let mut adjusted = Vec::with_capacity(steps.len());
        for step in &steps {
            if let Some(step) = self.adjust_for_validation(step)? {
                adjusted.push(step);
            }
        }
        Ok(Some(Operation::composite(adjusted)))
    }
}

fn resolve_params(mut operation: Operation) -> Result<Operation, PolicyError> {
    let resolver = PropertyResolver::new();
    let names: Vec<String> = operation
        .params()
        .iter()
        .filter(|(name, value)| name.as_str() != keys::STEPS && value.contains_expression())
        .map(|(name, _)| name.clone())
        .collect();
    for name in names {
        let Some(value) = operation.param(&name) else {
            continue;
        };
        let resolved = resolve_node(value, &resolver).map_err(|e| PolicyError::Unresolvable {
            operation: operation.to_string(),
            message: e.to_string(),
        })?;
        operation.set_param(name, resolved);
    }
    Ok(operation)
}
