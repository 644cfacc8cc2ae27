//! Attribute checks
//!
//! An [`AttributeCheck`] decides whether a legacy version would reject an
//! attribute value and knows how to correct the value so it is accepted.

use std::fmt;
use std::sync::Arc;

use modeltest_model::{resolve_node, ExpressionResolver, ModelNode, PropertyResolver};

use crate::correction::PolicyError;

/// Expected rejection of a single attribute, plus its correction
pub trait AttributeCheck: Send + Sync + fmt::Debug {
    /// Check if the legacy version rejects `value`
    ///
    /// `is_write` is set when the value comes from a `write-attribute`
    /// operation rather than an `add`.
    fn check(&self, attribute: &str, value: &ModelNode, is_write: bool) -> bool;

    /// Corrected value the legacy version accepts
    ///
    /// # Errors
    /// Returns error if the value cannot be corrected
    fn correct(
        &self,
        attribute: &str,
        value: &ModelNode,
        is_write: bool,
    ) -> Result<ModelNode, PolicyError>;

    /// Check name (for logging)
    fn name(&self) -> &'static str;
}

/// Rejects expression values; corrects by resolving them
///
/// The default resolver has no properties, so expressions resolve to their
/// defaults.
#[derive(Clone)]
pub struct RejectExpressions {
    resolver: Arc<dyn ExpressionResolver + Send + Sync>,
}

impl RejectExpressions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolver: Arc::new(PropertyResolver::new()),
        }
    }

    /// Resolve through `resolver` instead of the defaults
    #[must_use]
    pub fn with_resolver(resolver: impl ExpressionResolver + Send + Sync + 'static) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }
}

impl Default for RejectExpressions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RejectExpressions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RejectExpressions").finish_non_exhaustive()
    }
}

impl AttributeCheck for RejectExpressions {
    fn check(&self, _attribute: &str, value: &ModelNode, _is_write: bool) -> bool {
        value.contains_expression()
    }

    fn correct(
        &self,
        attribute: &str,
        value: &ModelNode,
        _is_write: bool,
    ) -> Result<ModelNode, PolicyError> {
        resolve_node(value, self.resolver.as_ref()).map_err(|e| PolicyError::CorrectionFailed {
            attribute: attribute.to_string(),
            message: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "reject-expressions"
    }
}

/// Attribute unknown to the legacy version
///
/// Any defined value is rejected; the correction undefines it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewAttribute;

impl AttributeCheck for NewAttribute {
    fn check(&self, _attribute: &str, value: &ModelNode, _is_write: bool) -> bool {
        value.is_defined()
    }

    fn correct(
        &self,
        _attribute: &str,
        _value: &ModelNode,
        _is_write: bool,
    ) -> Result<ModelNode, PolicyError> {
        Ok(ModelNode::Undefined)
    }

    fn name(&self) -> &'static str {
        "new-attribute"
    }
}

type Predicate = dyn Fn(&ModelNode) -> bool + Send + Sync;
type Corrector = dyn Fn(&ModelNode) -> ModelNode + Send + Sync;

/// Check built from a predicate and a corrector
///
/// ```rust
/// use modeltest_model::ModelNode;
/// use modeltest_policy::{AttributeCheck, CustomCheck};
///
/// let check = CustomCheck::new(
///     "legacy-target",
///     |v| v.as_str() != Some("System.out"),
///     |_| ModelNode::from("System.out"),
/// );
/// assert!(check.check("target", &ModelNode::from("System.err"), false));
/// ```
#[derive(Clone)]
pub struct CustomCheck {
    name: &'static str,
    predicate: Arc<Predicate>,
    corrector: Arc<Corrector>,
}

impl CustomCheck {
    #[must_use]
    pub fn new(
        name: &'static str,
        predicate: impl Fn(&ModelNode) -> bool + Send + Sync + 'static,
        corrector: impl Fn(&ModelNode) -> ModelNode + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            predicate: Arc::new(predicate),
            corrector: Arc::new(corrector),
        }
    }

    /// Reject any value outside `allowed`, correcting to `replacement`
    #[must_use]
    pub fn allowed_values(
        name: &'static str,
        allowed: &[&str],
        replacement: impl Into<ModelNode>,
    ) -> Self {
        let allowed: Vec<String> = allowed.iter().map(ToString::to_string).collect();
        let replacement = replacement.into();
        Self::new(
            name,
            move |value| value.is_defined() && !allowed.contains(&value.as_string()),
            move |_| replacement.clone(),
        )
    }
}

impl fmt::Debug for CustomCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCheck")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl AttributeCheck for CustomCheck {
    fn check(&self, _attribute: &str, value: &ModelNode, _is_write: bool) -> bool {
        (self.predicate)(value)
    }

    fn correct(
        &self,
        _attribute: &str,
        value: &ModelNode,
        _is_write: bool,
    ) -> Result<ModelNode, PolicyError> {
        Ok((self.corrector)(value))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Applies an inner check to one field of an object-valued attribute
#[derive(Debug, Clone)]
pub struct FieldCheck {
    field: String,
    inner: Arc<dyn AttributeCheck>,
}

impl FieldCheck {
    #[must_use]
    pub fn new(field: impl Into<String>, inner: impl AttributeCheck + 'static) -> Self {
        Self {
            field: field.into(),
            inner: Arc::new(inner),
        }
    }

    #[inline]
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl AttributeCheck for FieldCheck {
    fn check(&self, attribute: &str, value: &ModelNode, is_write: bool) -> bool {
        value
            .get(&self.field)
            .is_some_and(|field| self.inner.check(attribute, field, is_write))
    }

    fn correct(
        &self,
        attribute: &str,
        value: &ModelNode,
        is_write: bool,
    ) -> Result<ModelNode, PolicyError> {
        let Some(field) = value.get(&self.field) else {
            return Ok(value.clone());
        };
        let corrected = self.inner.correct(attribute, field, is_write)?;
        let mut value = value.clone();
        if corrected.is_defined() {
            value
                .insert(self.field.clone(), corrected)
                .map_err(|e| PolicyError::CorrectionFailed {
                    attribute: attribute.to_string(),
                    message: e.to_string(),
                })?;
        } else {
            value.remove(&self.field);
        }
        Ok(value)
    }

    fn name(&self) -> &'static str {
        "field"
    }
}
