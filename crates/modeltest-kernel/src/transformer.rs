//! Operation and model transformers
//!
//! A [`TransformerRegistry`] describes how a current kernel rewrites
//! operations and model state for one legacy version. Rules are keyed by
//! address pattern; the first matching pattern wins.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use modeltest_model::{keys, ModelNode, Operation, PathAddress};

use crate::error::KernelError;
use crate::executor::TransformedOperation;

/// Value predicate; `true` rejects
pub type ValuePredicate = Arc<dyn Fn(&ModelNode) -> bool + Send + Sync>;

/// Value conversion applied to both operations and model state
pub type ValueConverter = Arc<dyn Fn(&ModelNode) -> ModelNode + Send + Sync>;

/// How a single attribute is transformed
#[derive(Clone)]
pub enum AttributeTransformer {
    /// Values containing expressions are rejected
    RejectExpressions,
    /// Attribute unknown to the legacy version
    ///
    /// Undefined values are discarded, defined values rejected.
    NewAttribute,
    /// Values matching the predicate are rejected
    RejectValue {
        predicate: ValuePredicate,
        description: String,
    },
    /// Attribute known under another name
    Rename(String),
    /// Value converted to the legacy representation
    Convert(ValueConverter),
}

impl AttributeTransformer {
    /// Reject every defined value outside `allowed`
    #[must_use]
    pub fn allowed_values(allowed: &[&str]) -> Self {
        let allowed: Vec<String> = allowed.iter().map(ToString::to_string).collect();
        let description = format!("value must be one of {allowed:?}");
        Self::RejectValue {
            predicate: Arc::new(move |value: &ModelNode| {
                value.is_defined() && !allowed.contains(&value.as_string())
            }),
            description,
        }
    }

    /// Rejection reason for `value`, if rejected
    fn rejects(&self, attribute: &str, value: &ModelNode) -> Option<String> {
        match self {
            Self::RejectExpressions if value.contains_expression() => {
                Some(format!("{attribute}: expressions are not supported"))
            }
            Self::NewAttribute if value.is_defined() => {
                Some(format!("{attribute}: attribute is not supported"))
            }
            Self::RejectValue {
                predicate,
                description,
            } if predicate(value) => Some(format!("{attribute}: {description}")),
            _ => None,
        }
    }

    /// Legacy name of `attribute`
    fn legacy_name<'a>(&'a self, attribute: &'a str) -> &'a str {
        match self {
            Self::Rename(name) => name,
            _ => attribute,
        }
    }

    fn convert(&self, value: ModelNode) -> ModelNode {
        match self {
            Self::Convert(convert) => convert(&value),
            _ => value,
        }
    }
}

impl fmt::Debug for AttributeTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RejectExpressions => f.write_str("RejectExpressions"),
            Self::NewAttribute => f.write_str("NewAttribute"),
            Self::RejectValue { description, .. } => f
                .debug_struct("RejectValue")
                .field("description", description)
                .finish_non_exhaustive(),
            Self::Rename(name) => f.debug_tuple("Rename").field(name).finish(),
            Self::Convert(_) => f.write_str("Convert(..)"),
        }
    }
}

/// How a resource is transformed
#[derive(Debug, Clone)]
pub enum ResourceTransformer {
    /// Resource type unknown to the legacy version; operations are dropped
    Discard,
    /// Resource type the legacy version refuses
    Reject(String),
    /// Per-attribute transformers
    Attributes(Vec<(String, AttributeTransformer)>),
}

impl ResourceTransformer {
    /// Applies to descendants of the matched address too
    fn is_subtree(&self) -> bool {
        matches!(self, Self::Discard | Self::Reject(_))
    }
}

/// Transformers for one legacy version
#[derive(Debug, Clone, Default)]
pub struct TransformerRegistry {
    rules: Vec<(PathAddress, ResourceTransformer)>,
}

impl TransformerRegistry {
    /// Registry passing everything through
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resource(mut self, pattern: PathAddress, transformer: ResourceTransformer) -> Self {
        self.rules.push((pattern, transformer));
        self
    }

    #[must_use]
    pub fn with_discarded(self, pattern: PathAddress) -> Self {
        self.with_resource(pattern, ResourceTransformer::Discard)
    }

    #[must_use]
    pub fn with_rejected(self, pattern: PathAddress, description: impl Into<String>) -> Self {
        self.with_resource(pattern, ResourceTransformer::Reject(description.into()))
    }

    /// Add an attribute transformer, merging with an existing rule for
    /// `pattern`
    #[must_use]
    pub fn with_attribute(
        mut self,
        pattern: PathAddress,
        attribute: impl Into<String>,
        transformer: AttributeTransformer,
    ) -> Self {
        let entry = (attribute.into(), transformer);
        let existing = self.rules.iter().position(|(p, rule)| {
            *p == pattern && matches!(rule, ResourceTransformer::Attributes(_))
        });
        match existing.map(|index| &mut self.rules[index].1) {
            Some(ResourceTransformer::Attributes(attributes)) => attributes.push(entry),
            _ => self
                .rules
                .push((pattern, ResourceTransformer::Attributes(vec![entry]))),
        }
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

    /// Transformer governing `address`
    #[must_use]
    pub fn resource_transformer(&self, address: &PathAddress) -> Option<&ResourceTransformer> {
        self.rules.iter().find_map(|(pattern, rule)| {
            let applies = address.matches(pattern)
                || (rule.is_subtree()
                    && pattern.len() < address.len()
                    && address.elements()[..pattern.len()]
                        .iter()
                        .zip(pattern.iter())
                        .all(|(element, p)| element.matches(p)));
            applies.then_some(rule)
        })
    }

    /// Transform `operation` for the legacy version
    ///
    /// # Errors
    /// Returns [`KernelError::Operation`] if a composite's steps are malformed
    pub fn transform_operation(
        &self,
        operation: &Operation,
    ) -> Result<TransformedOperation, KernelError> {
        if operation.is_composite() {
            return self.transform_composite(operation);
        }

        let transformed = match self.resource_transformer(operation.address()) {
            None => TransformedOperation::new(operation.clone()),
            Some(ResourceTransformer::Discard) => TransformedOperation::discarded(),
            Some(ResourceTransformer::Reject(description)) => {
                TransformedOperation::rejected(Some(operation.clone()), description.clone())
            }
            Some(ResourceTransformer::Attributes(attributes)) => {
                transform_attributes(operation, attributes)
            }
        };
        tracing::debug!(
            operation = %operation,
            discarded = transformed.is_discarded(),
            rejected = transformed.failure_description().is_some(),
            "Transformed operation"
        );
        Ok(transformed)
    }

    fn transform_composite(&self, operation: &Operation) -> Result<TransformedOperation, KernelError> {
        let mut steps = Vec::new();
        let mut failures = Vec::new();
        for step in operation.steps()? {
            let transformed = self.transform_operation(&step)?;
            if let Some(description) = transformed.failure_description() {
                failures.push(format!("{step}: {description}"));
            }
            steps.extend(transformed.into_operation());
        }

        let composite = Operation::composite(steps);
        if failures.is_empty() {
            Ok(TransformedOperation::new(composite))
        } else {
            Ok(TransformedOperation::rejected(Some(composite), failures.join("; ")))
        }
    }

    /// Transform the attributes of the resource at `address`
    ///
    /// Returns `None` when the resource does not exist in the legacy
    /// version.
    #[must_use]
    pub fn transform_resource(
        &self,
        address: &PathAddress,
        attributes: &IndexMap<String, ModelNode>,
    ) -> Option<IndexMap<String, ModelNode>> {
        match self.resource_transformer(address) {
            None => Some(attributes.clone()),
            Some(ResourceTransformer::Discard | ResourceTransformer::Reject(_)) => None,
            Some(ResourceTransformer::Attributes(transformers)) => Some(
                attributes
                    .iter()
                    .filter_map(|(name, value)| match find(transformers, name) {
                        None => Some((name.clone(), value.clone())),
                        Some(AttributeTransformer::NewAttribute) if !value.is_defined() => None,
                        Some(transformer) => Some((
                            transformer.legacy_name(name).to_string(),
                            transformer.convert(value.clone()),
                        )),
                    })
                    .collect(),
            ),
        }
    }
}

fn find<'a>(
    transformers: &'a [(String, AttributeTransformer)],
    attribute: &str,
) -> Option<&'a AttributeTransformer> {
    transformers
        .iter()
        .find(|(name, _)| name == attribute)
        .map(|(_, transformer)| transformer)
}

fn transform_attributes(
    operation: &Operation,
    transformers: &[(String, AttributeTransformer)],
) -> TransformedOperation {
    match operation.name() {
        keys::ADD => transform_add(operation, transformers),
        keys::WRITE_ATTRIBUTE | keys::UNDEFINE_ATTRIBUTE => {
            transform_attribute_operation(operation, transformers)
        }
        _ => TransformedOperation::new(operation.clone()),
    }
}

fn transform_add(
    operation: &Operation,
    transformers: &[(String, AttributeTransformer)],
) -> TransformedOperation {
    let mut transformed = Operation::new(operation.name(), operation.address().clone());
    let mut failures = Vec::new();
    for (name, value) in operation.params() {
        let Some(transformer) = find(transformers, name) else {
            transformed.set_param(name.clone(), value.clone());
            continue;
        };
        if let Some(reason) = transformer.rejects(name, value) {
            failures.push(reason);
        }
        if matches!(transformer, AttributeTransformer::NewAttribute) && !value.is_defined() {
            continue;
        }
        transformed.set_param(
            transformer.legacy_name(name).to_string(),
            transformer.convert(value.clone()),
        );
    }

    if failures.is_empty() {
        TransformedOperation::new(transformed)
    } else {
        TransformedOperation::rejected(Some(transformed), failures.join(", "))
    }
}

fn transform_attribute_operation(
    operation: &Operation,
    transformers: &[(String, AttributeTransformer)],
) -> TransformedOperation {
    let Some(attribute) = operation.attribute_name() else {
        return TransformedOperation::new(operation.clone());
    };
    let Some(transformer) = find(transformers, attribute) else {
        return TransformedOperation::new(operation.clone());
    };

    let is_write = operation.name() == keys::WRITE_ATTRIBUTE;
    let value = operation
        .param(keys::VALUE)
        .cloned()
        .unwrap_or(ModelNode::Undefined);
    if matches!(transformer, AttributeTransformer::NewAttribute)
        && (!is_write || !value.is_defined())
    {
        return TransformedOperation::discarded();
    }

    let mut transformed = operation
        .clone()
        .with_param(keys::NAME, transformer.legacy_name(attribute));
    if is_write {
        transformed.set_param(keys::VALUE, transformer.convert(value.clone()));
    }
    match transformer.rejects(attribute, &value) {
        Some(reason) if is_write => TransformedOperation::rejected(Some(transformed), reason),
        _ => TransformedOperation::new(transformed),
    }
}
