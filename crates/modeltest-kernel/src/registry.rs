//! Resource definitions
//!
//! A [`ResourceRegistry`] describes which resources a kernel version
//! supports, which attributes they have, and how those attributes are
//! constrained. Its [`describe`](ResourceDefinition::describe) output is the
//! `read-resource-description` result.

use indexmap::IndexMap;
use modeltest_model::{keys, ModelNode, ModelType, PathAddress, PathElement};

/// Who may change an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    ReadOnly,
    #[default]
    ReadWrite,
    Metric,
}

impl AccessType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => keys::READ_ONLY,
            Self::ReadWrite => keys::READ_WRITE,
            Self::Metric => keys::METRIC,
        }
    }
}

/// Definition of a single attribute
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDefinition {
    name: String,
    model_type: ModelType,
    description: String,
    required: bool,
    expressions_allowed: bool,
    access: AccessType,
    allowed: Vec<ModelNode>,
    default: Option<ModelNode>,
    value_type: Option<ModelType>,
    min: Option<i64>,
    max: Option<i64>,
}

impl AttributeDefinition {
    /// Optional read-write attribute without expressions
    #[must_use]
    pub fn new(name: impl Into<String>, model_type: ModelType) -> Self {
        let name = name.into();
        Self {
            description: format!("The {name} attribute"),
            name,
            model_type,
            required: false,
            expressions_allowed: false,
            access: AccessType::ReadWrite,
            allowed: Vec::new(),
            default: None,
            value_type: None,
            min: None,
            max: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn allow_expressions(mut self) -> Self {
        self.expressions_allowed = true;
        self
    }

    #[must_use]
    pub fn with_access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }

    /// Restrict values to `allowed`
    #[must_use]
    pub fn with_allowed<I, V>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ModelNode>,
    {
        self.allowed = allowed.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<ModelNode>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Element type of a LIST attribute
    #[must_use]
    pub fn with_value_type(mut self, value_type: ModelType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    #[must_use]
    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    #[inline]
    #[must_use]
    pub fn access(&self) -> AccessType {
        self.access
    }

    #[inline]
    #[must_use]
    pub fn default_value(&self) -> Option<&ModelNode> {
        self.default.as_ref()
    }

    /// Descriptor node; `as_parameter` omits the access type
    #[must_use]
    pub fn describe(&self, as_parameter: bool) -> ModelNode {
        let mut node = ModelNode::object()
            .with(keys::TYPE, self.model_type)
            .with(keys::DESCRIPTION, self.description.as_str())
            .with(keys::REQUIRED, self.required)
            .with(keys::EXPRESSIONS_ALLOWED, self.expressions_allowed);
        if !as_parameter {
            node = node.with(keys::ACCESS_TYPE, self.access.as_str());
        }
        if !self.allowed.is_empty() {
            node = node.with(keys::ALLOWED, self.allowed.clone());
        }
        if let Some(default) = &self.default {
            node = node.with(keys::DEFAULT, default.clone());
        }
        if let Some(value_type) = self.value_type {
            node = node.with(keys::VALUE_TYPE, value_type);
        }
        if let Some(min) = self.min {
            node = node.with(keys::MIN, min);
        }
        if let Some(max) = self.max {
            node = node.with(keys::MAX, max);
        }
        node
    }
}

/// Definition of a resource type and its children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceDefinition {
    description: String,
    attributes: IndexMap<String, AttributeDefinition>,
    children: IndexMap<PathElement, ResourceDefinition>,
}

impl ResourceDefinition {
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeDefinition) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    /// Register a child type; `element` may have a wildcard value
    #[must_use]
    pub fn with_child(mut self, element: PathElement, child: ResourceDefinition) -> Self {
        self.children.insert(element, child);
        self
    }

    #[inline]
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.get(name)
    }

    #[inline]
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.attributes.values()
    }

    /// Definition of the child at `element`, exact registrations first
    #[must_use]
    pub fn child(&self, element: &PathElement) -> Option<&ResourceDefinition> {
        self.children
            .get(element)
            .or_else(|| self.children.get(&PathElement::wildcard(element.key())))
    }

    /// `read-resource-description` result
    ///
    /// `addressable` adds the `add` and `remove` operations; the root
    /// resource has neither. Children are described when `recursive`.
    #[must_use]
    pub fn describe(&self, addressable: bool, recursive: bool) -> ModelNode {
        let attributes: ModelNode = self
            .attributes
            .iter()
            .map(|(name, attribute)| (name.clone(), attribute.describe(false)))
            .collect();

        let mut operations = ModelNode::object();
        if addressable {
            let request: ModelNode = self
                .attributes
                .iter()
                .filter(|(_, attribute)| attribute.access != AccessType::Metric)
                .map(|(name, attribute)| (name.clone(), attribute.describe(true)))
                .collect();
            operations = operations
                .with(
                    keys::ADD,
                    ModelNode::object()
                        .with(keys::OPERATION_NAME, keys::ADD)
                        .with(keys::DESCRIPTION, "Add the resource")
                        .with(keys::REQUEST_PROPERTIES, request),
                )
                .with(
                    keys::REMOVE,
                    ModelNode::object()
                        .with(keys::OPERATION_NAME, keys::REMOVE)
                        .with(keys::DESCRIPTION, "Remove the resource"),
                );
        }

        let mut children: IndexMap<String, (String, IndexMap<String, ModelNode>)> =
            IndexMap::new();
        for (element, child) in &self.children {
            let model = if recursive {
                child.describe(true, true)
            } else {
                ModelNode::Undefined
            };
            children
                .entry(element.key().to_string())
                .or_insert_with(|| (child.description.clone(), IndexMap::new()))
                .1
                .insert(element.value().to_string(), model);
        }
        let children: ModelNode = children
            .into_iter()
            .map(|(key, (description, models))| {
                (
                    key,
                    ModelNode::object()
                        .with(keys::DESCRIPTION, description)
                        .with(keys::MODEL_DESCRIPTION, models),
                )
            })
            .collect();

        ModelNode::object()
            .with(keys::DESCRIPTION, self.description.as_str())
            .with(keys::ATTRIBUTES, attributes)
            .with(keys::OPERATIONS, operations)
            .with(keys::CHILDREN, children)
    }
}

/// Resource definitions of one kernel version, rooted at the empty address
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceRegistry {
    root: ResourceDefinition,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new(root: ResourceDefinition) -> Self {
        Self { root }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &ResourceDefinition {
        &self.root
    }

    /// Definition governing `address`
    #[must_use]
    pub fn find(&self, address: &PathAddress) -> Option<&ResourceDefinition> {
        address
            .iter()
            .try_fold(&self.root, |definition, element| definition.child(element))
    }

    /// `read-resource-description` result for `address`
    #[must_use]
    pub fn describe(&self, address: &PathAddress, recursive: bool) -> Option<ModelNode> {
        self.find(address)
            .map(|definition| definition.describe(!address.is_empty(), recursive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modeltest_policy::ModelDescriptionValidator;

    fn registry() -> ResourceRegistry {
        let handler = ResourceDefinition::new("A console handler")
            .with_attribute(
                AttributeDefinition::new("level", ModelType::String)
                    .allow_expressions()
                    .with_default("ALL"),
            )
            .with_attribute(
                AttributeDefinition::new("target", ModelType::String)
                    .with_allowed(["System.out", "System.err"]),
            )
            .with_attribute(
                AttributeDefinition::new("handlers", ModelType::List)
                    .with_value_type(ModelType::String),
            );
        let subsystem = ResourceDefinition::new("The logging subsystem")
            .with_child(PathElement::wildcard("console-handler"), handler);
        ResourceRegistry::new(
            ResourceDefinition::new("The root resource")
                .with_child(PathElement::new("subsystem", "logging"), subsystem),
        )
    }

    #[test]
    fn find_resolves_wildcards() {
        let registry = registry();
        let address: PathAddress = "/subsystem=logging/console-handler=CONSOLE".parse().unwrap();
        let definition = registry.find(&address).unwrap();
        assert!(definition.attribute("target").is_some());
        assert!(registry.find(&"/subsystem=ee".parse().unwrap()).is_none());
        assert!(registry.find(&PathAddress::root()).is_some());
    }

    #[test]
    fn description_is_well_formed() {
        let registry = registry();
        let description = registry.describe(&PathAddress::root(), true).unwrap();
        let failures = ModelDescriptionValidator::new().validate(&PathAddress::root(), &description);
        assert!(failures.is_empty(), "{failures:?}");
    }

    #[test]
    fn add_describes_non_metric_attributes() {
        let handler = ResourceDefinition::new("h")
            .with_attribute(AttributeDefinition::new("level", ModelType::String))
            .with_attribute(
                AttributeDefinition::new("count", ModelType::Long).with_access(AccessType::Metric),
            );
        let description = handler.describe(true, false);
        let request = description
            .get_path(&[keys::OPERATIONS, keys::ADD, keys::REQUEST_PROPERTIES])
            .unwrap();
        assert!(request.has("level"));
        assert!(!request.has("count"));
        assert!(description.get_path(&[keys::ATTRIBUTES, "count"]).is_some());
    }

    #[test]
    fn root_has_no_add() {
        let description = registry().describe(&PathAddress::root(), false).unwrap();
        assert!(description.get_path(&[keys::OPERATIONS, keys::ADD]).is_none());
        assert_eq!(
            description.get_path(&[keys::CHILDREN, "subsystem", keys::MODEL_DESCRIPTION, "logging"]),
            Some(&ModelNode::Undefined)
        );
    }
}
