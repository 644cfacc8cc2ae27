//! Resource description validation
//!
//! Checks that `read-resource-description` output is well formed: every
//! resource, attribute, operation and parameter is described, types are
//! known, and constraints are consistent.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use modeltest_model::{keys, ModelNode, ModelType, PathAddress, PathElement};

/// Single problem found while validating a description or operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Resource the problem was found on
    pub address: PathAddress,

    /// Attribute, operation or parameter involved, if any
    pub subject: Option<String>,

    /// What is wrong
    pub message: String,
}

impl ValidationFailure {
    #[must_use]
    pub fn new(address: &PathAddress, message: impl Into<String>) -> Self {
        Self {
            address: address.clone(),
            subject: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "{} [{subject}]: {}", self.address, self.message),
            None => write!(f, "{}: {}", self.address, self.message),
        }
    }
}

const ATTRIBUTE_KEYS: &[&str] = &[
    keys::TYPE,
    keys::DESCRIPTION,
    keys::VALUE_TYPE,
    keys::REQUIRED,
    keys::NILLABLE,
    keys::EXPRESSIONS_ALLOWED,
    keys::ACCESS_TYPE,
    keys::ALLOWED,
    keys::MIN,
    keys::MAX,
    keys::DEFAULT,
];

const ACCESS_TYPES: &[&str] = &[keys::READ_ONLY, keys::READ_WRITE, keys::METRIC];

/// Validator for resource description trees
#[derive(Debug, Clone, Default)]
pub struct ModelDescriptionValidator {
    extra_attribute_keys: HashSet<String>,
}

impl ModelDescriptionValidator {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept an additional descriptor key on attributes and parameters
    #[must_use]
    pub fn with_attribute_key(mut self, key: impl Into<String>) -> Self {
        self.extra_attribute_keys.insert(key.into());
        self
    }

    /// Validate the description of the resource at `address`, recursively
    #[must_use]
    pub fn validate(&self, address: &PathAddress, description: &ModelNode) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        self.validate_resource(address, description, &mut failures);
        failures
    }

    fn validate_resource(
        &self,
        address: &PathAddress,
        description: &ModelNode,
        failures: &mut Vec<ValidationFailure>,
    ) {
        if description.as_object().is_none() {
            failures.push(ValidationFailure::new(
                address,
                format!("description is not an OBJECT: {description}"),
            ));
            return;
        }
        check_description_text(address, None, description, failures);

        if let Some(attributes) = defined_object(address, description, keys::ATTRIBUTES, failures) {
            for (name, attribute) in attributes {
                self.validate_attribute(address, name, attribute, true, failures);
            }
        }

        if let Some(operations) = defined_object(address, description, keys::OPERATIONS, failures) {
            for (name, operation) in operations {
                self.validate_operation(address, name, operation, failures);
            }
        }

        if let Some(children) = defined_object(address, description, keys::CHILDREN, failures) {
            for (child_type, child) in children {
                let subject = Some(child_type.as_str());
                check_description_text(address, subject, child, failures);
                let Some(models) = child.get(keys::MODEL_DESCRIPTION) else {
                    continue;
                };
                let Some(models) = models.as_object() else {
                    failures.push(
                        ValidationFailure::new(address, "model-description is not an OBJECT")
                            .with_subject(child_type),
                    );
                    continue;
                };
                for (name, model) in models {
                    let child_address = address.child(PathElement::new(child_type, name));
                    self.validate_resource(&child_address, model, failures);
                }
            }
        }
    }

    fn validate_attribute(
        &self,
        address: &PathAddress,
        name: &str,
        attribute: &ModelNode,
        is_attribute: bool,
        failures: &mut Vec<ValidationFailure>,
    ) {
        let fail = |failures: &mut Vec<ValidationFailure>, message: String| {
            failures.push(ValidationFailure::new(address, message).with_subject(name));
        };

        let Some(map) = attribute.as_object() else {
            fail(failures, format!("descriptor is not an OBJECT: {attribute}"));
            return;
        };
        for key in map.keys() {
            let known = ATTRIBUTE_KEYS.contains(&key.as_str())
                || self.extra_attribute_keys.contains(key);
            if !known {
                fail(failures, format!("unknown descriptor key '{key}'"));
            }
        }
        check_description_text(address, Some(name), attribute, failures);

        let model_type = match attribute.get(keys::TYPE) {
            None | Some(ModelNode::Undefined) => {
                fail(failures, "missing type".to_string());
                None
            }
            Some(t) => {
                let parsed = t.as_type();
                if parsed.is_none() {
                    fail(failures, format!("unknown type {t}"));
                }
                parsed
            }
        };

        for flag in [keys::REQUIRED, keys::NILLABLE, keys::EXPRESSIONS_ALLOWED] {
            if let Some(value) = attribute.get(flag) {
                if value.is_defined() && value.as_bool().is_none() {
                    fail(failures, format!("'{flag}' is not a BOOLEAN: {value}"));
                }
            }
        }

        match (is_attribute, attribute.get(keys::ACCESS_TYPE)) {
            (true, None) => fail(failures, "missing access-type".to_string()),
            (true, Some(access)) => {
                let valid = access.as_str().is_some_and(|a| ACCESS_TYPES.contains(&a));
                if !valid {
                    fail(failures, format!("invalid access-type {access}"));
                }
            }
            (false, Some(_)) => fail(failures, "parameters have no access-type".to_string()),
            (false, None) => {}
        }

        if let Some(allowed) = attribute.get(keys::ALLOWED) {
            if allowed.as_list().is_none() {
                fail(failures, format!("'allowed' is not a LIST: {allowed}"));
            }
        }

        if let (Some(min), Some(max)) = (attribute.get(keys::MIN), attribute.get(keys::MAX)) {
            match (min.as_f64(), max.as_f64()) {
                (Some(lo), Some(hi)) if lo > hi => {
                    fail(failures, format!("min {min} is greater than max {max}"));
                }
                (Some(_), Some(_)) => {}
                _ => fail(failures, format!("min/max are not numeric: {min}, {max}")),
            }
        }

        let value_type = attribute.get(keys::VALUE_TYPE).filter(|v| v.is_defined());
        match (model_type, value_type) {
            (Some(ModelType::List), None) => {
                fail(failures, "LIST attribute has no value-type".to_string());
            }
            (Some(ModelType::List | ModelType::Object), Some(ModelNode::Object(fields))) => {
                for (field, descriptor) in fields {
                    let subject = format!("{name}.{field}");
                    self.validate_attribute(address, &subject, descriptor, false, failures);
                }
            }
            (Some(ModelType::List | ModelType::Object), Some(value_type)) => {
                if value_type.as_type().is_none() {
                    fail(failures, format!("invalid value-type {value_type}"));
                }
            }
            (Some(t), Some(_)) => {
                fail(failures, format!("value-type is not allowed on {t}"));
            }
            _ => {}
        }
    }

    fn validate_operation(
        &self,
        address: &PathAddress,
        name: &str,
        operation: &ModelNode,
        failures: &mut Vec<ValidationFailure>,
    ) {
        check_description_text(address, Some(name), operation, failures);
        match operation.get(keys::OPERATION_NAME).and_then(ModelNode::as_str) {
            Some(declared) if declared == name => {}
            Some(declared) => failures.push(
                ValidationFailure::new(
                    address,
                    format!("operation-name '{declared}' does not match registration"),
                )
                .with_subject(name),
            ),
            None => failures.push(
                ValidationFailure::new(address, "missing operation-name").with_subject(name),
            ),
        }

        for key in [keys::REQUEST_PROPERTIES, keys::REPLY_PROPERTIES] {
            let Some(properties) = operation.get(key).filter(|p| p.is_defined()) else {
                continue;
            };
            let Some(properties) = properties.as_object() else {
                failures.push(
                    ValidationFailure::new(address, format!("{key} is not an OBJECT"))
                        .with_subject(name),
                );
                continue;
            };
            if key == keys::REQUEST_PROPERTIES {
                for (param, descriptor) in properties {
                    let subject = format!("{name}({param})");
                    self.validate_attribute(address, &subject, descriptor, false, failures);
                }
            }
        }
    }
}

fn check_description_text(
    address: &PathAddress,
    subject: Option<&str>,
    node: &ModelNode,
    failures: &mut Vec<ValidationFailure>,
) {
    let ok = node
        .get(keys::DESCRIPTION)
        .and_then(ModelNode::as_str)
        .is_some_and(|d| !d.trim().is_empty());
    if !ok {
        let mut failure = ValidationFailure::new(address, "missing description");
        if let Some(subject) = subject {
            failure = failure.with_subject(subject);
        }
        failures.push(failure);
    }
}

fn defined_object<'a>(
    address: &PathAddress,
    description: &'a ModelNode,
    key: &str,
    failures: &mut Vec<ValidationFailure>,
) -> Option<&'a IndexMap<String, ModelNode>> {
    let node = description.get(key).filter(|n| n.is_defined())?;
    let map = node.as_object();
    if map.is_none() {
        failures.push(ValidationFailure::new(
            address,
            format!("'{key}' is not an OBJECT: {node}"),
        ));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribute(model_type: &str) -> ModelNode {
        ModelNode::object()
            .with(keys::TYPE, ModelNode::Type(model_type.parse().unwrap()))
            .with(keys::DESCRIPTION, "An attribute")
            .with(keys::ACCESS_TYPE, keys::READ_WRITE)
    }

    fn handler_description() -> ModelNode {
        ModelNode::object()
            .with(keys::DESCRIPTION, "A console handler")
            .with(
                keys::ATTRIBUTES,
                ModelNode::object()
                    .with("level", attribute("STRING"))
                    .with(
                        "handlers",
                        attribute("LIST").with(keys::VALUE_TYPE, ModelNode::Type(ModelType::String)),
                    ),
            )
            .with(
                keys::OPERATIONS,
                ModelNode::object().with(
                    keys::ADD,
                    ModelNode::object()
                        .with(keys::OPERATION_NAME, keys::ADD)
                        .with(keys::DESCRIPTION, "Add the handler")
                        .with(
                            keys::REQUEST_PROPERTIES,
                            ModelNode::object().with(
                                "level",
                                ModelNode::object()
                                    .with(keys::TYPE, ModelNode::Type(ModelType::String))
                                    .with(keys::DESCRIPTION, "The level"),
                            ),
                        ),
                ),
            )
    }

    fn root() -> PathAddress {
        "/subsystem=logging/console-handler=*".parse().unwrap()
    }

    #[test]
    fn well_formed_description_passes() {
        let failures = ModelDescriptionValidator::new().validate(&root(), &handler_description());
        assert!(failures.is_empty(), "{failures:?}");
    }

    #[test]
    fn missing_description_reported() {
        let mut description = handler_description();
        description.remove(keys::DESCRIPTION);
        let failures = ModelDescriptionValidator::new().validate(&root(), &description);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message, "missing description");
        assert_eq!(failures[0].subject, None);
    }

    #[test]
    fn list_without_value_type_reported() {
        let description = handler_description().with(
            keys::ATTRIBUTES,
            ModelNode::object().with("handlers", attribute("LIST")),
        );
        let failures = ModelDescriptionValidator::new().validate(&root(), &description);
        assert!(failures
            .iter()
            .any(|f| f.subject.as_deref() == Some("handlers") && f.message.contains("value-type")));
    }

    #[test]
    fn unknown_descriptor_key_needs_opt_in() {
        let description = handler_description().with(
            keys::ATTRIBUTES,
            ModelNode::object().with("level", attribute("STRING").with("storage", "configuration")),
        );
        assert_eq!(
            ModelDescriptionValidator::new()
                .validate(&root(), &description)
                .len(),
            1
        );
        assert!(ModelDescriptionValidator::new()
            .with_attribute_key("storage")
            .validate(&root(), &description)
            .is_empty());
    }

    #[test]
    fn min_greater_than_max_reported() {
        let description = handler_description().with(
            keys::ATTRIBUTES,
            ModelNode::object().with(
                "max-backup-index",
                attribute("INT").with(keys::MIN, 10).with(keys::MAX, 1),
            ),
        );
        let failures = ModelDescriptionValidator::new().validate(&root(), &description);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("greater than"));
    }

    #[test]
    fn operation_name_must_match_registration() {
        let description = handler_description().with(
            keys::OPERATIONS,
            ModelNode::object().with(
                keys::REMOVE,
                ModelNode::object()
                    .with(keys::OPERATION_NAME, keys::ADD)
                    .with(keys::DESCRIPTION, "Remove"),
            ),
        );
        let failures = ModelDescriptionValidator::new().validate(&root(), &description);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].subject.as_deref(), Some(keys::REMOVE));
    }

    #[test]
    fn children_validated_recursively() {
        let description = ModelNode::object()
            .with(keys::DESCRIPTION, "The logging subsystem")
            .with(
                keys::CHILDREN,
                ModelNode::object().with(
                    "console-handler",
                    ModelNode::object()
                        .with(keys::DESCRIPTION, "Console handlers")
                        .with(
                            keys::MODEL_DESCRIPTION,
                            ModelNode::object().with("*", ModelNode::object()),
                        ),
                ),
            );
        let failures = ModelDescriptionValidator::new()
            .validate(&"/subsystem=logging".parse().unwrap(), &description);
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].address.to_string(),
            "/subsystem=logging/console-handler=*"
        );
    }
}
