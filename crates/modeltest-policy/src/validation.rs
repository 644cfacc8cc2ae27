//! Operation validation against resource descriptions

use modeltest_model::{keys, ModelNode, ModelType, Operation};

use crate::description::ValidationFailure;

/// Operations every resource supports without describing them
const GLOBAL_OPERATIONS: &[&str] = &[
    keys::READ_RESOURCE,
    keys::READ_RESOURCE_DESCRIPTION,
    keys::READ_ATTRIBUTE,
    keys::COMPOSITE,
];

/// Validates operation parameters against the description of the resource
/// they address
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationValidator;

impl OperationValidator {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate `operation` against `description`
    ///
    /// `description` is the `read-resource-description` result for the
    /// operation's address.
    ///
    /// # Errors
    /// Returns every problem found
    pub fn validate(
        &self,
        operation: &Operation,
        description: &ModelNode,
    ) -> Result<(), Vec<ValidationFailure>> {
        let mut failures = Vec::new();
        match operation.name() {
            keys::WRITE_ATTRIBUTE => {
                self.validate_attribute_access(operation, description, true, &mut failures);
            }
            keys::UNDEFINE_ATTRIBUTE => {
                self.validate_attribute_access(operation, description, false, &mut failures);
            }
            name if GLOBAL_OPERATIONS.contains(&name) => {}
            name => match description.get_path(&[keys::OPERATIONS, name]) {
                Some(described) => {
                    self.validate_params(operation, described, &mut failures);
                }
                None => failures.push(
                    ValidationFailure::new(operation.address(), "operation is not described")
                        .with_subject(name),
                ),
            },
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    fn validate_params(
        &self,
        operation: &Operation,
        described: &ModelNode,
        failures: &mut Vec<ValidationFailure>,
    ) {
        let empty = ModelNode::object();
        let properties = described.get(keys::REQUEST_PROPERTIES).unwrap_or(&empty);

        for (param, value) in operation.params() {
            match properties.get(param) {
                Some(descriptor) => {
                    check_value(operation, param, value, descriptor, failures);
                }
                None => failures.push(
                    ValidationFailure::new(operation.address(), "unknown parameter")
                        .with_subject(format!("{}({param})", operation.name())),
                ),
            }
        }

        for (param, descriptor) in properties.as_object().into_iter().flatten() {
            if !operation.params().contains_key(param) && is_required(descriptor) {
                failures.push(
                    ValidationFailure::new(operation.address(), "missing required parameter")
                        .with_subject(format!("{}({param})", operation.name())),
                );
            }
        }
    }

    fn validate_attribute_access(
        &self,
        operation: &Operation,
        description: &ModelNode,
        is_write: bool,
        failures: &mut Vec<ValidationFailure>,
    ) {
        let Some(attribute) = operation.attribute_name() else {
            failures.push(ValidationFailure::new(
                operation.address(),
                format!("{} has no attribute name", operation.name()),
            ));
            return;
        };
        let Some(descriptor) = description.get_path(&[keys::ATTRIBUTES, attribute]) else {
            failures.push(
                ValidationFailure::new(operation.address(), "no such attribute")
                    .with_subject(attribute),
            );
            return;
        };
        let writable = descriptor.get(keys::ACCESS_TYPE).and_then(ModelNode::as_str)
            == Some(keys::READ_WRITE);
        if !writable {
            failures.push(
                ValidationFailure::new(operation.address(), "attribute is not writable")
                    .with_subject(attribute),
            );
            return;
        }

        if is_write {
            let value = operation.param(keys::VALUE).unwrap_or(&ModelNode::Undefined);
            check_value(operation, attribute, value, descriptor, failures);
        } else if is_required(descriptor) {
            failures.push(
                ValidationFailure::new(operation.address(), "required attribute cannot be undefined")
                    .with_subject(attribute),
            );
        }
    }
}

fn is_required(descriptor: &ModelNode) -> bool {
    let required = descriptor
        .get(keys::REQUIRED)
        .and_then(ModelNode::as_bool)
        .unwrap_or(false);
    required && !descriptor.has_defined(keys::DEFAULT)
}

fn check_value(
    operation: &Operation,
    name: &str,
    value: &ModelNode,
    descriptor: &ModelNode,
    failures: &mut Vec<ValidationFailure>,
) {
    let mut fail = |message: String| {
        failures.push(ValidationFailure::new(operation.address(), message).with_subject(name));
    };

    if !value.is_defined() {
        if is_required(descriptor) {
            fail("required value is undefined".to_string());
        }
        return;
    }

    if let ModelNode::Expression(expr) = value {
        let allowed = descriptor
            .get(keys::EXPRESSIONS_ALLOWED)
            .and_then(ModelNode::as_bool)
            .unwrap_or(false);
        if !allowed {
            fail(format!("expressions are not allowed: {expr}"));
        }
        return;
    }

    let Some(expected) = descriptor.get(keys::TYPE).and_then(ModelNode::as_type) else {
        return;
    };
    if !type_accepts(expected, value) {
        fail(format!("expected {expected}, found {} {value}", value.model_type()));
        return;
    }

    if let Some(allowed) = descriptor.get(keys::ALLOWED).and_then(ModelNode::as_list) {
        let text = value.as_string();
        if !allowed.iter().any(|a| a.as_string() == text) {
            let allowed: Vec<String> = allowed.iter().map(ModelNode::as_string).collect();
            fail(format!("'{text}' is not one of {allowed:?}"));
        }
    }

    if matches!(expected, ModelType::Int | ModelType::Long | ModelType::Double) {
        if let Some(number) = value.as_f64() {
            if let Some(min) = descriptor.get(keys::MIN).and_then(ModelNode::as_f64) {
                if number < min {
                    fail(format!("{number} is below the minimum {min}"));
                }
            }
            if let Some(max) = descriptor.get(keys::MAX).and_then(ModelNode::as_f64) {
                if number > max {
                    fail(format!("{number} is above the maximum {max}"));
                }
            }
        }
    }

    match (value, descriptor.get(keys::VALUE_TYPE)) {
        (ModelNode::List(items), Some(ModelNode::Type(element))) => {
            for (index, item) in items.iter().enumerate() {
                if item.is_defined() && !type_accepts(*element, item) {
                    fail(format!("element {index} is not {element}: {item}"));
                }
            }
        }
        (ModelNode::Object(fields), Some(ModelNode::Object(field_descriptors))) => {
            for key in fields.keys() {
                if !field_descriptors.contains_key(key) {
                    fail(format!("unknown field '{key}'"));
                }
            }
            for (key, field_descriptor) in field_descriptors {
                let field = fields.get(key).unwrap_or(&ModelNode::Undefined);
                let subject = format!("{name}.{key}");
                check_value(operation, &subject, field, field_descriptor, failures);
            }
        }
        _ => {}
    }
}

/// Check if `value` is an acceptable representation of `expected`
fn type_accepts(expected: ModelType, value: &ModelNode) -> bool {
    match expected {
        ModelType::String => !value.model_type().is_complex(),
        ModelType::Boolean => value.as_bool().is_some(),
        ModelType::Int => value
            .as_i64()
            .is_some_and(|v| i32::try_from(v).is_ok()),
        ModelType::Long | ModelType::BigInteger => value.as_i64().is_some()
            || matches!(value, ModelNode::BigInteger(_)),
        ModelType::Double => value.as_f64().is_some(),
        ModelType::Type => value.as_type().is_some(),
        ModelType::List => matches!(value, ModelNode::List(_)),
        ModelType::Object => matches!(value, ModelNode::Object(_)),
        ModelType::Property => matches!(value, ModelNode::Property(..)),
        ModelType::Expression => matches!(value, ModelNode::Expression(_) | ModelNode::String(_)),
        ModelType::Undefined => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modeltest_model::PathAddress;

    fn param(model_type: ModelType) -> ModelNode {
        ModelNode::object()
            .with(keys::TYPE, model_type)
            .with(keys::DESCRIPTION, "A parameter")
    }

    fn description() -> ModelNode {
        let level = param(ModelType::String)
            .with(keys::EXPRESSIONS_ALLOWED, true)
            .with(
                keys::ALLOWED,
                ModelNode::List(vec!["INFO".into(), "DEBUG".into(), "WARN".into()]),
            );
        let target = param(ModelType::String).with(
            keys::ALLOWED,
            ModelNode::List(vec!["System.out".into(), "System.err".into()]),
        );
        let max_index = param(ModelType::Int).with(keys::MIN, 1).with(keys::MAX, 10);
        let named = param(ModelType::String).with(keys::REQUIRED, true);
        ModelNode::object()
            .with(keys::DESCRIPTION, "A console handler")
            .with(
                keys::ATTRIBUTES,
                ModelNode::object()
                    .with("level", level.clone().with(keys::ACCESS_TYPE, keys::READ_WRITE))
                    .with("target", target.clone().with(keys::ACCESS_TYPE, keys::READ_WRITE))
                    .with("name", named.clone().with(keys::ACCESS_TYPE, keys::READ_ONLY)),
            )
            .with(
                keys::OPERATIONS,
                ModelNode::object().with(
                    keys::ADD,
                    ModelNode::object()
                        .with(keys::OPERATION_NAME, keys::ADD)
                        .with(keys::DESCRIPTION, "Add")
                        .with(
                            keys::REQUEST_PROPERTIES,
                            ModelNode::object()
                                .with("level", level)
                                .with("target", target)
                                .with("max-index", max_index)
                                .with("name", named),
                        ),
                ),
            )
    }

    fn handler() -> PathAddress {
        "/subsystem=logging/console-handler=CONSOLE".parse().unwrap()
    }

    #[test]
    fn valid_add_passes() {
        let op = Operation::add(handler())
            .with_param("name", "CONSOLE")
            .with_param("level", ModelNode::expression("${lvl:INFO}"))
            .with_param("max-index", "5");
        assert_eq!(OperationValidator::new().validate(&op, &description()), Ok(()));
    }

    #[test]
    fn add_reports_every_problem() {
        let op = Operation::add(handler())
            .with_param("level", "TRACE")
            .with_param("max-index", 42)
            .with_param("colour", "blue");
        let failures = OperationValidator::new()
            .validate(&op, &description())
            .unwrap_err();
        let messages: Vec<&str> = failures.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(failures.len(), 4, "{messages:?}");
        assert!(messages.iter().any(|m| m.contains("not one of")));
        assert!(messages.iter().any(|m| m.contains("above the maximum")));
        assert!(messages.contains(&"unknown parameter"));
        assert!(messages.contains(&"missing required parameter"));
    }

    #[test]
    fn expressions_need_opt_in() {
        let op = Operation::add(handler())
            .with_param("name", "CONSOLE")
            .with_param("target", ModelNode::expression("${t:System.out}"));
        let failures = OperationValidator::new()
            .validate(&op, &description())
            .unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].subject.as_deref(), Some("target"));
    }

    #[test]
    fn write_attribute_checks_value_and_access() {
        let validator = OperationValidator::new();
        let ok = Operation::write_attribute(handler(), "target", "System.err");
        assert!(validator.validate(&ok, &description()).is_ok());

        let bad_value = Operation::write_attribute(handler(), "target", "stdout");
        assert!(validator.validate(&bad_value, &description()).is_err());

        let read_only = Operation::write_attribute(handler(), "name", "OTHER");
        let failures = validator.validate(&read_only, &description()).unwrap_err();
        assert_eq!(failures[0].message, "attribute is not writable");

        let unknown = Operation::write_attribute(handler(), "colour", "blue");
        assert!(validator.validate(&unknown, &description()).is_err());
    }

    #[test]
    fn undescribed_operation_fails_but_globals_pass() {
        let validator = OperationValidator::new();
        let custom = Operation::new("flush", handler());
        assert!(validator.validate(&custom, &description()).is_err());
        let read = Operation::read_resource(handler(), true);
        assert!(validator.validate(&read, &description()).is_ok());
    }

    #[test]
    fn int_range_enforced_by_type() {
        assert!(type_accepts(ModelType::Int, &ModelNode::from(5_i64)));
        assert!(!type_accepts(ModelType::Int, &ModelNode::from(i64::MAX)));
        assert!(type_accepts(ModelType::Long, &ModelNode::from(i64::MAX)));
        assert!(!type_accepts(ModelType::Boolean, &ModelNode::from("maybe")));
    }
}
