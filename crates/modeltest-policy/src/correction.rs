//! Correction policy
//!
//! A [`CorrectionPolicy`] is a declarative table stating, per address
//! pattern, how a legacy model version treats an operation: rejected
//! because of specific attributes, rejected as a whole, discarded, or
//! accepted as is. For rejected attributes the policy also knows how to
//! correct the operation, one offending attribute at a time.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use modeltest_model::{keys, ModelNode, Operation, PathAddress};

use crate::check::AttributeCheck;

/// Callback run before the legacy composite is executed
pub type BeforeCompositeCallback = Arc<dyn Fn() + Send + Sync>;

/// Expected treatment of operations addressed at one resource pattern
#[derive(Debug, Clone)]
pub enum AddressRule {
    /// Some attributes are rejected and can be corrected
    Attributes(AttributesRule),

    /// The resource does not exist in the legacy version and every
    /// operation on it is rejected
    RejectedResource,

    /// The resource does not exist in the legacy version and operations on
    /// it are silently dropped
    DiscardedResource,
}

/// Attribute level rejections for one resource
///
/// The same attribute may carry several checks; they are evaluated and
/// corrected in declaration order.
#[derive(Debug, Clone, Default)]
pub struct AttributesRule {
    checks: Vec<(String, Arc<dyn AttributeCheck>)>,
    read_only: HashSet<String>,
    no_write_failure: HashSet<String>,
}

impl AttributesRule {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `attribute` to be rejected whenever `check` says so
    #[must_use]
    pub fn with_check(
        mut self,
        attribute: impl Into<String>,
        check: impl AttributeCheck + 'static,
    ) -> Self {
        self.checks.push((attribute.into(), Arc::new(check)));
        self
    }

    /// Apply the same check to several attributes
    #[must_use]
    pub fn with_checks<C>(mut self, attributes: &[&str], check: C) -> Self
    where
        C: AttributeCheck + Clone + 'static,
    {
        for attribute in attributes {
            self.checks
                .push(((*attribute).to_string(), Arc::new(check.clone())));
        }
        self
    }

    /// Mark an attribute read-only: no `write-attribute` is generated for it
    #[must_use]
    pub fn with_read_only(mut self, attribute: impl Into<String>) -> Self {
        self.read_only.insert(attribute.into());
        self
    }

    /// Expect `write-attribute` of `attribute` to pass even though `add`
    /// with the same value is rejected
    #[must_use]
    pub fn with_no_write_failure(mut self, attribute: impl Into<String>) -> Self {
        self.no_write_failure.insert(attribute.into());
        self
    }

    /// Attribute names covered by this rule, in declaration order
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        let mut seen = HashSet::new();
        self.checks
            .iter()
            .map(|(attribute, _)| attribute.as_str())
            .filter(move |attribute| seen.insert(*attribute))
    }

    fn first_failing(&self, operation: &Operation) -> Option<(&str, &dyn AttributeCheck)> {
        self.checks.iter().find_map(|(attribute, check)| {
            let value = operation.param(attribute)?;
            check
                .check(attribute, value, false)
                .then_some((attribute.as_str(), check.as_ref()))
        })
    }

    fn first_failing_write(
        &self,
        attribute: &str,
        value: &ModelNode,
    ) -> Option<&dyn AttributeCheck> {
        if self.no_write_failure.contains(attribute) {
            return None;
        }
        self.checks
            .iter()
            .filter(|(name, _)| name == attribute)
            .find(|(_, check)| check.check(attribute, value, true))
            .map(|(_, check)| check.as_ref())
    }
}

/// Declarative expectation table for one legacy model version
///
/// Rules are matched against an operation's address in declaration order;
/// the first matching pattern wins. Operations without a matching rule are
/// expected to pass unchanged.
#[derive(Clone)]
pub struct CorrectionPolicy {
    rules: Vec<(PathAddress, AddressRule)>,
    transform_composite: bool,
    before_composite: Option<BeforeCompositeCallback>,
}

impl CorrectionPolicy {
    /// Policy expecting every operation to pass
    #[must_use]
    pub fn no_failures() -> Self {
        Self {
            rules: Vec::new(),
            transform_composite: true,
            before_composite: None,
        }
    }

    /// Add a rule for an address pattern
    #[must_use]
    pub fn with_rule(mut self, pattern: PathAddress, rule: AddressRule) -> Self {
        self.rules.push((pattern, rule));
        self
    }

    /// Add attribute rejections for an address pattern
    #[must_use]
    pub fn with_attributes(self, pattern: PathAddress, rule: AttributesRule) -> Self {
        self.with_rule(pattern, AddressRule::Attributes(rule))
    }

    /// Expect all operations on `pattern` to be rejected
    #[must_use]
    pub fn with_rejected_resource(self, pattern: PathAddress) -> Self {
        self.with_rule(pattern, AddressRule::RejectedResource)
    }

    /// Expect all operations on `pattern` to be discarded
    #[must_use]
    pub fn with_discarded_resource(self, pattern: PathAddress) -> Self {
        self.with_rule(pattern, AddressRule::DiscardedResource)
    }

    /// Choose whether accepted operations are replayed as one composite
    /// transformed as a whole (`true`, the default) or as a composite of
    /// individually transformed operations
    #[must_use]
    pub fn with_transform_composite(mut self, transform_composite: bool) -> Self {
        self.transform_composite = transform_composite;
        self
    }

    /// Run `callback` before the legacy composite is executed
    #[must_use]
    pub fn with_before_composite(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_composite = Some(Arc::new(callback));
        self
    }

    #[inline]
    #[must_use]
    pub fn transform_composite(&self) -> bool {
        self.transform_composite
    }

    /// Invoke the before-composite callback, if any
    pub fn invoke_before_composite(&self) {
        if let Some(callback) = &self.before_composite {
            callback();
        }
    }

    /// Rule governing `address`
    #[must_use]
    pub fn rule_for(&self, address: &PathAddress) -> Option<&AddressRule> {
        self.rules
            .iter()
            .find(|(pattern, _)| address.matches(pattern))
            .map(|(_, rule)| rule)
    }

    /// Check if the legacy version is expected to reject `operation`
    #[must_use]
    pub fn expect_failed(&self, operation: &Operation) -> bool {
        match self.rule_for(operation.address()) {
            None | Some(AddressRule::DiscardedResource) => false,
            Some(AddressRule::RejectedResource) => true,
            Some(AddressRule::Attributes(rule)) => {
                if operation.name() == keys::WRITE_ATTRIBUTE {
                    self.expect_failed_write_attribute(operation)
                } else {
                    rule.first_failing(operation).is_some()
                }
            }
        }
    }

    /// Check if a rejected operation can be corrected further
    ///
    /// Always `false` for rejected resources: such operations are dropped
    /// rather than corrected.
    #[must_use]
    pub fn can_correct_more(&self, operation: &Operation) -> bool {
        match self.rule_for(operation.address()) {
            Some(AddressRule::Attributes(_)) => self.expect_failed(operation),
            _ => false,
        }
    }

    /// Correct the first offending attribute of `operation`
    ///
    /// # Errors
    /// Returns [`PolicyError::NothingToCorrect`] if no attribute of the
    /// operation is expected to fail, or the corrector's error
    pub fn correct_operation(&self, operation: &Operation) -> Result<Operation, PolicyError> {
        let Some(AddressRule::Attributes(rule)) = self.rule_for(operation.address()) else {
            return Err(PolicyError::NothingToCorrect(operation.to_string()));
        };
        if operation.name() == keys::WRITE_ATTRIBUTE {
            return self.correct_write_attribute_operation(operation);
        }
        let (attribute, check) = rule
            .first_failing(operation)
            .ok_or_else(|| PolicyError::NothingToCorrect(operation.to_string()))?;
        let value = operation.param(attribute).cloned().unwrap_or_default();
        let corrected = check.correct(attribute, &value, false)?;
        tracing::debug!(
            operation = %operation,
            attribute,
            check = check.name(),
            corrected = %corrected,
            "Corrected attribute"
        );

        let mut operation = operation.clone();
        operation.set_param(attribute, corrected);
        Ok(operation)
    }

    /// Check if the legacy version is expected to discard `operation`
    #[must_use]
    pub fn expect_discarded(&self, operation: &Operation) -> bool {
        matches!(
            self.rule_for(operation.address()),
            Some(AddressRule::DiscardedResource)
        )
    }

    /// `write-attribute` operations equivalent to an `add`
    ///
    /// One operation per attribute of the matching rule set to a defined
    /// value in the `add`, read-only attributes excluded. Empty for anything
    /// but `add` or when no attribute rule matches.
    #[must_use]
    pub fn create_write_attribute_operations(&self, operation: &Operation) -> Vec<Operation> {
        if operation.name() != keys::ADD {
            return Vec::new();
        }
        let Some(AddressRule::Attributes(rule)) = self.rule_for(operation.address()) else {
            return Vec::new();
        };
        rule.attributes()
            .filter(|attribute| !rule.read_only.contains(*attribute))
            .filter_map(|attribute| {
                operation
                    .param(attribute)
                    .filter(|value| value.is_defined())
                    .map(|value| {
                        Operation::write_attribute(
                            operation.address().clone(),
                            attribute,
                            value.clone(),
                        )
                    })
            })
            .collect()
    }

    /// Check if a `write-attribute` operation is expected to be rejected
    #[must_use]
    pub fn expect_failed_write_attribute(&self, operation: &Operation) -> bool {
        self.write_attribute_check(operation).is_some()
    }

    /// Correct the value of a rejected `write-attribute` operation
    ///
    /// # Errors
    /// Returns error if the operation is not a `write-attribute`, is not
    /// expected to fail, or its value cannot be corrected
    pub fn correct_write_attribute_operation(
        &self,
        operation: &Operation,
    ) -> Result<Operation, PolicyError> {
        if operation.name() != keys::WRITE_ATTRIBUTE {
            return Err(PolicyError::NotWriteAttribute(operation.to_string()));
        }
        let (attribute, check) = self
            .write_attribute_check(operation)
            .ok_or_else(|| PolicyError::NothingToCorrect(operation.to_string()))?;
        let value = operation.param(keys::VALUE).cloned().unwrap_or_default();
        let corrected = check.correct(attribute, &value, true)?;
        tracing::debug!(
            operation = %operation,
            attribute,
            corrected = %corrected,
            "Corrected write-attribute value"
        );

        let mut operation = operation.clone();
        operation.set_param(keys::VALUE, corrected);
        Ok(operation)
    }

    fn write_attribute_check<'a>(
        &'a self,
        operation: &'a Operation,
    ) -> Option<(&'a str, &'a dyn AttributeCheck)> {
        if operation.name() != keys::WRITE_ATTRIBUTE {
            return None;
        }
        let Some(AddressRule::Attributes(rule)) = self.rule_for(operation.address()) else {
            return None;
        };
        let attribute = operation.attribute_name()?;
        let value = operation.param(keys::VALUE).unwrap_or(&ModelNode::Undefined);
        rule.first_failing_write(attribute, value)
            .map(|check| (attribute, check))
    }
}

impl Default for CorrectionPolicy {
    fn default() -> Self {
        Self::no_failures()
    }
}

impl fmt::Debug for CorrectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrectionPolicy")
            .field("rules", &self.rules)
            .field("transform_composite", &self.transform_composite)
            .field("before_composite", &self.before_composite.is_some())
            .finish()
    }
}

/// Errors raised while applying a policy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// The policy has nothing to correct on this operation
    #[error("policy has nothing to correct in {0}")]
    NothingToCorrect(String),

    /// A corrector could not produce an acceptable value
    #[error("cannot correct attribute '{attribute}': {message}")]
    CorrectionFailed {
        /// Attribute being corrected
        attribute: String,
        /// Corrector failure
        message: String,
    },

    /// Operation was expected to be a `write-attribute`
    #[error("not a write-attribute operation: {0}")]
    NotWriteAttribute(String),

    /// Operation could not be decoded
    #[error("malformed operation {operation}: {message}")]
    InvalidOperation {
        /// Offending operation
        operation: String,
        /// Decoding failure
        message: String,
    },

    /// Expression resolution during validation filtering failed
    #[error("cannot resolve expressions in {operation}: {message}")]
    Unresolvable {
        /// Operation being filtered
        operation: String,
        /// Resolver failure
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CustomCheck, NewAttribute, RejectExpressions};

    fn handler() -> PathAddress {
        "/subsystem=logging/console-handler=CONSOLE".parse().unwrap()
    }

    fn handler_pattern() -> PathAddress {
        "/subsystem=logging/console-handler=*".parse().unwrap()
    }

    fn policy() -> CorrectionPolicy {
        CorrectionPolicy::no_failures()
            .with_attributes(
                handler_pattern(),
                AttributesRule::new()
                    .with_checks(&["level", "autoflush"], RejectExpressions::new())
                    .with_check("filter-spec", NewAttribute)
                    .with_read_only("autoflush"),
            )
            .with_rejected_resource("/subsystem=logging/json-formatter=*".parse().unwrap())
            .with_discarded_resource("/subsystem=logging/log-store=*".parse().unwrap())
    }

    #[test]
    fn unmatched_operation_passes() {
        let op = Operation::add("/subsystem=logging/root-logger=ROOT".parse().unwrap())
            .with_param("level", ModelNode::expression("${x:INFO}"));
        let policy = policy();
        assert!(!policy.expect_failed(&op));
        assert!(!policy.expect_discarded(&op));
        assert!(!policy.can_correct_more(&op));
    }

    #[test]
    fn corrects_one_attribute_at_a_time() {
        let policy = policy();
        let op = Operation::add(handler())
            .with_param("level", ModelNode::expression("${lvl:DEBUG}"))
            .with_param("filter-spec", "match(\"x\")");
        assert!(policy.expect_failed(&op));

        let once = policy.correct_operation(&op).unwrap();
        assert_eq!(once.param("level"), Some(&ModelNode::from("DEBUG")));
        assert_eq!(once.param("filter-spec"), Some(&ModelNode::from("match(\"x\")")));
        assert!(policy.can_correct_more(&once));

        let twice = policy.correct_operation(&once).unwrap();
        assert_eq!(twice.param("filter-spec"), Some(&ModelNode::Undefined));
        assert!(!policy.can_correct_more(&twice));
        assert!(!policy.expect_failed(&twice));
    }

    #[test]
    fn correcting_accepted_operation_fails() {
        let op = Operation::add(handler()).with_param("level", "INFO");
        assert!(matches!(
            policy().correct_operation(&op),
            Err(PolicyError::NothingToCorrect(_))
        ));
    }

    #[test]
    fn rejected_resource_cannot_be_corrected() {
        let op = Operation::add("/subsystem=logging/json-formatter=JSON".parse().unwrap());
        let policy = policy();
        assert!(policy.expect_failed(&op));
        assert!(!policy.can_correct_more(&op));
        assert!(!policy.expect_discarded(&op));
    }

    #[test]
    fn discarded_resource_is_not_failed() {
        let op = Operation::add("/subsystem=logging/log-store=S".parse().unwrap());
        let policy = policy();
        assert!(policy.expect_discarded(&op));
        assert!(!policy.expect_failed(&op));
        assert!(policy.create_write_attribute_operations(&op).is_empty());
    }

    #[test]
    fn write_attributes_skip_read_only_and_absent() {
        let op = Operation::add(handler())
            .with_param("level", "INFO")
            .with_param("autoflush", true)
            .with_param("target", "System.out");
        let writes = policy().create_write_attribute_operations(&op);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].attribute_name(), Some("level"));
    }

    #[test]
    fn write_attributes_skip_undefined_values() {
        let policy = CorrectionPolicy::no_failures().with_attributes(
            handler_pattern(),
            AttributesRule::new()
                .with_check("level", RejectExpressions::new())
                .with_check("filter-spec", NewAttribute),
        );
        let op = Operation::add(handler())
            .with_param("level", "INFO")
            .with_param("filter-spec", ModelNode::Undefined);
        let writes = policy.create_write_attribute_operations(&op);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].attribute_name(), Some("level"));
    }

    #[test]
    fn write_attribute_correction() {
        let policy = CorrectionPolicy::no_failures().with_attributes(
            handler_pattern(),
            AttributesRule::new().with_check(
                "target",
                CustomCheck::allowed_values("target", &["System.out"], "System.out"),
            ),
        );
        let write = Operation::write_attribute(handler(), "target", "System.err");
        assert!(policy.expect_failed_write_attribute(&write));
        let corrected = policy.correct_write_attribute_operation(&write).unwrap();
        assert_eq!(corrected.param(keys::VALUE), Some(&ModelNode::from("System.out")));
        assert!(!policy.expect_failed_write_attribute(&corrected));
    }

    #[test]
    fn no_write_failure_attributes_pass_writes() {
        let policy = CorrectionPolicy::no_failures().with_attributes(
            handler_pattern(),
            AttributesRule::new()
                .with_check("filter-spec", NewAttribute)
                .with_no_write_failure("filter-spec"),
        );
        let add = Operation::add(handler()).with_param("filter-spec", "levels(INFO)");
        let write = Operation::write_attribute(handler(), "filter-spec", "levels(INFO)");
        assert!(policy.expect_failed(&add));
        assert!(!policy.expect_failed_write_attribute(&write));
    }

    #[test]
    fn before_composite_callback_runs() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let policy = CorrectionPolicy::no_failures().with_before_composite(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        policy.invoke_before_composite();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn first_matching_pattern_wins() {
        let policy = CorrectionPolicy::no_failures()
            .with_discarded_resource("/subsystem=logging/console-handler=LEGACY".parse().unwrap())
            .with_rejected_resource(handler_pattern());
        let legacy = Operation::add("/subsystem=logging/console-handler=LEGACY".parse().unwrap());
        assert!(policy.expect_discarded(&legacy));
        assert!(policy.expect_failed(&Operation::add(handler())));
    }
}
