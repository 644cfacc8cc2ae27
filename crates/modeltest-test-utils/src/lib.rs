//! Testing utilities for the model test workspace
//!
//! Shared addresses, assertions and proptest strategies.

#![allow(missing_docs)]

use modeltest_model::{compare, CompareOptions, ModelNode, OperationResult, PathAddress};
use proptest::prelude::*;

pub const CONSOLE_HANDLERS: &str = "/subsystem=logging/console-handler=*";

pub fn address(path: &str) -> PathAddress {
    path.parse().unwrap()
}

pub fn logging() -> PathAddress {
    PathAddress::single("subsystem", "logging")
}

pub fn console_handler(name: &str) -> PathAddress {
    logging().append("console-handler", name)
}

pub fn expression(name: &str, default: &str) -> ModelNode {
    ModelNode::expression(format!("${{{name}:{default}}}"))
}

/// Unwrap a successful result
#[track_caller]
pub fn assert_success(result: OperationResult) -> ModelNode {
    match result.check_outcome() {
        Ok(node) => node,
        Err(err) => panic!("expected success: {err}"),
    }
}

/// Unwrap a failure description
#[track_caller]
pub fn assert_failed(result: OperationResult) -> String {
    match result.check_failed() {
        Ok(description) => description,
        Err(err) => panic!("expected failure: {err}"),
    }
}

/// Compare two models strictly, printing a diff on mismatch
#[track_caller]
pub fn assert_models_equal(expected: &ModelNode, actual: &ModelNode) {
    assert_models_equal_with(expected, actual, CompareOptions::strict());
}

#[track_caller]
pub fn assert_models_equal_with(expected: &ModelNode, actual: &ModelNode, options: CompareOptions) {
    if let Err(err) = compare(expected, actual, options) {
        pretty_assertions::assert_eq!(
            expected.to_string(),
            actual.to_string(),
            "{err}"
        );
        panic!("{err}");
    }
}

/// Resource names accepted by path parsing
pub fn arb_name() -> impl Strategy<Value = String> {
    "[A-Z][A-Z0-9_]{0,7}"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders() {
        assert_eq!(
            address("/subsystem=logging/console-handler=CONSOLE"),
            console_handler("CONSOLE")
        );
        assert!(console_handler("CONSOLE").matches(&address(CONSOLE_HANDLERS)));
        assert!(expression("x", "1").contains_expression());
    }

    #[test]
    #[should_panic(expected = "model mismatch")]
    fn assert_models_equal_reports_path() {
        assert_models_equal(
            &ModelNode::object().with("level", "INFO"),
            &ModelNode::object().with("level", "INFO").with("filter-spec", ModelNode::Undefined),
        );
    }
}
