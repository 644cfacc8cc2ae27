//! Correction convergence
//!
//! Repeatedly correcting a rejected operation terminates after at most one
//! round per declared check, and the result is no longer rejected.

use modeltest_model::{ModelNode, Operation, PathAddress};
use modeltest_policy::{
    AttributesRule, CorrectionPolicy, CustomCheck, FieldCheck, NewAttribute, RejectExpressions,
};
use proptest::prelude::*;

const CHECKED: &[&str] = &["level", "encoding", "autoflush", "target"];

fn handler() -> PathAddress {
    "/subsystem=logging/console-handler=CONSOLE".parse().unwrap()
}

fn policy() -> (CorrectionPolicy, usize) {
    let rule = AttributesRule::new()
        .with_checks(&["level", "encoding", "autoflush"], RejectExpressions::new())
        .with_check(
            "target",
            CustomCheck::allowed_values("target", &["System.out"], "System.out"),
        )
        .with_check("filter-spec", NewAttribute)
        .with_check("formatter", FieldCheck::new("pattern", RejectExpressions::new()));
    let checks = CHECKED.len() + 2;
    let policy = CorrectionPolicy::no_failures()
        .with_attributes("/subsystem=logging/console-handler=*".parse().unwrap(), rule);
    (policy, checks)
}

fn value() -> impl Strategy<Value = ModelNode> {
    prop_oneof![
        Just(ModelNode::Undefined),
        "[A-Za-z.]{1,8}".prop_map(ModelNode::from),
        "[a-z]{1,5}".prop_map(|name| ModelNode::expression(format!("${{{name}:dflt}}"))),
    ]
}

fn operation() -> impl Strategy<Value = Operation> {
    (
        proptest::collection::vec(value(), CHECKED.len()),
        value(),
        proptest::option::of(value()),
    )
        .prop_map(|(values, filter_spec, pattern)| {
            let mut op = Operation::add(handler());
            for (name, value) in CHECKED.iter().zip(values) {
                op.set_param(*name, value);
            }
            op.set_param("filter-spec", filter_spec);
            if let Some(pattern) = pattern {
                op.set_param("formatter", ModelNode::object().with("pattern", pattern));
            }
            op
        })
}

proptest! {
    #[test]
    fn prop_correction_converges(op in operation()) {
        let (policy, checks) = policy();
        let mut current = op;
        let mut rounds = 0;
        while policy.expect_failed(&current) {
            prop_assert!(policy.can_correct_more(&current));
            current = policy.correct_operation(&current).unwrap();
            rounds += 1;
            prop_assert!(rounds <= checks, "no convergence after {rounds} rounds: {current}");
        }
        prop_assert!(!policy.can_correct_more(&current));
    }

    #[test]
    fn prop_discard_and_reject_are_exclusive(op in operation()) {
        let pattern: PathAddress = "/subsystem=logging/console-handler=*".parse().unwrap();
        let discarding = CorrectionPolicy::no_failures().with_discarded_resource(pattern.clone());
        let rejecting = CorrectionPolicy::no_failures().with_rejected_resource(pattern);

        prop_assert!(discarding.expect_discarded(&op));
        prop_assert!(!discarding.expect_failed(&op));
        prop_assert!(rejecting.expect_failed(&op));
        prop_assert!(!rejecting.expect_discarded(&op));
    }
}

#[test]
fn write_attribute_correction_is_single_round() {
    let (policy, _) = policy();
    let write = Operation::write_attribute(handler(), "target", "System.err");
    assert!(policy.expect_failed_write_attribute(&write));

    let corrected = policy.correct_write_attribute_operation(&write).unwrap();
    assert!(!policy.expect_failed_write_attribute(&corrected));
    assert!(policy.correct_write_attribute_operation(&corrected).is_err());
}
