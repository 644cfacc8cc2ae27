//! Comparator properties
//!
//! Symmetry of `compare` and idempotence of undefined pruning over
//! arbitrary model trees.

use modeltest_model::{compare, trim_undefined_children, CompareOptions, ModelNode};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = ModelNode> {
    prop_oneof![
        Just(ModelNode::Undefined),
        any::<bool>().prop_map(ModelNode::from),
        any::<i32>().prop_map(ModelNode::from),
        any::<i64>().prop_map(ModelNode::from),
        "[A-Z]{0,6}( )?".prop_map(ModelNode::from),
        "[a-z]{1,4}".prop_map(|s| ModelNode::expression(format!("${{{s}:x}}"))),
    ]
}

fn model() -> impl Strategy<Value = ModelNode> {
    leaf().prop_recursive(4, 48, 5, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(ModelNode::List),
            proptest::collection::vec(("[a-d]", inner.clone()), 0..5)
                .prop_map(|entries| entries.into_iter().collect::<ModelNode>()),
            ("[a-d]", inner).prop_map(|(name, value)| ModelNode::property(name, value)),
        ]
    })
}

fn options() -> impl Strategy<Value = CompareOptions> {
    (any::<bool>(), any::<bool>()).prop_map(|(ignore_undefined, ignore_type)| CompareOptions {
        ignore_undefined,
        ignore_type,
    })
}

proptest! {
    #[test]
    fn prop_compare_is_symmetric(a in model(), b in model(), opts in options()) {
        prop_assert_eq!(
            compare(&a, &b, opts).is_ok(),
            compare(&b, &a, opts).is_ok()
        );
    }

    #[test]
    fn prop_compare_is_reflexive(a in model(), opts in options()) {
        prop_assert!(compare(&a, &a, opts).is_ok());
    }

    #[test]
    fn prop_pruning_is_idempotent(a in model()) {
        let once = trim_undefined_children(&a);
        let twice = trim_undefined_children(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_pruned_tree_equals_original_ignoring_undefined(a in model()) {
        let pruned = trim_undefined_children(&a);
        prop_assert!(compare(&a, &pruned, CompareOptions::ignoring_undefined()).is_ok());
    }
}

#[test]
fn filter_spec_scenario() {
    let current = ModelNode::object()
        .with("level", "INFO")
        .with("filter-spec", ModelNode::Undefined);
    let legacy = ModelNode::object().with("level", "INFO");

    assert!(compare(&current, &legacy, CompareOptions::ignoring_undefined()).is_ok());

    let err = compare(&current, &legacy, CompareOptions::strict()).unwrap_err();
    assert!(err.message.contains("filter-spec"), "{err}");
}

#[test]
fn nested_undefined_objects_are_pruned() {
    let node = ModelNode::object()
        .with("level", "INFO")
        .with(
            "pattern-formatter",
            ModelNode::object().with(
                "PATTERN",
                ModelNode::object().with("color-map", ModelNode::Undefined),
            ),
        );
    assert_eq!(
        trim_undefined_children(&node),
        ModelNode::object().with("level", "INFO")
    );
}

#[test]
fn mismatch_path_points_into_lists() {
    let expected = ModelNode::object().with(
        "handlers",
        ModelNode::List(vec!["CONSOLE".into(), "FILE".into()]),
    );
    let actual = ModelNode::object().with(
        "handlers",
        ModelNode::List(vec!["CONSOLE".into(), "SYSLOG".into()]),
    );
    let err = compare(&expected, &actual, CompareOptions::strict()).unwrap_err();
    assert_eq!(err.path, "handlers/1");
}
