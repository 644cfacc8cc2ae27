//! Structural model comparison
//!
//! [`compare`] walks two model trees in lock step and reports the first
//! divergence together with the path at which it was found.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;

use crate::node::ModelNode;

/// Strictness switches for [`compare`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CompareOptions {
    /// Prune undefined children from objects on both sides before comparing
    pub ignore_undefined: bool,

    /// Allow leaves of different kinds whose string forms agree
    pub ignore_type: bool,
}

impl CompareOptions {
    /// Default strictness
    #[inline]
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn ignoring_undefined() -> Self {
        Self {
            ignore_undefined: true,
            ignore_type: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_ignore_type(mut self, ignore_type: bool) -> Self {
        self.ignore_type = ignore_type;
        self
    }
}

/// First divergence between two models
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("model mismatch at {path}: {message}")]
pub struct CompareError {
    /// Slash separated keys and list indices from the root to the divergence
    pub path: String,

    /// What differed
    pub message: String,
}

/// Compare `expected` against `actual`
///
/// - leaves compare by trimmed string form
/// - objects compare sorted key sets, then each child
/// - lists compare length, then elements in order
/// - properties compare names, then values
///
/// # Errors
/// Returns the first mismatch found
pub fn compare(
    expected: &ModelNode,
    actual: &ModelNode,
    options: CompareOptions,
) -> Result<(), CompareError> {
    let mut stack = Vec::new();
    compare_at(expected, actual, options, &mut stack)
}

/// Remove undefined children from an object node
///
/// A key is pruned when its value is undefined, or when its value is an
/// object that had children and lost all of them to pruning. Objects that
/// were empty to begin with are kept. Non-object nodes are returned as is.
#[must_use]
pub fn trim_undefined_children(node: &ModelNode) -> ModelNode {
    match node {
        ModelNode::Object(map) => ModelNode::Object(trim_map(map)),
        other => other.clone(),
    }
}

fn trim_map(map: &IndexMap<String, ModelNode>) -> IndexMap<String, ModelNode> {
    map.iter()
        .filter_map(|(key, value)| prune(value).map(|v| (key.clone(), v)))
        .collect()
}

fn prune(value: &ModelNode) -> Option<ModelNode> {
    match value {
        ModelNode::Undefined => None,
        ModelNode::Object(map) if !map.is_empty() => {
            let trimmed = trim_map(map);
            (!trimmed.is_empty()).then_some(ModelNode::Object(trimmed))
        }
        other => Some(other.clone()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Leaf,
    List,
    Object,
    Property,
}

fn shape(node: &ModelNode) -> Shape {
    match node {
        ModelNode::List(_) => Shape::List,
        ModelNode::Object(_) => Shape::Object,
        ModelNode::Property(..) => Shape::Property,
        _ => Shape::Leaf,
    }
}

struct StackPath<'a>(&'a [String]);

impl Display for StackPath<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        write!(f, "{}", self.0.join("/"))
    }
}

fn mismatch(stack: &[String], message: String) -> CompareError {
    CompareError {
        path: StackPath(stack).to_string(),
        message,
    }
}

fn compare_at(
    n1: &ModelNode,
    n2: &ModelNode,
    options: CompareOptions,
    stack: &mut Vec<String>,
) -> Result<(), CompareError> {
    let (t1, t2) = (n1.model_type(), n2.model_type());
    if !options.ignore_type && t1 != t2 {
        return Err(mismatch(stack, format!("types differ: {t1} vs {t2}")));
    }
    // Containers never compare equal to a different kind of node, even when
    // ignoring types.
    if shape(n1) != shape(n2) {
        return Err(mismatch(
            stack,
            format!("node kinds differ: {t1} vs {t2}\n{n1}\n{n2}"),
        ));
    }

    match (n1, n2) {
        (ModelNode::Object(m1), ModelNode::Object(m2)) => compare_objects(m1, m2, options, stack),
        (ModelNode::List(l1), ModelNode::List(l2)) => {
            if l1.len() != l2.len() {
                return Err(mismatch(
                    stack,
                    format!("list sizes differ: {} vs {}\n{n1}\n{n2}", l1.len(), l2.len()),
                ));
            }
            for (i, (c1, c2)) in l1.iter().zip(l2).enumerate() {
                stack.push(i.to_string());
                compare_at(c1, c2, options, stack)?;
                stack.pop();
            }
            Ok(())
        }
        (ModelNode::Property(name1, v1), ModelNode::Property(name2, v2)) => {
            if name1 != name2 {
                return Err(mismatch(
                    stack,
                    format!("property names differ: {name1} vs {name2}"),
                ));
            }
            stack.push(name1.clone());
            compare_at(v1, v2, options, stack)?;
            stack.pop();
            Ok(())
        }
        _ => {
            let (s1, s2) = (n1.as_string(), n2.as_string());
            if s1.trim() == s2.trim() {
                Ok(())
            } else {
                Err(mismatch(stack, format!("values differ: \"{s1}\" vs \"{s2}\"")))
            }
        }
    }
}

fn compare_objects(
    m1: &IndexMap<String, ModelNode>,
    m2: &IndexMap<String, ModelNode>,
    options: CompareOptions,
    stack: &mut Vec<String>,
) -> Result<(), CompareError> {
    let (m1, m2): (Cow<'_, _>, Cow<'_, _>) = if options.ignore_undefined {
        (Cow::Owned(trim_map(m1)), Cow::Owned(trim_map(m2)))
    } else {
        (Cow::Borrowed(m1), Cow::Borrowed(m2))
    };

    let keys1: BTreeSet<&str> = m1.keys().map(String::as_str).collect();
    let keys2: BTreeSet<&str> = m2.keys().map(String::as_str).collect();
    if keys1 != keys2 {
        let missing: Vec<_> = keys1.difference(&keys2).collect();
        let extra: Vec<_> = keys2.difference(&keys1).collect();
        return Err(mismatch(
            stack,
            format!(
                "key sets differ: {keys1:?} vs {keys2:?} (missing {missing:?}, unexpected {extra:?})"
            ),
        ));
    }

    for key in keys1 {
        let (c1, c2) = (&m1[key], &m2[key]);
        match (c1.is_defined(), c2.is_defined()) {
            (true, true) => {
                stack.push(key.to_string());
                compare_at(c1, c2, options, stack)?;
                stack.pop();
            }
            (false, false) => {}
            // Unreachable after pruning, kept for the strict case.
            (true, false) | (false, true) if !options.ignore_undefined => {
                return Err(mismatch(
                    stack,
                    format!("key={key} is defined on one side only: {c1} vs {c2}"),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}
