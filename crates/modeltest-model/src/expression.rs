//! `${name:default}` expressions
//!
//! Expressions name one or more properties (comma separated, first found
//! wins) and an optional default after the first `:`. Nested expressions are
//! not supported.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::node::ModelNode;

static EXPRESSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").expect("expression pattern is valid"));

/// Check if a string contains at least one `${..}` expression
#[inline]
#[must_use]
pub fn is_expression(value: &str) -> bool {
    EXPRESSION_PATTERN.is_match(value)
}

/// Source of property values for expression resolution
pub trait ExpressionResolver {
    /// Look up a property by name
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Resolver backed by an in-memory property table
///
/// An empty table resolves every expression to its default.
#[derive(Debug, Clone, Default)]
pub struct PropertyResolver {
    properties: HashMap<String, String>,
}

impl PropertyResolver {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

impl ExpressionResolver for PropertyResolver {
    fn lookup(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }
}

impl<F> ExpressionResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Resolve every `${..}` in `value`
///
/// # Errors
/// Returns [`ExpressionError::Unresolvable`] when no property is found and
/// there is no default
pub fn resolve_expression(
    value: &str,
    resolver: &dyn ExpressionResolver,
) -> Result<String, ExpressionError> {
    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    for captures in EXPRESSION_PATTERN.captures_iter(value) {
        let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        out.push_str(&value[last..whole.start()]);
        out.push_str(&resolve_body(body.as_str(), resolver)?);
        last = whole.end();
    }
    out.push_str(&value[last..]);
    Ok(out)
}

fn resolve_body(body: &str, resolver: &dyn ExpressionResolver) -> Result<String, ExpressionError> {
    let (names, default) = match body.split_once(':') {
        Some((names, default)) => (names, Some(default)),
        None => (body, None),
    };
    if names.trim().is_empty() {
        return Err(ExpressionError::Empty(body.to_string()));
    }
    names
        .split(',')
        .map(str::trim)
        .find_map(|name| resolver.lookup(name))
        .or_else(|| default.map(str::to_string))
        .ok_or_else(|| ExpressionError::Unresolvable(names.to_string()))
}

/// Replace every expression node below `node` by its resolved string
///
/// # Errors
/// Returns the first resolution failure
pub fn resolve_node(
    node: &ModelNode,
    resolver: &dyn ExpressionResolver,
) -> Result<ModelNode, ExpressionError> {
    Ok(match node {
        ModelNode::Expression(expr) => ModelNode::String(resolve_expression(expr, resolver)?),
        ModelNode::List(items) => ModelNode::List(
            items
                .iter()
                .map(|item| resolve_node(item, resolver))
                .collect::<Result<_, _>>()?,
        ),
        ModelNode::Object(map) => ModelNode::Object(
            map.iter()
                .map(|(k, v)| resolve_node(v, resolver).map(|v| (k.clone(), v)))
                .collect::<Result<_, _>>()?,
        ),
        ModelNode::Property(name, value) => {
            ModelNode::property(name.clone(), resolve_node(value, resolver)?)
        }
        other => other.clone(),
    })
}

/// Expression resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("cannot resolve expression '{0}': no value and no default")]
    Unresolvable(String),

    #[error("expression '${{{0}}}' names no property")]
    Empty(String),
}
