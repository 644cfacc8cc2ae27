//! Resource addresses
//!
//! Provides [`PathElement`] and [`PathAddress`] for hierarchical addressing of
//! resources in the management model, including wildcard pattern matching.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::node::ModelNode;

/// Wildcard key or value in an address pattern
pub const WILDCARD: &str = "*";

/// Single `key=value` segment of a resource address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathElement {
    key: String,
    value: String,
}

impl PathElement {
    /// Create new element
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create element matching every value of `key`
    #[inline]
    #[must_use]
    pub fn wildcard(key: impl Into<String>) -> Self {
        Self::new(key, WILDCARD)
    }

    /// Create element, rejecting empty or reserved characters
    ///
    /// # Errors
    /// Returns error if key or value is empty or contains `/` or `=`
    pub fn try_new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, PathError> {
        let element = Self::new(key, value);
        for part in [&element.key, &element.value] {
            if part.is_empty() {
                return Err(PathError::EmptySegment);
            }
            if part.contains(['/', '=']) {
                return Err(PathError::InvalidSegment(part.clone()));
            }
        }
        Ok(element)
    }

    /// Element key (resource type)
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Element value (resource name)
    #[inline]
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Check if the value is the wildcard
    #[inline]
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.value == WILDCARD
    }

    /// Check if two elements match, honouring wildcards on either side
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        let key_match = self.key == WILDCARD || other.key == WILDCARD || self.key == other.key;
        let value_match =
            self.value == WILDCARD || other.value == WILDCARD || self.value == other.value;
        key_match && value_match
    }
}

impl Display for PathElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl FromStr for PathElement {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| PathError::InvalidSegment(s.to_string()))?;
        Self::try_new(key, value)
    }
}

/// Address of a resource in the model tree
///
/// An ordered sequence of [`PathElement`]s; the root is the empty sequence.
///
/// # Examples
/// - `[]` → `/`
/// - `[subsystem=logging, console-handler=CONSOLE]` → `/subsystem=logging/console-handler=CONSOLE`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathAddress(Vec<PathElement>);

impl PathAddress {
    /// Create new address from elements
    #[inline]
    #[must_use]
    pub fn new(elements: Vec<PathElement>) -> Self {
        Self(elements)
    }

    /// Empty address (root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Address with a single element
    #[inline]
    #[must_use]
    pub fn single(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self(vec![PathElement::new(key, value)])
    }

    /// Get address elements
    #[inline]
    #[must_use]
    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }

    /// Get number of elements
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if address is the root
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent address (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Get last element (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&PathElement> {
        self.0.last()
    }

    /// Get first element (if not root)
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&PathElement> {
        self.0.first()
    }

    /// Append an element, returning new address
    #[inline]
    #[must_use]
    pub fn child(&self, element: PathElement) -> Self {
        let mut new = self.clone();
        new.0.push(element);
        new
    }

    /// Append a `key=value` element, returning new address
    #[inline]
    #[must_use]
    pub fn append(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.child(PathElement::new(key, value))
    }

    /// Check if this address is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        self.0 == other.0[..self.0.len()]
    }

    /// Check if this address is a strict ancestor of another
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }

    /// Get relative address from ancestor
    ///
    /// # Errors
    /// Returns error if `self` is not a descendant of `ancestor`
    pub fn relative_to(&self, ancestor: &Self) -> Result<Self, PathError> {
        if !ancestor.is_prefix_of(self) {
            return Err(PathError::NotDescendant {
                path: self.to_string(),
                ancestor: ancestor.to_string(),
            });
        }
        Ok(Self(self.0[ancestor.0.len()..].to_vec()))
    }

    /// Check if this address matches a pattern
    ///
    /// Both addresses must have the same length and each element must match,
    /// where `*` on either side matches anything.
    #[must_use]
    pub fn matches(&self, pattern: &Self) -> bool {
        self.0.len() == pattern.0.len()
            && self.0.iter().zip(&pattern.0).all(|(a, b)| a.matches(b))
    }

    /// Check that no element key appears twice
    ///
    /// # Errors
    /// Returns the first repeated key
    pub fn validate(&self) -> Result<(), PathError> {
        let mut seen = HashSet::new();
        for element in &self.0 {
            if !seen.insert(element.key()) {
                return Err(PathError::DuplicateKey(element.key().to_string()));
            }
        }
        Ok(())
    }

    /// Iterator over elements from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }

    /// Convert to the list-of-properties node form
    #[must_use]
    pub fn to_model_node(&self) -> ModelNode {
        ModelNode::List(
            self.0
                .iter()
                .map(|e| ModelNode::property(e.key.clone(), ModelNode::from(e.value.as_str())))
                .collect(),
        )
    }

    /// Parse from the list-of-properties node form
    ///
    /// Undefined and string nodes (`/a=b` form) are accepted too.
    ///
    /// # Errors
    /// Returns error if the node is not an address
    pub fn from_model_node(node: &ModelNode) -> Result<Self, PathError> {
        match node {
            ModelNode::Undefined => Ok(Self::root()),
            ModelNode::String(s) => s.parse(),
            ModelNode::List(items) => items
                .iter()
                .map(|item| match item {
                    ModelNode::Property(key, value) => {
                        PathElement::try_new(key.clone(), value.as_string())
                    }
                    ModelNode::Object(map) if map.len() == 1 => {
                        let (key, value) = map.first().ok_or(PathError::EmptySegment)?;
                        PathElement::try_new(key.clone(), value.as_string())
                    }
                    other => Err(PathError::InvalidSegment(other.to_string())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self),
            other => Err(PathError::InvalidSegment(other.to_string())),
        }
    }
}

impl Display for PathAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for element in &self.0 {
            write!(f, "/{element}")?;
        }
        Ok(())
    }
}

impl FromStr for PathAddress {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return Ok(Self::root());
        }
        let body = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let elements: Vec<PathElement> = body
            .split('/')
            .map(|seg| {
                if seg.is_empty() {
                    Err(PathError::EmptySegment)
                } else {
                    seg.parse()
                }
            })
            .collect::<Result<_, _>>()?;
        Ok(Self(elements))
    }
}

impl From<Vec<PathElement>> for PathAddress {
    fn from(elements: Vec<PathElement>) -> Self {
        Self(elements)
    }
}

impl From<PathElement> for PathAddress {
    fn from(element: PathElement) -> Self {
        Self(vec![element])
    }
}

/// Errors related to resource addresses
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty key, value or segment
    #[error("address contains empty segment")]
    EmptySegment,

    /// Segment not of the form `key=value`
    #[error("invalid address segment: {0}")]
    InvalidSegment(String),

    /// Same key used twice in one address
    #[error("duplicate key '{0}' in address")]
    DuplicateKey(String),

    /// Not a descendant address
    #[error("address '{path}' is not a descendant of '{ancestor}'")]
    NotDescendant { path: String, ancestor: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> PathAddress {
        s.parse().unwrap()
    }

    #[test]
    fn address_new_and_elements() {
        let a = PathAddress::new(vec![
            PathElement::new("subsystem", "logging"),
            PathElement::new("logger", "org.foo"),
        ]);
        assert_eq!(a.len(), 2);
        assert_eq!(a.elements()[1].value(), "org.foo");
    }

    #[test]
    fn address_root() {
        let root = PathAddress::root();
        assert!(root.is_empty());
        assert!(root.parent().is_none());
        assert_eq!(root.to_string(), "/");
    }

    #[test]
    fn address_parent_drops_last() {
        let a = addr("/subsystem=logging/console-handler=CONSOLE");
        assert_eq!(a.parent().unwrap(), addr("/subsystem=logging"));
        assert_eq!(a.last().unwrap().key(), "console-handler");
    }

    #[test]
    fn address_display_roundtrip() {
        let text = "/subsystem=logging/periodic-rotating-file-handler=FILE";
        assert_eq!(addr(text).to_string(), text);
    }

    #[test]
    fn address_from_str_empty_segment() {
        let result: Result<PathAddress, _> = "/a=b//c=d".parse();
        assert!(matches!(result, Err(PathError::EmptySegment)));
    }

    #[test]
    fn address_from_str_missing_value() {
        let result: Result<PathAddress, _> = "/subsystem".parse();
        assert!(matches!(result, Err(PathError::InvalidSegment(_))));
    }

    #[test]
    fn wildcard_matches_either_side() {
        let concrete = addr("/subsystem=logging/console-handler=CONSOLE");
        let pattern = addr("/subsystem=logging/console-handler=*");
        assert!(concrete.matches(&pattern));
        assert!(pattern.matches(&concrete));
        assert!(!concrete.matches(&addr("/subsystem=logging/file-handler=*")));
    }

    #[test]
    fn wildcard_key_matches() {
        let pattern = PathAddress::new(vec![PathElement::new(WILDCARD, WILDCARD)]);
        assert!(addr("/subsystem=logging").matches(&pattern));
    }

    #[test]
    fn match_requires_same_length() {
        assert!(!addr("/subsystem=logging").matches(&addr("/subsystem=logging/logger=*")));
    }

    #[test]
    fn validate_rejects_duplicate_keys() {
        let a = addr("/subsystem=logging/subsystem=other");
        assert_eq!(
            a.validate(),
            Err(PathError::DuplicateKey("subsystem".to_string()))
        );
        assert!(addr("/subsystem=logging/logger=a").validate().is_ok());
    }

    #[test]
    fn relative_to_ancestor() {
        let full = addr("/subsystem=logging/logging-profile=p/logger=x");
        let rel = full.relative_to(&addr("/subsystem=logging")).unwrap();
        assert_eq!(rel, addr("/logging-profile=p/logger=x"));
        assert!(matches!(
            full.relative_to(&addr("/subsystem=ee")),
            Err(PathError::NotDescendant { .. })
        ));
    }

    #[test]
    fn model_node_roundtrip() {
        let a = addr("/subsystem=logging/logger=org.jboss");
        let node = a.to_model_node();
        assert_eq!(PathAddress::from_model_node(&node).unwrap(), a);
        assert_eq!(
            PathAddress::from_model_node(&ModelNode::Undefined).unwrap(),
            PathAddress::root()
        );
    }
}
