//! Management model tree
//!
//! [`ModelNode`] is the single value type flowing through the harness:
//! operations, results, resource models and resource descriptions are all
//! model nodes.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use indexmap::IndexMap;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// Kind of a [`ModelNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    Undefined,
    Boolean,
    Int,
    Long,
    Double,
    BigInteger,
    String,
    Expression,
    Type,
    List,
    Object,
    Property,
}

impl ModelType {
    /// Canonical upper-case name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "UNDEFINED",
            Self::Boolean => "BOOLEAN",
            Self::Int => "INT",
            Self::Long => "LONG",
            Self::Double => "DOUBLE",
            Self::BigInteger => "BIG_INTEGER",
            Self::String => "STRING",
            Self::Expression => "EXPRESSION",
            Self::Type => "TYPE",
            Self::List => "LIST",
            Self::Object => "OBJECT",
            Self::Property => "PROPERTY",
        }
    }

    /// Check if values of this type hold child nodes
    #[inline]
    #[must_use]
    pub fn is_complex(&self) -> bool {
        matches!(self, Self::List | Self::Object | Self::Property)
    }

    /// All model types
    pub const ALL: [ModelType; 12] = [
        Self::Undefined,
        Self::Boolean,
        Self::Int,
        Self::Long,
        Self::Double,
        Self::BigInteger,
        Self::String,
        Self::Expression,
        Self::Type,
        Self::List,
        Self::Object,
        Self::Property,
    ];
}

impl Display for ModelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownType(s.to_string()))
    }
}

/// Node in the management model tree
///
/// `Undefined` is a value in its own right: an object may hold a key whose
/// value is undefined, which is different from the key being absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ModelNode {
    #[default]
    Undefined,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    BigInteger(BigInt),
    String(String),
    /// Unresolved `${name:default}` expression
    Expression(String),
    Type(ModelType),
    List(Vec<ModelNode>),
    Object(IndexMap<String, ModelNode>),
    Property(String, Box<ModelNode>),
}

impl ModelNode {
    /// Empty object node
    #[inline]
    #[must_use]
    pub fn object() -> Self {
        Self::Object(IndexMap::new())
    }

    /// Empty list node
    #[inline]
    #[must_use]
    pub fn list() -> Self {
        Self::List(Vec::new())
    }

    /// Expression node
    #[inline]
    #[must_use]
    pub fn expression(expr: impl Into<String>) -> Self {
        Self::Expression(expr.into())
    }

    /// Property node
    #[inline]
    #[must_use]
    pub fn property(name: impl Into<String>, value: ModelNode) -> Self {
        Self::Property(name.into(), Box::new(value))
    }

    /// Kind of this node
    #[must_use]
    pub fn model_type(&self) -> ModelType {
        match self {
            Self::Undefined => ModelType::Undefined,
            Self::Boolean(_) => ModelType::Boolean,
            Self::Int(_) => ModelType::Int,
            Self::Long(_) => ModelType::Long,
            Self::Double(_) => ModelType::Double,
            Self::BigInteger(_) => ModelType::BigInteger,
            Self::String(_) => ModelType::String,
            Self::Expression(_) => ModelType::Expression,
            Self::Type(_) => ModelType::Type,
            Self::List(_) => ModelType::List,
            Self::Object(_) => ModelType::Object,
            Self::Property(..) => ModelType::Property,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_defined(&self) -> bool {
        !matches!(self, Self::Undefined)
    }

    /// Child of an object node
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ModelNode> {
        self.as_object().and_then(|m| m.get(key))
    }

    /// Mutable child of an object node
    #[inline]
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ModelNode> {
        self.as_object_mut().and_then(|m| m.get_mut(key))
    }

    /// Descendant reached by following object keys
    #[must_use]
    pub fn get_path(&self, keys: &[&str]) -> Option<&ModelNode> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Check if an object node has `key`, defined or not
    #[inline]
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Check if an object node has a defined value at `key`
    #[inline]
    #[must_use]
    pub fn has_defined(&self, key: &str) -> bool {
        self.get(key).is_some_and(ModelNode::is_defined)
    }

    /// Insert a child, promoting an undefined node to an object
    ///
    /// # Errors
    /// Returns error if the node is neither undefined nor an object
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ModelNode>,
    ) -> Result<Option<ModelNode>, ModelError> {
        if matches!(self, Self::Undefined) {
            *self = Self::object();
        }
        match self {
            Self::Object(map) => Ok(map.insert(key.into(), value.into())),
            other => Err(ModelError::NotAnObject(other.model_type())),
        }
    }

    /// Builder form of [`insert`](Self::insert)
    ///
    /// A node that is not an object is replaced by a fresh object.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ModelNode>) -> Self {
        if !matches!(self, Self::Object(_)) {
            self = Self::object();
        }
        if let Self::Object(map) = &mut self {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Remove a child, preserving the order of the remaining keys
    pub fn remove(&mut self, key: &str) -> Option<ModelNode> {
        self.as_object_mut().and_then(|m| m.shift_remove(key))
    }

    /// Keys of an object node (empty for any other kind)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.as_object()
            .into_iter()
            .flat_map(|m| m.keys().map(String::as_str))
    }

    /// Append to a list, promoting an undefined node to a list
    ///
    /// # Errors
    /// Returns error if the node is neither undefined nor a list
    pub fn push(&mut self, value: impl Into<ModelNode>) -> Result<(), ModelError> {
        if matches!(self, Self::Undefined) {
            *self = Self::list();
        }
        match self {
            Self::List(items) => {
                items.push(value.into());
                Ok(())
            }
            other => Err(ModelError::NotAList(other.model_type())),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&IndexMap<String, ModelNode>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, ModelNode>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[ModelNode]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_property(&self) -> Option<(&str, &ModelNode)> {
        match self {
            Self::Property(name, value) => Some((name, value)),
            _ => None,
        }
    }

    /// String content of a string or expression node
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Expression(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean value, accepting `"true"`/`"false"` strings
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Integral value, accepting numeric strings
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(i64::from(*i)),
            Self::Long(l) => Some(*l),
            Self::BigInteger(b) => i64::try_from(b).ok(),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating point value
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Int(i) => Some(f64::from(*i)),
            Self::Long(l) => Some(*l as f64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_type(&self) -> Option<ModelType> {
        match self {
            Self::Type(t) => Some(*t),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Plain string form
    ///
    /// Scalars render without quoting (`INFO`, `5`, `true`), expressions as
    /// their raw `${..}` text, complex nodes in their display form.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Long(l) => l.to_string(),
            Self::Double(d) => d.to_string(),
            Self::BigInteger(b) => b.to_string(),
            Self::String(s) | Self::Expression(s) => s.clone(),
            Self::Type(t) => t.to_string(),
            Self::List(_) | Self::Object(_) | Self::Property(..) => self.to_string(),
        }
    }

    /// Check if this node or any descendant is an expression
    #[must_use]
    pub fn contains_expression(&self) -> bool {
        match self {
            Self::Expression(_) => true,
            Self::List(items) => items.iter().any(ModelNode::contains_expression),
            Self::Object(map) => map.values().any(ModelNode::contains_expression),
            Self::Property(_, value) => value.contains_expression(),
            _ => false,
        }
    }
}

impl Display for ModelNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Long(l) => write!(f, "{l}L"),
            Self::Double(d) => write!(f, "{d}"),
            Self::BigInteger(b) => write!(f, "big integer {b}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Expression(s) => write!(f, "expression {s:?}"),
            Self::Type(t) => write!(f, "{t}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Object(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?} => {value}")?;
                }
                write!(f, "}}")
            }
            Self::Property(name, value) => write!(f, "({name:?} => {value})"),
        }
    }
}

impl From<&str> for ModelNode {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ModelNode {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ModelNode {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for ModelNode {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for ModelNode {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f64> for ModelNode {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<BigInt> for ModelNode {
    fn from(value: BigInt) -> Self {
        Self::BigInteger(value)
    }
}

impl From<ModelType> for ModelNode {
    fn from(value: ModelType) -> Self {
        Self::Type(value)
    }
}

impl From<Vec<ModelNode>> for ModelNode {
    fn from(value: Vec<ModelNode>) -> Self {
        Self::List(value)
    }
}

impl From<IndexMap<String, ModelNode>> for ModelNode {
    fn from(value: IndexMap<String, ModelNode>) -> Self {
        Self::Object(value)
    }
}

impl<K: Into<String>, V: Into<ModelNode>> FromIterator<(K, V)> for ModelNode {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Object(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Model node access errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("expected OBJECT node, found {0}")]
    NotAnObject(ModelType),

    #[error("expected LIST node, found {0}")]
    NotAList(ModelType),

    #[error("unknown model type: {0}")]
    UnknownType(String),

    #[error("missing required key '{0}'")]
    MissingKey(String),

    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
