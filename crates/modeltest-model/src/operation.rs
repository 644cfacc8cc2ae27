//! Management operations
//!
//! An [`Operation`] is an opcode addressed at a resource plus a free-form
//! parameter set. Composite operations carry their steps in the `steps`
//! parameter.

use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::keys;
use crate::node::ModelNode;
use crate::path::{PathAddress, PathError};

/// Operation addressed at a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    name: String,
    address: PathAddress,
    params: IndexMap<String, ModelNode>,
}

impl Operation {
    /// Create operation without parameters
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, address: PathAddress) -> Self {
        Self {
            name: name.into(),
            address,
            params: IndexMap::new(),
        }
    }

    /// `add` operation
    #[inline]
    #[must_use]
    pub fn add(address: PathAddress) -> Self {
        Self::new(keys::ADD, address)
    }

    /// `remove` operation
    #[inline]
    #[must_use]
    pub fn remove(address: PathAddress) -> Self {
        Self::new(keys::REMOVE, address)
    }

    /// `write-attribute` operation
    #[must_use]
    pub fn write_attribute(
        address: PathAddress,
        attribute: impl Into<String>,
        value: impl Into<ModelNode>,
    ) -> Self {
        Self::new(keys::WRITE_ATTRIBUTE, address)
            .with_param(keys::NAME, ModelNode::String(attribute.into()))
            .with_param(keys::VALUE, value)
    }

    /// `undefine-attribute` operation
    #[must_use]
    pub fn undefine_attribute(address: PathAddress, attribute: impl Into<String>) -> Self {
        Self::new(keys::UNDEFINE_ATTRIBUTE, address)
            .with_param(keys::NAME, ModelNode::String(attribute.into()))
    }

    /// `read-resource` operation
    #[must_use]
    pub fn read_resource(address: PathAddress, recursive: bool) -> Self {
        Self::new(keys::READ_RESOURCE, address).with_param(keys::RECURSIVE, recursive)
    }

    /// Composite operation executing `steps` atomically
    #[must_use]
    pub fn composite(steps: impl IntoIterator<Item = Operation>) -> Self {
        let steps: Vec<ModelNode> = steps.into_iter().map(|op| op.to_model_node()).collect();
        Self::new(keys::COMPOSITE, PathAddress::root()).with_param(keys::STEPS, steps)
    }

    /// Operation name (opcode)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target address
    #[inline]
    #[must_use]
    pub fn address(&self) -> &PathAddress {
        &self.address
    }

    /// All parameters, in insertion order
    #[inline]
    #[must_use]
    pub fn params(&self) -> &IndexMap<String, ModelNode> {
        &self.params
    }

    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ModelNode> {
        self.params.get(name)
    }

    #[inline]
    pub fn param_mut(&mut self, name: &str) -> Option<&mut ModelNode> {
        self.params.get_mut(name)
    }

    /// Check if a parameter is present and defined
    #[inline]
    #[must_use]
    pub fn has_defined(&self, name: &str) -> bool {
        self.params.get(name).is_some_and(ModelNode::is_defined)
    }

    /// Set a parameter, returning the previous value
    pub fn set_param(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ModelNode>,
    ) -> Option<ModelNode> {
        self.params.insert(name.into(), value.into())
    }

    /// Builder form of [`set_param`](Self::set_param)
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ModelNode>) -> Self {
        self.set_param(name, value);
        self
    }

    /// Remove a parameter, preserving the order of the rest
    pub fn remove_param(&mut self, name: &str) -> Option<ModelNode> {
        self.params.shift_remove(name)
    }

    #[inline]
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.name == keys::COMPOSITE
    }

    /// Attribute targeted by `write-attribute`, `undefine-attribute` or
    /// `read-attribute`
    #[must_use]
    pub fn attribute_name(&self) -> Option<&str> {
        self.param(keys::NAME).and_then(ModelNode::as_str)
    }

    /// Steps of a composite operation
    ///
    /// # Errors
    /// Returns error if this is not a composite or a step is malformed
    pub fn steps(&self) -> Result<Vec<Operation>, OperationError> {
        if !self.is_composite() {
            return Err(OperationError::NotComposite(self.name.clone()));
        }
        match self.param(keys::STEPS) {
            None | Some(ModelNode::Undefined) => Ok(Vec::new()),
            Some(ModelNode::List(items)) => items
                .iter()
                .enumerate()
                .map(|(index, step)| {
                    Self::from_model_node(step).map_err(|source| OperationError::InvalidStep {
                        index,
                        source: Box::new(source),
                    })
                })
                .collect(),
            Some(other) => Err(OperationError::InvalidSteps(other.model_type().to_string())),
        }
    }

    /// Check that the address has no repeated keys
    ///
    /// # Errors
    /// Returns the address error
    pub fn validate_address(&self) -> Result<(), OperationError> {
        self.address.validate().map_err(OperationError::InvalidAddress)
    }

    /// Convert to the `{"operation" => .., "address" => [..], ..}` node form
    #[must_use]
    pub fn to_model_node(&self) -> ModelNode {
        let mut map = IndexMap::with_capacity(self.params.len() + 2);
        map.insert(keys::OP.to_string(), ModelNode::from(self.name.as_str()));
        map.insert(keys::OP_ADDR.to_string(), self.address.to_model_node());
        for (key, value) in &self.params {
            map.insert(key.clone(), value.clone());
        }
        ModelNode::Object(map)
    }

    /// Parse the `{"operation" => .., "address" => [..], ..}` node form
    ///
    /// # Errors
    /// Returns error if the name is missing or the address is malformed
    pub fn from_model_node(node: &ModelNode) -> Result<Self, OperationError> {
        let map = node.as_object().ok_or(OperationError::NotAnOperation)?;
        let name = map
            .get(keys::OP)
            .and_then(ModelNode::as_str)
            .ok_or(OperationError::MissingName)?;
        let address = match map.get(keys::OP_ADDR) {
            Some(addr) => PathAddress::from_model_node(addr)?,
            None => PathAddress::root(),
        };
        let params = map
            .iter()
            .filter(|(key, _)| key.as_str() != keys::OP && key.as_str() != keys::OP_ADDR)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Self {
            name: name.to_string(),
            address,
            params,
        })
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.name)?;
        if !self.params.is_empty() {
            write!(f, "(")?;
            for (i, (key, value)) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Errors building or decoding operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("node is not an operation object")]
    NotAnOperation,

    #[error("operation has no name")]
    MissingName,

    #[error("invalid operation address: {0}")]
    InvalidAddress(#[from] PathError),

    #[error("'{0}' is not a composite operation")]
    NotComposite(String),

    #[error("composite steps must be a LIST, found {0}")]
    InvalidSteps(String),

    #[error("invalid composite step {index}: {source}")]
    InvalidStep {
        index: usize,
        source: Box<OperationError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> PathAddress {
        "/subsystem=logging/console-handler=CONSOLE".parse().unwrap()
    }

    #[test]
    fn write_attribute_has_name_and_value() {
        let op = Operation::write_attribute(handler(), "target", "System.err");
        assert_eq!(op.name(), keys::WRITE_ATTRIBUTE);
        assert_eq!(op.attribute_name(), Some("target"));
        assert_eq!(op.param(keys::VALUE), Some(&ModelNode::from("System.err")));
    }

    #[test]
    fn node_form_roundtrip() {
        let op = Operation::add(handler())
            .with_param("level", "INFO")
            .with_param("autoflush", true);
        let node = op.to_model_node();
        assert_eq!(node.get(keys::OP), Some(&ModelNode::from("add")));
        assert_eq!(Operation::from_model_node(&node).unwrap(), op);
    }

    #[test]
    fn composite_steps_roundtrip() {
        let steps = vec![
            Operation::add("/subsystem=logging".parse().unwrap()),
            Operation::add(handler()).with_param("level", "INFO"),
        ];
        let composite = Operation::composite(steps.clone());
        assert!(composite.is_composite());
        assert_eq!(composite.steps().unwrap(), steps);
    }

    #[test]
    fn steps_of_non_composite_fails() {
        let op = Operation::add(handler());
        assert!(matches!(op.steps(), Err(OperationError::NotComposite(_))));
    }

    #[test]
    fn malformed_step_reports_index() {
        let composite = Operation::new(keys::COMPOSITE, PathAddress::root()).with_param(
            keys::STEPS,
            vec![Operation::add(handler()).to_model_node(), ModelNode::from(3)],
        );
        assert!(matches!(
            composite.steps(),
            Err(OperationError::InvalidStep { index: 1, .. })
        ));
    }

    #[test]
    fn remove_param_preserves_order() {
        let mut op = Operation::add(handler())
            .with_param("a", 1)
            .with_param("b", 2)
            .with_param("c", 3);
        op.remove_param("b");
        assert_eq!(op.params().keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn duplicate_address_keys_rejected() {
        let op = Operation::add("/subsystem=logging/subsystem=x".parse().unwrap());
        assert!(matches!(
            op.validate_address(),
            Err(OperationError::InvalidAddress(PathError::DuplicateKey(_)))
        ));
    }
}
