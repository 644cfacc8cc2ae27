//! Operation results

use serde::{Deserialize, Serialize};

use crate::keys;
use crate::node::{ModelError, ModelNode};

/// Outcome of an executed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

impl Outcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => keys::SUCCESS,
            Self::Failed => keys::FAILED,
        }
    }
}

/// Result of executing an operation against a model executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    outcome: Outcome,
    result: ModelNode,
    failure_description: Option<String>,
}

impl OperationResult {
    /// Successful result carrying `result`
    ///
    /// Also used as the synthetic "operation succeeded" input handed to
    /// rejection predicates.
    #[inline]
    #[must_use]
    pub fn success(result: ModelNode) -> Self {
        Self {
            outcome: Outcome::Success,
            result,
            failure_description: None,
        }
    }

    /// Failed result with a description
    #[inline]
    #[must_use]
    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            result: ModelNode::Undefined,
            failure_description: Some(description.into()),
        }
    }

    #[inline]
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    #[inline]
    #[must_use]
    pub fn result(&self) -> &ModelNode {
        &self.result
    }

    #[inline]
    #[must_use]
    pub fn into_result(self) -> ModelNode {
        self.result
    }

    #[inline]
    #[must_use]
    pub fn failure_description(&self) -> Option<&str> {
        self.failure_description.as_deref()
    }

    /// Require success and return the result payload
    ///
    /// # Errors
    /// Returns [`OutcomeError::Failed`] with the failure description
    pub fn check_outcome(self) -> Result<ModelNode, OutcomeError> {
        match self.outcome {
            Outcome::Success => Ok(self.result),
            Outcome::Failed => Err(OutcomeError::Failed(
                self.failure_description
                    .unwrap_or_else(|| "no failure description".to_string()),
            )),
        }
    }

    /// Require failure and return the failure description
    ///
    /// # Errors
    /// Returns [`OutcomeError::UnexpectedSuccess`] if the operation succeeded
    pub fn check_failed(self) -> Result<String, OutcomeError> {
        match self.outcome {
            Outcome::Failed => Ok(self.failure_description.unwrap_or_default()),
            Outcome::Success => Err(OutcomeError::UnexpectedSuccess(self.result.to_string())),
        }
    }

    /// Convert to the `{"outcome" => .., "result" => ..}` node form
    #[must_use]
    pub fn to_model_node(&self) -> ModelNode {
        let mut node = ModelNode::object().with(keys::OUTCOME, self.outcome.as_str());
        if self.result.is_defined() {
            node = node.with(keys::RESULT, self.result.clone());
        }
        if let Some(description) = &self.failure_description {
            node = node.with(keys::FAILURE_DESCRIPTION, description.as_str());
        }
        node
    }

    /// Parse the `{"outcome" => .., "result" => ..}` node form
    ///
    /// # Errors
    /// Returns error if `outcome` is missing or unknown
    pub fn from_model_node(node: &ModelNode) -> Result<Self, ModelError> {
        let outcome = match node.get(keys::OUTCOME).and_then(ModelNode::as_str) {
            Some(keys::SUCCESS) => Outcome::Success,
            Some(keys::FAILED) => Outcome::Failed,
            Some(other) => {
                return Err(ModelError::InvalidValue {
                    key: keys::OUTCOME.to_string(),
                    message: format!("unknown outcome '{other}'"),
                })
            }
            None => return Err(ModelError::MissingKey(keys::OUTCOME.to_string())),
        };
        Ok(Self {
            outcome,
            result: node.get(keys::RESULT).cloned().unwrap_or_default(),
            failure_description: node.get(keys::FAILURE_DESCRIPTION).map(ModelNode::as_string),
        })
    }
}

/// Errors from outcome checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutcomeError {
    #[error("operation failed: {0}")]
    Failed(String),

    #[error("operation was expected to fail but succeeded with result {0}")]
    UnexpectedSuccess(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_outcome_returns_payload() {
        let result = OperationResult::success(ModelNode::from("INFO"));
        assert_eq!(result.check_outcome().unwrap(), ModelNode::from("INFO"));
    }

    #[test]
    fn check_outcome_surfaces_description() {
        let err = OperationResult::failed("duplicate resource")
            .check_outcome()
            .unwrap_err();
        assert_eq!(err, OutcomeError::Failed("duplicate resource".to_string()));
    }

    #[test]
    fn check_failed_rejects_success() {
        assert!(OperationResult::success(ModelNode::Undefined)
            .check_failed()
            .is_err());
        assert_eq!(
            OperationResult::failed("boom").check_failed().unwrap(),
            "boom"
        );
    }

    #[test]
    fn node_form_roundtrip() {
        let failed = OperationResult::failed("no such resource");
        let node = failed.to_model_node();
        assert_eq!(node.get("outcome"), Some(&ModelNode::from("failed")));
        assert_eq!(OperationResult::from_model_node(&node).unwrap(), failed);
    }
}
