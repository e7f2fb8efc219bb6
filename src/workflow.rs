//! Workflow parsing structures

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::ActionInputs;
use crate::error::WorkflowValidationError;
use crate::matrix::MatrixSpec;

/// Workflow decoded from a loaded document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<MatrixSpec>,
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Decode an already schema-validated document
    pub fn from_document(document: Value) -> Result<Self, WorkflowValidationError> {
        serde_json::from_value(document)
            .map_err(|e| WorkflowValidationError::new(e.to_string()))
    }

    /// Steps that reference an action, with their index
    pub fn uses_steps(&self) -> impl Iterator<Item = (usize, &Step, &str)> {
        self.steps
            .iter()
            .enumerate()
            .filter_map(|(index, step)| step.uses().map(|name| (index, step, name)))
    }

    pub fn has_matrix(&self) -> bool {
        self.matrix.as_ref().is_some_and(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub action: StepAction,
    #[serde(default, rename = "with", skip_serializing_if = "ActionInputs::is_empty")]
    pub with: ActionInputs,
}

/// `run:` or `uses:` - serde auto-detects which one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepAction {
    Uses { uses: String },
    Run { run: String },
}

impl StepAction {
    /// Action name or command text
    pub fn target(&self) -> &str {
        match self {
            StepAction::Uses { uses } => uses,
            StepAction::Run { run } => run,
        }
    }
}

impl Step {
    pub fn uses(&self) -> Option<&str> {
        match &self.action {
            StepAction::Uses { uses } => Some(uses),
            StepAction::Run { .. } => None,
        }
    }

    /// Name for progress output: explicit name, else the action or command
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.action.target())
    }
}
