//! Action contract
//!
//! An action is the unit a `uses:` step invokes. Implementations declare
//! their metadata and inputs, and run asynchronously:
//!
//! ```rust,ignore
//! #[async_trait]
//! impl Action for LearnGraph {
//!     fn name(&self) -> &str { "learn-graph" }
//!     fn version(&self) -> &str { "1.0.0" }
//!     fn inputs(&self) -> &[ActionInput] { &self.inputs }
//!
//!     async fn run(&self, inputs: &ActionInputs, ctx: &ActionContext)
//!         -> Result<ActionOutputs, ActionError> { ... }
//! }
//! ```

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::config::ExecutionMode;
use crate::error::ActionError;
use crate::matrix::Job;

/// Parameters passed to an action (`with:` after template substitution)
pub type ActionInputs = IndexMap<String, Value>;

/// Values an action reports back
pub type ActionOutputs = IndexMap<String, Value>;

/// Declared action parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionInput {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
    pub type_hint: String,
}

impl ActionInput {
    /// Optional input with no default and type hint `Any`
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
            default: None,
            type_hint: "Any".to_string(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_type_hint(mut self, type_hint: impl Into<String>) -> Self {
        self.type_hint = type_hint.into();
        self
    }

    /// Required with no default: a step must supply it
    pub fn is_mandatory(&self) -> bool {
        self.required && self.default.is_none()
    }
}

/// Where an invocation sits in the run
#[derive(Debug, Clone, PartialEq)]
pub struct ActionContext {
    pub workflow_id: String,
    /// Zero-based job index in expansion order
    pub job_index: usize,
    pub step_index: usize,
    pub step_name: Option<String>,
    /// Matrix values of the current job
    pub job: Job,
    pub mode: ExecutionMode,
}

#[async_trait]
pub trait Action: Send + Sync {
    /// Unique name referenced by `uses:`
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Declared inputs. Empty means no fixed schema: any parameter is accepted.
    fn inputs(&self) -> &[ActionInput] {
        &[]
    }

    fn validate_inputs(&self, _inputs: &ActionInputs) -> bool {
        true
    }

    /// Outputs left by a previous run for these inputs, if any.
    ///
    /// Present outputs make the step `SKIPS` in run mode and serve as the
    /// baseline in compare mode.
    async fn cached_outputs(
        &self,
        _inputs: &ActionInputs,
        _ctx: &ActionContext,
    ) -> Option<ActionOutputs> {
        None
    }

    async fn run(&self, inputs: &ActionInputs, ctx: &ActionContext)
        -> Result<ActionOutputs, ActionError>;
}

/// Copy `inputs`, adding declared defaults for parameters the step left out
pub fn with_defaults(action: &dyn Action, inputs: &ActionInputs) -> ActionInputs {
    let mut merged = inputs.clone();
    for declared in action.inputs() {
        if let Some(default) = &declared.default {
            if !merged.contains_key(&declared.name) {
                merged.insert(declared.name.clone(), default.clone());
            }
        }
    }
    merged
}

/// Parameters a step passes that the action does not declare, then declared
/// mandatory inputs the step leaves out. An action with no declared inputs
/// accepts anything.
pub fn parameter_problems(action: &dyn Action, given: &ActionInputs) -> Vec<String> {
    let declared = action.inputs();
    let mut problems = Vec::new();

    if !declared.is_empty() {
        for param in given.keys() {
            if !declared.iter().any(|input| &input.name == param) {
                problems.push(format!("unknown parameter '{}'", param));
            }
        }
    }

    for input in declared.iter().filter(|input| input.is_mandatory()) {
        if !given.contains_key(&input.name) {
            problems.push(format!("missing required parameter '{}'", input.name));
        }
    }
    problems
}
