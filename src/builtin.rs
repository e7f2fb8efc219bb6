//! Built-in actions
//!
//! - `echo` - returns its inputs as outputs
//! - `write-file` - writes `content` to `path`; an existing file counts as cached output

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::action::{Action, ActionContext, ActionInput, ActionInputs, ActionOutputs};
use crate::error::{ActionError, ActionExecutionError, ActionValidationError};
use crate::registry::{ActionExtension, Registrar};

pub const BUILTIN_MODULE: &str = "builtin::actions";

/// Extensions shipped with the crate
pub fn extensions() -> Vec<Arc<dyn ActionExtension>> {
    vec![Arc::new(BuiltinExtension)]
}

pub struct BuiltinExtension;

impl ActionExtension for BuiltinExtension {
    fn module_path(&self) -> &str {
        BUILTIN_MODULE
    }

    fn register(&self, registrar: &mut Registrar<'_>) -> Result<(), ActionValidationError> {
        registrar.register_action(EchoAction);
        registrar.register_action(WriteFileAction::new());
        Ok(())
    }
}

// ============================================================================
// echo
// ============================================================================

pub struct EchoAction;

#[async_trait]
impl Action for EchoAction {
    fn name(&self) -> &str {
        "echo"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "Return the step parameters as outputs"
    }

    async fn run(
        &self,
        inputs: &ActionInputs,
        _ctx: &ActionContext,
    ) -> Result<ActionOutputs, ActionError> {
        Ok(inputs.clone())
    }
}

// ============================================================================
// write-file
// ============================================================================

pub struct WriteFileAction {
    inputs: Vec<ActionInput>,
}

impl Default for WriteFileAction {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteFileAction {
    pub fn new() -> Self {
        Self {
            inputs: vec![
                ActionInput::new("path", "File to write")
                    .required()
                    .with_type_hint("str"),
                ActionInput::new("content", "Text to write")
                    .with_default(json!(""))
                    .with_type_hint("str"),
            ],
        }
    }

    fn outputs(path: &str, content: &str) -> ActionOutputs {
        let mut outputs = ActionOutputs::new();
        outputs.insert("path".to_string(), json!(path));
        outputs.insert("content".to_string(), json!(content));
        outputs
    }
}

fn text_input<'a>(inputs: &'a ActionInputs, name: &str) -> Option<&'a str> {
    inputs.get(name).and_then(Value::as_str)
}

#[async_trait]
impl Action for WriteFileAction {
    fn name(&self) -> &str {
        "write-file"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "Write text content to a file"
    }

    fn inputs(&self) -> &[ActionInput] {
        &self.inputs
    }

    fn validate_inputs(&self, inputs: &ActionInputs) -> bool {
        text_input(inputs, "path").is_some_and(|p| !p.is_empty())
            && inputs.get("content").map_or(true, Value::is_string)
    }

    async fn cached_outputs(
        &self,
        inputs: &ActionInputs,
        _ctx: &ActionContext,
    ) -> Option<ActionOutputs> {
        let path = text_input(inputs, "path")?;
        let existing = tokio::fs::read_to_string(path).await.ok()?;
        Some(Self::outputs(path, &existing))
    }

    async fn run(
        &self,
        inputs: &ActionInputs,
        _ctx: &ActionContext,
    ) -> Result<ActionOutputs, ActionError> {
        let path = text_input(inputs, "path")
            .ok_or_else(|| ActionValidationError("'path' must be a string".into()))?;
        let content = text_input(inputs, "content").unwrap_or_default();

        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ActionExecutionError(format!("cannot create '{}': {}", parent.display(), e))
            })?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| ActionExecutionError(format!("cannot write '{}': {}", path, e)))?;

        Ok(Self::outputs(path, content))
    }
}
