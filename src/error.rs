//! Error types with fix suggestions
//!
//! Four kinds cross the public boundary: [`WorkflowValidationError`],
//! [`WorkflowExecutionError`], [`ActionValidationError`] and
//! [`ActionExecutionError`]. The remaining types are produced by the
//! individual components and are wrapped by the executor before they
//! reach a caller.

use std::path::PathBuf;

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

// ─────────────────────────────────────────────────────────────
// Public error surface
// ─────────────────────────────────────────────────────────────

/// Document failed structural (schema) validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct WorkflowValidationError {
    pub message: String,
    /// Location of the offending node, e.g. `steps[0].run`. Empty when unknown.
    pub schema_path: String,
}

impl WorkflowValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            schema_path: String::new(),
        }
    }

    pub fn with_path(message: impl Into<String>, schema_path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            schema_path: schema_path.into(),
        }
    }
}

/// Single failure type of the executor's parse/expand/execute operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct WorkflowExecutionError {
    pub message: String,
}

impl WorkflowExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An action rejected its inputs or failed a conformance check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ActionValidationError(pub String);

/// An action raised while running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ActionExecutionError(pub String);

/// Failure returned by [`crate::Action::run`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("invalid inputs: {0}")]
    Validation(#[from] ActionValidationError),

    #[error("execution failed: {0}")]
    Execution(#[from] ActionExecutionError),
}

// ─────────────────────────────────────────────────────────────
// Component errors (wrapped before leaving the executor)
// ─────────────────────────────────────────────────────────────

/// Raw document could not be read or decoded.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse '{}': {details}", path.display())]
    Parse { path: PathBuf, details: String },

    #[error("'{}' does not contain a mapping at the top level", path.display())]
    NotAMapping { path: PathBuf },
}

/// Template placeholders reference variables that are not in scope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown template variables: {unknown:?}. Available variables: {available:?}")]
pub struct TemplateError {
    /// Sorted lexicographically
    pub unknown: Vec<String>,
    /// Sorted lexicographically
    pub available: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    #[error("matrix variable '{axis}' has no values")]
    EmptyAxis { axis: String },

    #[error("matrix expands to {count} jobs, above the limit of {limit}")]
    TooManyJobs { count: usize, limit: usize },

    #[error("matrix size overflows at variable '{axis}'")]
    Overflow { axis: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value '{value}' for {key}: {reason}")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

/// Enumeration of extensions failed as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("extension enumeration failed: {0}")]
pub struct DiscoveryError(pub String);

// ─────────────────────────────────────────────────────────────
// CLI-facing umbrella
// ─────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum StepflowError {
    #[error(transparent)]
    Execution(#[from] WorkflowExecutionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FixSuggestion for StepflowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            StepflowError::Execution(e) => e.fix_suggestion(),
            StepflowError::Config(_) => {
                Some("Check STEPFLOW_* environment variables and command-line flags")
            }
            StepflowError::Io(_) => Some("Check file path and permissions"),
        }
    }
}

impl FixSuggestion for WorkflowExecutionError {
    fn fix_suggestion(&self) -> Option<&str> {
        let message = self.message.as_str();
        if message.contains("Unknown template variables") {
            Some("Only {{id}}, {{description}} and matrix variables can be used in templates")
        } else if message.contains("unknown action") {
            Some("Run `stepflow actions` to list registered actions")
        } else if message.contains("parameter") {
            Some("Match the step's `with:` keys to the action's declared inputs")
        } else if message.contains("Matrix expansion failed") {
            Some("Give every matrix variable at least one value and keep the job count bounded")
        } else if message.contains("validation failed") {
            Some("Each workflow needs id, description and a non-empty steps list")
        } else if message.contains("parsing failed") {
            Some("Check YAML syntax: indentation and quoting")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_defaults_to_empty_path() {
        let error = WorkflowValidationError::new("Test error");
        assert_eq!(error.to_string(), "Test error");
        assert_eq!(error.schema_path, "");
    }

    #[test]
    fn validation_error_keeps_schema_path() {
        let error = WorkflowValidationError::with_path("Validation failed", "steps[0].run");
        assert_eq!(error.to_string(), "Validation failed");
        assert_eq!(error.schema_path, "steps[0].run");
    }

    #[test]
    fn template_error_lists_are_rendered() {
        let error = TemplateError {
            unknown: vec!["unknown_var".into()],
            available: vec!["dataset".into(), "description".into(), "id".into()],
        };
        assert_eq!(
            error.to_string(),
            r#"Unknown template variables: ["unknown_var"]. Available variables: ["dataset", "description", "id"]"#
        );
    }

    #[test]
    fn action_error_wraps_both_kinds() {
        let err: ActionError = ActionExecutionError("boom".into()).into();
        assert_eq!(err.to_string(), "execution failed: boom");
        let err: ActionError = ActionValidationError("bad".into()).into();
        assert!(matches!(err, ActionError::Validation(_)));
    }

    #[test]
    fn execution_error_suggests_fix_for_templates() {
        let err = WorkflowExecutionError::new("Unknown template variables: [\"x\"]");
        assert!(err.fix_suggestion().is_some());
        assert!(WorkflowExecutionError::new("something else").fix_suggestion().is_none());
    }
}
