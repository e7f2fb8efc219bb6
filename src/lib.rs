//! stepflow - matrix-expanded workflow runner
//!
//! Workflows are YAML or JSON documents with an `id`, a `description`, an
//! optional `matrix` and a list of `steps`. Each step either runs a shell
//! command (`run:`) or invokes a registered action (`uses:`). The matrix is
//! expanded into jobs and every job runs the steps with its own values bound
//! to `{{variable}}` placeholders.

pub mod action;
pub mod builtin;
pub mod config;
pub mod error;
pub mod executor;
pub mod logger;
pub mod matrix;
pub mod registry;
pub mod report;
pub mod schema;
pub mod status;
pub mod template;
pub mod workflow;

pub use action::{Action, ActionContext, ActionInput, ActionInputs, ActionOutputs};
pub use config::{ExecutionMode, ExecutorConfig, StepflowConfig};
pub use error::{
    ActionError, ActionExecutionError, ActionValidationError, FixSuggestion, StepflowError,
    WorkflowExecutionError, WorkflowValidationError,
};
pub use executor::{FileSource, MemorySource, WorkflowExecutor, WorkflowSource};
pub use logger::{LogLevel, WorkflowLogger};
pub use matrix::{Job, MatrixExpander, MatrixSpec};
pub use registry::{ActionExtension, ActionRegistry, ExtensionSource, Registrar};
pub use report::{JobReport, StepResult, WorkflowReport};
pub use schema::{load_workflow_file, validate_workflow};
pub use status::TaskStatus;
pub use template::TemplateResolver;
pub use workflow::{Step, StepAction, Workflow};
