//! Workflow executor
//!
//! Parses workflow documents, expands their matrix and drives every job's
//! steps through the action registry.
//!
//! ```text
//! parse_workflow:  load -> schema -> decode -> templates -> action references
//! execute:         expand matrix -> for each job: for each step: classify
//! ```
//!
//! Parse-time problems fail fast as [`WorkflowExecutionError`]. Run-time
//! outcomes are [`TaskStatus`] values inside the returned [`WorkflowReport`].

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::action::{
    parameter_problems, with_defaults, Action, ActionContext, ActionInputs, ActionOutputs,
};
use crate::config::{ExecutionMode, ExecutorConfig};
use crate::error::{ActionError, LoadError, WorkflowExecutionError, WorkflowValidationError};
use crate::logger::WorkflowLogger;
use crate::matrix::{Job, MatrixExpander, MatrixSpec};
use crate::registry::ActionRegistry;
use crate::report::{JobReport, StepResult, WorkflowReport};
use crate::schema;
use crate::status::TaskStatus;
use crate::template::{TemplateContext, TemplateResolver};
use crate::workflow::{Step, StepAction, Workflow};

// ============================================================================
// SOURCES
// ============================================================================

/// Where workflow documents come from
pub trait WorkflowSource: Send + Sync {
    fn load(&self, source: &str) -> Result<Value, LoadError>;

    /// Structural check run before decoding
    fn validate(&self, document: &Value) -> Result<(), WorkflowValidationError> {
        schema::validate_workflow(document)
    }
}

/// Documents read from the filesystem (YAML, or JSON by extension)
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl WorkflowSource for FileSource {
    fn load(&self, source: &str) -> Result<Value, LoadError> {
        schema::load_workflow_file(source)
    }
}

/// Documents held in memory, keyed by name
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<String, Value>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, name: impl Into<String>, document: Value) -> Self {
        self.documents.insert(name.into(), document);
        self
    }
}

impl WorkflowSource for MemorySource {
    fn load(&self, source: &str) -> Result<Value, LoadError> {
        let document = self.documents.get(source).ok_or_else(|| LoadError::Io {
            path: PathBuf::from(source),
            source: io::Error::new(io::ErrorKind::NotFound, "no such document"),
        })?;
        if !document.is_object() {
            return Err(LoadError::NotAMapping {
                path: PathBuf::from(source),
            });
        }
        Ok(document.clone())
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

pub struct WorkflowExecutor {
    registry: Arc<ActionRegistry>,
    source: Box<dyn WorkflowSource>,
    config: ExecutorConfig,
    /// Token cache lives as long as the executor
    resolver: TemplateResolver,
}

impl WorkflowExecutor {
    /// Executor reading files, with default settings
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            source: Box::new(FileSource),
            config: ExecutorConfig::default(),
            resolver: TemplateResolver::new(),
        }
    }

    pub fn with_source(mut self, source: impl WorkflowSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Load, validate and decode a workflow
    #[instrument(skip(self))]
    pub fn parse_workflow(&self, source: &str) -> Result<Workflow, WorkflowExecutionError> {
        let document = self.source.load(source).map_err(|e| {
            WorkflowExecutionError::new(format!("Workflow parsing failed: {}", e))
        })?;
        self.parse_document(document)
    }

    /// Validate and decode an already loaded document
    pub fn parse_document(&self, document: Value) -> Result<Workflow, WorkflowExecutionError> {
        self.source.validate(&document).map_err(validation_failed)?;

        let workflow = Workflow::from_document(document).map_err(validation_failed)?;

        self.resolver
            .validate(&workflow)
            .map_err(|e| WorkflowExecutionError::new(e.to_string()))?;

        let problems = self.registry.validate_workflow_actions(&workflow);
        if !problems.is_empty() {
            let details = problems
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(WorkflowExecutionError::new(format!(
                "Workflow action validation failed: {}",
                details
            )));
        }

        debug!(workflow = %workflow.id, steps = workflow.steps.len(), "workflow parsed");
        Ok(workflow)
    }

    /// Jobs for a matrix; absent or empty gives one empty job
    pub fn expand_matrix(
        &self,
        matrix: Option<&MatrixSpec>,
    ) -> Result<Vec<Job>, WorkflowExecutionError> {
        let Some(matrix) = matrix else {
            return Ok(vec![Job::new()]);
        };
        MatrixExpander::with_max_jobs(self.config.max_jobs)
            .expand(matrix)
            .map_err(|e| WorkflowExecutionError::new(format!("Matrix expansion failed: {}", e)))
    }

    /// Run every job of the workflow.
    ///
    /// Jobs are always all attempted. Within a job, the first error status
    /// stops the remaining steps unless `continue_on_error` is set.
    #[instrument(skip(self, workflow, logger), fields(workflow = %workflow.id, mode = ?self.config.mode))]
    pub async fn execute(
        &self,
        workflow: &Workflow,
        logger: &mut WorkflowLogger,
    ) -> Result<WorkflowReport, WorkflowExecutionError> {
        let jobs = self.expand_matrix(workflow.matrix.as_ref())?;
        let base = TemplateContext::for_workflow(workflow);
        let mut report = WorkflowReport::new(&workflow.id, self.config.mode);

        info!(jobs = jobs.len(), "executing workflow");
        log(logger.summary(format!(
            "Workflow '{}': {} job(s), {} step(s), mode {:?}",
            workflow.id,
            jobs.len(),
            workflow.steps.len(),
            self.config.mode
        )))?;

        let total = jobs.len();
        for (job_index, job) in jobs.into_iter().enumerate() {
            let context = base.with_job(&job);
            let mut job_report = JobReport::new(job_index, job);
            log(logger.summary(format!(
                "Job {}/{}: {}",
                job_index + 1,
                total,
                job_report.describe()
            )))?;

            for (step_index, step) in workflow.steps.iter().enumerate() {
                let result = self
                    .run_step(workflow, &job_report.job, job_index, step_index, step, &context)
                    .await;
                log(logger.detail(step_line(&result)))?;

                let stop = result.is_error() && !self.config.continue_on_error;
                job_report.steps.push(result);
                if stop {
                    warn!(job = job_index, step = step_index, "stopping job after error");
                    break;
                }
            }

            if !job_report.is_success() {
                log(logger.summary(format!("Job {}/{} finished with errors", job_index + 1, total)))?;
            }
            report.jobs.push(job_report);
        }

        log(logger.summary(format!("Workflow '{}': {}", workflow.id, report.summary_line())))?;
        log(logger.close())?;
        Ok(report)
    }

    async fn run_step(
        &self,
        workflow: &Workflow,
        job: &Job,
        job_index: usize,
        step_index: usize,
        step: &Step,
        context: &TemplateContext,
    ) -> StepResult {
        let started = Instant::now();
        let result = match &step.action {
            StepAction::Uses { uses } => {
                let ctx = ActionContext {
                    workflow_id: workflow.id.clone(),
                    job_index,
                    step_index,
                    step_name: step.name.clone(),
                    job: job.clone(),
                    mode: self.config.mode,
                };
                self.run_action(uses, step, context, &ctx)
                    .await
                    .with_action(uses.as_str())
            }
            StepAction::Run { run } => {
                let command = self.resolver.render(run, context).into_owned();
                self.run_command(&command).await
            }
        };

        let result = StepResult {
            step_index,
            label: self.resolver.render(step.label(), context).into_owned(),
            ..result
        };
        debug!(step = step_index, status = %result.status, "step finished");
        result.with_duration(started.elapsed())
    }

    async fn run_action(
        &self,
        name: &str,
        step: &Step,
        context: &TemplateContext,
        ctx: &ActionContext,
    ) -> StepResult {
        let Some(action) = self.registry.get_action(name) else {
            return step_result(TaskStatus::InvalidUses)
                .with_message(format!("unknown action '{}'", name));
        };

        let problems = parameter_problems(action.as_ref(), &step.with);
        if !problems.is_empty() {
            return step_result(TaskStatus::InvalidParameter).with_message(problems.join("; "));
        }

        let rendered: ActionInputs = step
            .with
            .iter()
            .map(|(key, value)| (key.clone(), self.resolver.render_value(value, context)))
            .collect();
        let inputs = with_defaults(action.as_ref(), &rendered);

        if !action.validate_inputs(&inputs) {
            return step_result(TaskStatus::InvalidParameter)
                .with_message(format!("inputs rejected by '{}'", name));
        }

        let cached = action.cached_outputs(&inputs, ctx).await;
        match (self.config.mode, cached) {
            (ExecutionMode::DryRun, Some(cached)) => {
                step_result(TaskStatus::WouldSkip).with_outputs(cached)
            }
            (ExecutionMode::DryRun, None) => step_result(TaskStatus::WouldExecute),
            (ExecutionMode::Run, Some(cached)) => step_result(TaskStatus::Skips).with_outputs(cached),
            (ExecutionMode::Run, None) => self.invoke(action.as_ref(), &inputs, ctx, None).await,
            (ExecutionMode::Compare, cached) => {
                self.invoke(action.as_ref(), &inputs, ctx, cached).await
            }
        }
    }

    /// Run the action under the step timeout; with a baseline, classify the
    /// fresh outputs against it
    async fn invoke(
        &self,
        action: &dyn Action,
        inputs: &ActionInputs,
        ctx: &ActionContext,
        baseline: Option<ActionOutputs>,
    ) -> StepResult {
        let timeout = self.config.step_timeout;
        match tokio::time::timeout(timeout, action.run(inputs, ctx)).await {
            Err(_) => step_result(TaskStatus::TimedOut)
                .with_message(format!("timed out after {:?}", timeout)),
            Ok(Err(ActionError::Validation(e))) => {
                step_result(TaskStatus::InvalidParameter).with_message(e.to_string())
            }
            Ok(Err(ActionError::Execution(e))) => {
                step_result(TaskStatus::Failed).with_message(e.to_string())
            }
            Ok(Ok(outputs)) => match baseline {
                Some(previous) if previous == outputs => {
                    step_result(TaskStatus::Identical).with_outputs(outputs)
                }
                Some(_) => step_result(TaskStatus::Different)
                    .with_outputs(outputs)
                    .with_message("outputs differ from the previous run"),
                None => step_result(TaskStatus::Executes).with_outputs(outputs),
            },
        }
    }

    /// `run:` steps: `sh -c`, killed on timeout; never run in dry-run mode
    async fn run_command(&self, command: &str) -> StepResult {
        if self.config.mode == ExecutionMode::DryRun {
            return step_result(TaskStatus::WouldExecute);
        }

        let timeout = self.config.step_timeout;
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(timeout, output).await {
            Err(_) => step_result(TaskStatus::TimedOut)
                .with_message(format!("timed out after {:?}", timeout)),
            Ok(Err(e)) => step_result(TaskStatus::Failed)
                .with_message(format!("Failed to execute command: {}", e)),
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
                let mut outputs = ActionOutputs::new();
                outputs.insert("stdout".to_string(), Value::String(stdout));
                outputs.insert("exit_code".to_string(), json!(output.status.code()));

                if output.status.success() {
                    step_result(TaskStatus::Executes).with_outputs(outputs)
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    step_result(TaskStatus::Failed)
                        .with_outputs(outputs)
                        .with_message(format!("Command failed: {}", stderr.trim()))
                }
            }
        }
    }
}

/// `Workflow validation failed: <message> (at <path>)`, path omitted when unknown
fn validation_failed(error: WorkflowValidationError) -> WorkflowExecutionError {
    let mut message = format!("Workflow validation failed: {}", error.message);
    if !error.schema_path.is_empty() {
        message.push_str(&format!(" (at {})", error.schema_path));
    }
    WorkflowExecutionError::new(message)
}

/// Placeholder result; `run_step` fills in index, label and duration
fn step_result(status: TaskStatus) -> StepResult {
    StepResult::new(0, String::new(), status)
}

fn step_line(result: &StepResult) -> String {
    let mut line = format!(
        "  [{}] {} ({} ms)",
        result.status,
        result.label,
        result.duration.as_millis()
    );
    if let Some(message) = &result.message {
        line.push_str(": ");
        line.push_str(message);
    }
    line
}

fn log(result: io::Result<()>) -> Result<(), WorkflowExecutionError> {
    result.map_err(|e| WorkflowExecutionError::new(format!("Workflow logging failed: {}", e)))
}
