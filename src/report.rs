//! Execution results
//!
//! A [`WorkflowReport`] holds one [`JobReport`] per matrix job, each holding
//! one [`StepResult`] per attempted step. Outcomes are data: a failing step
//! is a result with an error status, not an `Err`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::action::ActionOutputs;
use crate::config::ExecutionMode;
use crate::matrix::Job;
use crate::status::TaskStatus;

// ============================================================================
// STEP RESULT
// ============================================================================

/// Outcome of one step within one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step_index: usize,
    pub label: String,
    /// Action name for `uses` steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<ActionOutputs>,
    /// Error detail or comparison note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl StepResult {
    pub fn new(step_index: usize, label: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            step_index,
            label: label.into(),
            action: None,
            status,
            outputs: None,
            message: None,
            duration: Duration::ZERO,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_outputs(mut self, outputs: ActionOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
}

// ============================================================================
// JOB / WORKFLOW REPORTS
// ============================================================================

/// Steps attempted for one matrix job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub index: usize,
    pub job: Job,
    pub steps: Vec<StepResult>,
}

impl JobReport {
    pub fn new(index: usize, job: Job) -> Self {
        Self {
            index,
            job,
            steps: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|step| !step.is_error())
    }

    /// `algorithm=pc, dataset=asia`, or `(no matrix)` for the empty job
    pub fn describe(&self) -> String {
        if self.job.is_empty() {
            return "(no matrix)".to_string();
        }
        self.job
            .iter()
            .map(|(axis, value)| match value.as_str() {
                Some(text) => format!("{}={}", axis, text),
                None => format!("{}={}", axis, value),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Everything a workflow run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowReport {
    pub workflow_id: String,
    pub mode: ExecutionMode,
    pub jobs: Vec<JobReport>,
}

impl WorkflowReport {
    pub fn new(workflow_id: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            mode,
            jobs: Vec::new(),
        }
    }

    /// No step in any job ended with an error status
    pub fn is_success(&self) -> bool {
        self.jobs.iter().all(JobReport::is_success)
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepResult> {
        self.jobs.iter().flat_map(|job| job.steps.iter())
    }

    pub fn error_steps(&self) -> impl Iterator<Item = (&JobReport, &StepResult)> {
        self.jobs.iter().flat_map(|job| {
            job.steps
                .iter()
                .filter(|step| step.is_error())
                .map(move |step| (job, step))
        })
    }

    pub fn status_counts(&self) -> BTreeMap<TaskStatus, usize> {
        let mut counts = BTreeMap::new();
        for step in self.steps() {
            *counts.entry(step.status).or_insert(0) += 1;
        }
        counts
    }

    /// One-line summary, e.g. `2 jobs, 4 steps: EXECUTES=3 FAILED=1`
    pub fn summary_line(&self) -> String {
        let counts = self
            .status_counts()
            .into_iter()
            .map(|(status, n)| format!("{}={}", status, n))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "{} jobs, {} steps: {}",
            self.jobs.len(),
            self.steps().count(),
            if counts.is_empty() { "-".to_string() } else { counts }
        )
    }
}
