//! Step execution outcomes
//!
//! Ten statuses in three groups:
//!
//! - Execution: `EXECUTES`, `WOULD_EXECUTE`, `SKIPS`, `WOULD_SKIP`
//! - Comparison: `IDENTICAL`, `DIFFERENT`
//! - Errors: `INVALID_USES`, `INVALID_PARAMETER`, `FAILED`, `TIMED_OUT`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Outcome of running one step of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Action ran
    Executes,
    /// Dry run: action would run
    WouldExecute,
    /// Outputs already present, action not run
    Skips,
    /// Dry run: outputs already present
    WouldSkip,
    /// Compare mode: fresh outputs match the previous ones
    Identical,
    /// Compare mode: fresh outputs differ from the previous ones
    Different,
    /// `uses:` names no registered action
    InvalidUses,
    /// Parameters rejected by the action's input declarations
    InvalidParameter,
    /// Action raised
    Failed,
    /// Action exceeded the step timeout
    TimedOut,
}

/// Disjoint groups of [`TaskStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    Execution,
    Comparison,
    Error,
}

impl TaskStatus {
    /// Every status, in declaration order
    pub const ALL: [TaskStatus; 10] = [
        TaskStatus::Executes,
        TaskStatus::WouldExecute,
        TaskStatus::Skips,
        TaskStatus::WouldSkip,
        TaskStatus::Identical,
        TaskStatus::Different,
        TaskStatus::InvalidUses,
        TaskStatus::InvalidParameter,
        TaskStatus::Failed,
        TaskStatus::TimedOut,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Executes => "EXECUTES",
            TaskStatus::WouldExecute => "WOULD_EXECUTE",
            TaskStatus::Skips => "SKIPS",
            TaskStatus::WouldSkip => "WOULD_SKIP",
            TaskStatus::Identical => "IDENTICAL",
            TaskStatus::Different => "DIFFERENT",
            TaskStatus::InvalidUses => "INVALID_USES",
            TaskStatus::InvalidParameter => "INVALID_PARAMETER",
            TaskStatus::Failed => "FAILED",
            TaskStatus::TimedOut => "TIMED_OUT",
        }
    }

    pub fn category(self) -> StatusCategory {
        match self {
            TaskStatus::Executes
            | TaskStatus::WouldExecute
            | TaskStatus::Skips
            | TaskStatus::WouldSkip => StatusCategory::Execution,
            TaskStatus::Identical | TaskStatus::Different => StatusCategory::Comparison,
            TaskStatus::InvalidUses
            | TaskStatus::InvalidParameter
            | TaskStatus::Failed
            | TaskStatus::TimedOut => StatusCategory::Error,
        }
    }

    pub fn is_success(self) -> bool {
        match self {
            TaskStatus::Executes
            | TaskStatus::WouldExecute
            | TaskStatus::Skips
            | TaskStatus::WouldSkip
            | TaskStatus::Identical
            | TaskStatus::Different => true,
            TaskStatus::InvalidUses
            | TaskStatus::InvalidParameter
            | TaskStatus::Failed
            | TaskStatus::TimedOut => false,
        }
    }

    pub fn is_error(self) -> bool {
        !self.is_success()
    }

    /// The action actually ran
    pub fn is_execution(self) -> bool {
        match self {
            TaskStatus::Executes | TaskStatus::Identical | TaskStatus::Different => true,
            TaskStatus::WouldExecute
            | TaskStatus::Skips
            | TaskStatus::WouldSkip
            | TaskStatus::InvalidUses
            | TaskStatus::InvalidParameter
            | TaskStatus::Failed
            | TaskStatus::TimedOut => false,
        }
    }

    pub fn is_dry_run(self) -> bool {
        match self {
            TaskStatus::WouldExecute | TaskStatus::WouldSkip => true,
            TaskStatus::Executes
            | TaskStatus::Skips
            | TaskStatus::Identical
            | TaskStatus::Different
            | TaskStatus::InvalidUses
            | TaskStatus::InvalidParameter
            | TaskStatus::Failed
            | TaskStatus::TimedOut => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown task status '{}'", s))
    }
}
