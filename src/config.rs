//! Runtime configuration
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Command-line flags (applied by the binary)
//! 2. Environment variables (`STEPFLOW_*`, a `.env` file is honoured by the binary)
//! 3. Defaults

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logger::LogLevel;
use crate::matrix::DEFAULT_MAX_JOBS;

pub const ENV_STEP_TIMEOUT: &str = "STEPFLOW_STEP_TIMEOUT_SECS";
pub const ENV_CONTINUE_ON_ERROR: &str = "STEPFLOW_CONTINUE_ON_ERROR";
pub const ENV_MAX_JOBS: &str = "STEPFLOW_MAX_JOBS";
pub const ENV_LOG_LEVEL: &str = "STEPFLOW_LOG_LEVEL";

/// Default per-step timeout (5 minutes)
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(300);

/// How steps are driven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Run actions, skipping those whose outputs already exist
    #[default]
    Run,
    /// Classify steps without running anything
    DryRun,
    /// Run actions and compare fresh outputs with the existing ones
    Compare,
}

/// Executor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub mode: ExecutionMode,
    pub step_timeout: Duration,
    /// Keep running a job's remaining steps after an error status
    pub continue_on_error: bool,
    pub max_jobs: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Run,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            continue_on_error: false,
            max_jobs: DEFAULT_MAX_JOBS,
        }
    }
}

/// Everything the binary configures: executor plus logger verbosity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepflowConfig {
    pub executor: ExecutorConfig,
    pub log_level: LogLevel,
}

impl StepflowConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Unset or empty variables keep the current value.
    pub fn with_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(raw) = get(ENV_STEP_TIMEOUT) {
            let secs: u64 = parse_var(ENV_STEP_TIMEOUT, &raw)?;
            if secs == 0 {
                return Err(invalid(ENV_STEP_TIMEOUT, &raw, "must be at least 1 second"));
            }
            self.executor.step_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = get(ENV_CONTINUE_ON_ERROR) {
            self.executor.continue_on_error = parse_bool(ENV_CONTINUE_ON_ERROR, &raw)?;
        }

        if let Some(raw) = get(ENV_MAX_JOBS) {
            let max: usize = parse_var(ENV_MAX_JOBS, &raw)?;
            if max == 0 {
                return Err(invalid(ENV_MAX_JOBS, &raw, "must be positive"));
            }
            self.executor.max_jobs = max;
        }

        if let Some(raw) = get(ENV_LOG_LEVEL) {
            self.log_level = raw
                .parse()
                .map_err(|reason: String| invalid(ENV_LOG_LEVEL, &raw, &reason))?;
        }

        Ok(self)
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, raw, &e.to_string()))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw, "expected true or false")),
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
