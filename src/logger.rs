//! Workflow progress logger
//!
//! Writes leveled text records to the terminal and/or a log file. The file
//! is opened lazily on the first record (creating parent directories,
//! appending to existing content) and closed by [`WorkflowLogger::close`],
//! which may be called any number of times.
//!
//! Internal diagnostics go through `tracing`; this logger is the
//! user-facing record of a run.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Verbosity of the progress log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Nothing is written
    None,
    /// Job and workflow summaries
    #[default]
    Summary,
    /// Summaries plus one record per step
    All,
}

impl LogLevel {
    pub const ALL_LEVELS: [LogLevel; 3] = [LogLevel::None, LogLevel::Summary, LogLevel::All];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::None => "none",
            LogLevel::Summary => "summary",
            LogLevel::All => "all",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        LogLevel::ALL_LEVELS
            .into_iter()
            .find(|level| level.as_str() == lowered)
            .ok_or_else(|| format!("expected one of none, summary, all (got '{}')", s))
    }
}

pub struct WorkflowLogger {
    terminal: bool,
    log_file: Option<PathBuf>,
    log_level: LogLevel,
    file_stream: Option<BufWriter<File>>,
}

impl Default for WorkflowLogger {
    fn default() -> Self {
        Self::new(true, None, LogLevel::Summary)
    }
}

impl fmt::Debug for WorkflowLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowLogger")
            .field("terminal", &self.terminal)
            .field("log_file", &self.log_file)
            .field("log_level", &self.log_level)
            .field("file_open", &self.file_stream.is_some())
            .finish()
    }
}

impl WorkflowLogger {
    /// No file is touched until the first record is written
    pub fn new(terminal: bool, log_file: Option<PathBuf>, log_level: LogLevel) -> Self {
        Self {
            terminal,
            log_file,
            log_level,
            file_stream: None,
        }
    }

    /// Logger with no destinations
    pub fn disabled() -> Self {
        Self::new(false, None, LogLevel::None)
    }

    pub fn terminal(&self) -> bool {
        self.terminal
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn is_terminal_logging(&self) -> bool {
        self.terminal
    }

    pub fn is_file_logging(&self) -> bool {
        self.log_file.is_some()
    }

    pub fn has_output_destinations(&self) -> bool {
        self.is_terminal_logging() || self.is_file_logging()
    }

    pub fn is_file_open(&self) -> bool {
        self.file_stream.is_some()
    }

    /// Open the log file if configured and not already open
    pub fn open(&mut self) -> io::Result<()> {
        if self.file_stream.is_some() {
            return Ok(());
        }
        let Some(path) = &self.log_file else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.file_stream = Some(BufWriter::new(file));
        Ok(())
    }

    /// Record written at `summary` and `all`
    pub fn summary(&mut self, message: impl AsRef<str>) -> io::Result<()> {
        if self.log_level >= LogLevel::Summary {
            self.write_record(message.as_ref())?;
        }
        Ok(())
    }

    /// Record written only at `all`
    pub fn detail(&mut self, message: impl AsRef<str>) -> io::Result<()> {
        if self.log_level >= LogLevel::All {
            self.write_record(message.as_ref())?;
        }
        Ok(())
    }

    fn write_record(&mut self, message: &str) -> io::Result<()> {
        if self.terminal {
            println!("{}", message);
        }
        if self.log_file.is_some() {
            self.open()?;
            if let Some(stream) = self.file_stream.as_mut() {
                writeln!(stream, "{}", message)?;
            }
        }
        Ok(())
    }

    /// Flush and release the file; safe to call repeatedly
    pub fn close(&mut self) -> io::Result<()> {
        match self.file_stream.take() {
            Some(mut stream) => stream.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for WorkflowLogger {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to flush workflow log");
        }
    }
}
