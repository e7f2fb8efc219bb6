//! stepflow CLI - matrix workflow runner

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;

use stepflow::error::{FixSuggestion, StepflowError};
use stepflow::{
    ActionRegistry, ExecutionMode, LogLevel, StepflowConfig, WorkflowExecutor, WorkflowLogger,
    WorkflowReport,
};

#[derive(Parser)]
#[command(name = "stepflow")]
#[command(about = "stepflow - run workflows across a matrix of parameters")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow file
    Run {
        /// Path to the workflow file (.yaml, .yml or .json)
        file: String,

        /// Classify steps without running anything
        #[arg(long, conflicts_with = "compare")]
        dry_run: bool,

        /// Run actions and compare outputs with the previous run
        #[arg(long)]
        compare: bool,

        /// Keep running a job's steps after one fails (`=false` overrides the environment)
        #[arg(
            long,
            value_name = "BOOL",
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "true"
        )]
        continue_on_error: Option<bool>,

        /// Per-step timeout in seconds
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,

        /// Append progress records to this file
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,

        /// Progress verbosity: none, summary or all
        #[arg(long, value_name = "LEVEL")]
        log_level: Option<LogLevel>,

        /// No progress output on the terminal
        #[arg(short, long)]
        quiet: bool,
    },

    /// Validate a workflow file (parse only)
    Validate {
        /// Path to the workflow file
        file: String,
    },

    /// List registered actions
    Actions,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            dry_run,
            compare,
            continue_on_error,
            timeout,
            log_file,
            log_level,
            quiet,
        } => {
            let mode = if dry_run {
                ExecutionMode::DryRun
            } else if compare {
                ExecutionMode::Compare
            } else {
                ExecutionMode::Run
            };
            let options = RunOptions {
                mode,
                continue_on_error,
                timeout,
                log_file,
                log_level,
                quiet,
            };
            run_workflow(&file, options).await
        }
        Commands::Validate { file } => validate_workflow(&file),
        Commands::Actions => {
            list_actions();
            Ok(true)
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let Some(suggestion) = e.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            std::process::exit(1);
        }
    }
}

struct RunOptions {
    mode: ExecutionMode,
    continue_on_error: Option<bool>,
    timeout: Option<u64>,
    log_file: Option<PathBuf>,
    log_level: Option<LogLevel>,
    quiet: bool,
}

/// Flags over environment over defaults
fn resolve_config(options: &RunOptions) -> Result<StepflowConfig, StepflowError> {
    let mut config = StepflowConfig::from_env()?;
    config.executor.mode = options.mode;
    if let Some(enabled) = options.continue_on_error {
        config.executor.continue_on_error = enabled;
    }
    if let Some(secs) = options.timeout {
        config.executor.step_timeout = Duration::from_secs(secs);
    }
    if let Some(level) = options.log_level {
        config.log_level = level;
    }
    Ok(config)
}

fn executor(config: StepflowConfig) -> WorkflowExecutor {
    WorkflowExecutor::new(Arc::new(ActionRegistry::with_builtins())).with_config(config.executor)
}

async fn run_workflow(file: &str, options: RunOptions) -> Result<bool, StepflowError> {
    let config = resolve_config(&options)?;
    let mut logger = WorkflowLogger::new(!options.quiet, options.log_file.clone(), config.log_level);
    let executor = executor(config);

    let workflow = executor.parse_workflow(file)?;
    if !options.quiet {
        println!(
            "{} Running '{}' ({:?})",
            "→".cyan(),
            workflow.id.cyan().bold(),
            executor.config().mode
        );
    }

    let report = executor.execute(&workflow, &mut logger).await?;
    logger.close()?;

    if !options.quiet {
        print_report(&report);
    }
    Ok(report.is_success())
}

fn print_report(report: &WorkflowReport) {
    for (job, step) in report.error_steps() {
        println!(
            "  {} job {} [{}] step '{}': {}",
            "✗".red(),
            job.index + 1,
            job.describe(),
            step.label,
            step.message.as_deref().unwrap_or(step.status.as_str())
        );
    }

    let summary = report.summary_line();
    if report.is_success() {
        println!("{} {}", "✓".green(), summary);
    } else {
        println!("{} {}", "✗".red().bold(), summary);
    }
}

fn validate_workflow(file: &str) -> Result<bool, StepflowError> {
    let config = StepflowConfig::from_env()?;
    let executor = executor(config);

    let workflow = executor.parse_workflow(file)?;
    let jobs = executor.expand_matrix(workflow.matrix.as_ref())?;

    println!("{} Workflow '{}' is valid", "✓".green(), file);
    println!("  Id: {}", workflow.id);
    println!("  Steps: {}", workflow.steps.len());
    if workflow.has_matrix() {
        let axes: Vec<&str> = workflow.matrix.iter().flat_map(|m| m.keys()).map(String::as_str).collect();
        println!("  Matrix: {}", axes.join(", "));
    }
    println!("  Jobs: {}", jobs.len());
    Ok(true)
}

fn list_actions() {
    let registry = ActionRegistry::with_builtins();

    for (package, names) in registry.list_actions_by_package() {
        let package = if package.is_empty() { "(root)" } else { package.as_str() };
        println!("{}", package.cyan().bold());
        for name in names {
            match registry.action_info(&name) {
                Some(info) if !info.description.is_empty() => {
                    println!("  {} {} - {}", info.name.bold(), info.version, info.description)
                }
                Some(info) => println!("  {} {}", info.name.bold(), info.version),
                None => println!("  {}", name),
            }
        }
    }

    for warning in registry.get_discovery_warnings() {
        println!("{} {}", "warning:".yellow(), warning);
    }
    for error in registry.get_discovery_errors() {
        println!("{} {}", "error:".red(), error);
    }
}
