//! CLI module for specpilot
//!
//! This module provides the command-line interface over the orchestrator.
//!
//! ## Commands
//!
//! - `test <spec> --base-url <url>` - Run contract tests against a live service
//! - `resiliency <spec> --base-url <url>` - Same, with boundary-condition generation enabled
//! - `compat` - Check the working-tree spec for backward-compatible changes
//! - `mock <spec> --port <port>` - Serve a mock until Ctrl-C
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{PathMapping, PilotConfig, ReportLayout};
use crate::error::PilotError;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// The run completed but reported failures (or incompatible changes).
    pub const FAILURE: ExitCode = ExitCode(1);
    /// The orchestrator could not do what was asked.
    pub const ERROR: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create an error with [`ExitCode::ERROR`].
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::ERROR)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<PilotError> for CliError {
    /// Render through miette so diagnostic codes and help text reach the terminal.
    fn from(err: PilotError) -> Self {
        CliError::error(format!("{:?}", miette::Report::new(err)))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Drive an external API contract-testing engine
#[derive(Parser, Debug)]
#[command(name = "specpilot")]
#[command(version = VERSION)]
#[command(about = "Drive an external API contract-testing engine", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Print machine-readable JSON instead of a human summary
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides layered over `SPECPILOT_*` environment configuration.
#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// Engine command prefix, whitespace separated (e.g. "java -jar specmatic.jar")
    #[arg(long, global = true, value_name = "CMD")]
    pub engine: Option<String>,

    /// Directory the engine writes reports into
    #[arg(long, global = true, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Report layout: per-run or shared
    #[arg(long, global = true, value_name = "LAYOUT")]
    pub report_layout: Option<String>,

    /// Time limit for a test or compatibility run, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Rewrite local paths for the engine, as <local>=<engine>
    #[arg(long, global = true, value_name = "MAP")]
    pub path_map: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run contract tests against a live service
    Test(TestArgs),

    /// Run contract tests with boundary-condition generation
    Resiliency(TestArgs),

    /// Check the spec for backward-compatible changes against a base branch
    Compat {
        /// Spec path (relative to the repository) to analyze
        #[arg(long, value_name = "PATH")]
        target: Option<String>,
        /// Branch to compare against
        #[arg(long, value_name = "BRANCH")]
        base_branch: Option<String>,
        /// Repository working tree
        #[arg(long, value_name = "DIR")]
        repo: Option<PathBuf>,
    },

    /// Serve a mock of the spec until interrupted
    Mock {
        /// Spec file
        #[arg(value_name = "SPEC")]
        spec: PathBuf,
        /// Port to listen on
        #[arg(short, long)]
        port: u16,
        /// Spec format (yaml or json); inferred from the extension when omitted
        #[arg(long, value_name = "FORMAT")]
        format: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Spec file
    #[arg(value_name = "SPEC")]
    pub spec: PathBuf,
    /// Base URL of the service under test
    #[arg(long, value_name = "URL")]
    pub base_url: String,
    /// Spec format (yaml or json); inferred from the extension when omitted
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,
}

impl EngineArgs {
    /// Environment configuration with CLI overrides applied.
    fn to_config(&self) -> CliResult<PilotConfig> {
        let mut config = PilotConfig::from_env()?;
        if let Some(engine) = &self.engine {
            config = config.with_engine_command(engine.split_whitespace().map(str::to_string).collect());
        }
        if let Some(dir) = &self.report_dir {
            config = config.with_report_root(dir);
        }
        if let Some(layout) = &self.report_layout {
            config = config.with_report_layout(layout.parse::<ReportLayout>()?);
        }
        if let Some(secs) = self.timeout {
            let limit = Duration::from_secs(secs);
            config = config.with_test_timeout(limit).with_compat_timeout(limit);
        }
        if let Some(map) = &self.path_map {
            config = config.with_path_mapping(map.parse::<PathMapping>()?);
        }
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    let result = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::error(format!("Error: failed to start async runtime: {e}")))
        .and_then(|rt| rt.block_on(execute(cli)));

    match result {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
async fn execute(cli: Cli) -> CliResult<ExitCode> {
    let config = cli.engine.to_config()?;
    let json = cli.json;

    match cli.command {
        Command::Test(args) => commands::run_test(config, &args, false, json).await,
        Command::Resiliency(args) => commands::run_test(config, &args, true, json).await,
        Command::Compat {
            target,
            base_branch,
            repo,
        } => commands::check_compatibility(config, target, base_branch, repo, json).await,
        Command::Mock { spec, port, format } => commands::serve_mock(config, &spec, port, format.as_deref(), json).await,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_test() {
        let cli = Cli::try_parse_from(["specpilot", "test", "api.yaml", "--base-url", "http://localhost:8080"]).unwrap();
        if let Command::Test(args) = cli.command {
            assert_eq!(args.spec, PathBuf::from("api.yaml"));
            assert_eq!(args.base_url, "http://localhost:8080");
        } else {
            panic!("Expected Test command");
        }
    }

    #[test]
    fn test_cli_parse_resiliency_requires_base_url() {
        assert!(Cli::try_parse_from(["specpilot", "resiliency", "api.yaml"]).is_err());
        let cli = Cli::try_parse_from(["specpilot", "resiliency", "api.yaml", "--base-url", "http://h"]).unwrap();
        assert!(matches!(cli.command, Command::Resiliency(_)));
    }

    #[test]
    fn test_cli_parse_mock() {
        let cli = Cli::try_parse_from(["specpilot", "mock", "api.json", "-p", "9000", "--json"]).unwrap();
        assert!(cli.json);
        if let Command::Mock { port, format, .. } = cli.command {
            assert_eq!(port, 9000);
            assert_eq!(format, None);
        } else {
            panic!("Expected Mock command");
        }
    }

    #[test]
    fn test_cli_parse_compat_and_global_engine() {
        let cli = Cli::try_parse_from([
            "specpilot",
            "compat",
            "--base-branch",
            "main",
            "--engine",
            "java -jar specmatic.jar",
        ])
        .unwrap();
        assert_eq!(cli.engine.engine.as_deref(), Some("java -jar specmatic.jar"));
        assert!(matches!(cli.command, Command::Compat { .. }));
    }

    #[test]
    fn test_timeout_flag_covers_compat_runs() {
        let cli = Cli::try_parse_from(["specpilot", "compat", "--timeout", "7"]).unwrap();
        let config = cli.engine.to_config().unwrap();
        assert_eq!(config.test_timeout, Duration::from_secs(7));
        assert_eq!(config.compat_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_pilot_error_keeps_diagnostic_code() {
        let err = CliError::from(PilotError::NotRunning { port: 9000 });
        assert_eq!(err.exit_code, ExitCode::ERROR);
        assert!(err.message.contains("no server running on port 9000"));
        assert!(err.message.contains("specpilot::not_running"));
    }
}
