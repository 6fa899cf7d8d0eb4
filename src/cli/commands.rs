//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use specpilot_core::{CaseStatus, CompatibilityReport, SpecFormat};

use crate::compat::CompatibilityRequest;
use crate::config::PilotConfig;
use crate::orchestrator::{MockCommand, MockOpResult, Orchestrator, TestRequest, TestRunReport, parse_format};

use super::{CliError, CliResult, ExitCode};

// ============================================================================
// Test runs
// ============================================================================

/// Run a contract (or, with `boundary`, resiliency) test from a spec file.
pub async fn run_test(config: PilotConfig, args: &super::TestArgs, boundary: bool, json: bool) -> CliResult<ExitCode> {
    let (content, format) = read_spec(&args.spec, args.format.as_deref())?;
    let orchestrator = Orchestrator::new(config)?;
    let report = orchestrator
        .run_test(TestRequest {
            spec_content: content,
            format,
            base_url: args.base_url.clone(),
            boundary,
        })
        .await?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &TestRunReport) {
    for case in &report.suite.cases {
        let mark = match case.status {
            CaseStatus::Passed => "PASS",
            CaseStatus::Failed => "FAIL",
            CaseStatus::Skipped => "SKIP",
        };
        println!("{mark}  {}", case.name);
        if let Some(message) = &case.failure_message {
            for line in message.lines() {
                println!("        {line}");
            }
        }
    }
    if report.suite.is_truncated() {
        println!("(engine listed {} of {} cases)", report.suite.cases.len(), report.suite.total);
    }
    println!();
    println!("{}", report.summary);
    if report.suite.total == 0 && !report.stderr_excerpt.trim().is_empty() {
        eprintln!("--- engine stderr (tail) ---");
        eprintln!("{}", report.stderr_excerpt.trim_end());
    }
}

// ============================================================================
// Compatibility
// ============================================================================

pub async fn check_compatibility(
    config: PilotConfig,
    target: Option<String>,
    base_branch: Option<String>,
    repo: Option<PathBuf>,
    json: bool,
) -> CliResult<ExitCode> {
    let orchestrator = Orchestrator::new(config)?;
    let report = orchestrator
        .check_compatibility(CompatibilityRequest {
            target_path: target,
            base_branch,
            repo_dir: repo,
        })
        .await?;

    if json {
        print_json(&report)?;
    } else {
        print_compatibility(&report);
    }
    Ok(if report.compatible {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_compatibility(report: &CompatibilityReport) {
    for change in &report.changes {
        println!("{:?}: {}", change.severity, change.message);
    }
    let verdict = if report.compatible {
        "compatible"
    } else {
        "NOT compatible"
    };
    println!(
        "{verdict}: {} breaking, {} warnings, {} info",
        report.breaking, report.warnings, report.info
    );
}

// ============================================================================
// Mock server
// ============================================================================

/// Start a mock, block until Ctrl-C, then stop it.
pub async fn serve_mock(
    config: PilotConfig,
    spec: &Path,
    port: u16,
    format: Option<&str>,
    json: bool,
) -> CliResult<ExitCode> {
    let (content, format) = read_spec(spec, format)?;
    let orchestrator = Orchestrator::new(config)?;
    let started = orchestrator
        .manage_mock(MockCommand::Start {
            spec_content: content,
            format,
            port,
        })
        .await?;

    if json {
        print_json(&started)?;
    } else if let MockOpResult::Started { server } = &started {
        println!("Mock server for {} listening at {}", spec.display(), server.url);
        println!("Press Ctrl-C to stop.");
    }

    let waited = tokio::signal::ctrl_c().await;
    let stopped = orchestrator.manage_mock(MockCommand::Stop { port }).await;
    orchestrator.shutdown().await;

    waited.map_err(|e| CliError::error(format!("Error: failed to wait for Ctrl-C: {e}")))?;
    stopped?;
    if !json {
        println!("Stopped mock server on port {port}.");
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Helpers
// ============================================================================

/// Read a spec file and settle its format: explicit flag first, then file extension, then YAML.
fn read_spec(path: &Path, format: Option<&str>) -> CliResult<(String, SpecFormat)> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::error(format!("Error reading {}: {}", path.display(), e)))?;
    let format = match format {
        Some(_) => parse_format(format)?,
        None => path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse::<SpecFormat>().ok())
            .unwrap_or(SpecFormat::Yaml),
    };
    Ok((content, format))
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::error(format!("Error encoding JSON output: {e}")))?;
    println!("{text}");
    Ok(())
}
