//! The orchestrator: the single entry point upper layers call.
//!
//! It stages specs, drives the execution coordinator, reduces whatever the engine left behind into a
//! [`TestSuiteReport`], and fronts the mock registry and compatibility checker.

use std::fs;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use specpilot_core::{CompatibilityReport, ReportSource, SpecFormat, TestSuiteReport};
use specpilot_report::{console, junit};
use url::Url;

use crate::compat::{CompatibilityChecker, CompatibilityRequest};
use crate::config::PilotConfig;
use crate::executor::{ExecutionCoordinator, ExecutionOutcome, ExecutionRequest, tail_excerpt};
use crate::error::{PilotError, PilotResult};
use crate::mock::{MockRegistry, MockServerInfo};
use crate::staging;

/// A contract or resiliency test request.
#[derive(Debug, Clone)]
pub struct TestRequest {
    pub spec_content: String,
    pub format: SpecFormat,
    pub base_url: String,
    /// Enables boundary-condition (resiliency) generation.
    pub boundary: bool,
}

/// Outcome of a test run, as handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRunReport {
    /// `true` only for a clean exit (code 0).
    pub success: bool,
    pub exit_code: Option<i32>,
    pub boundary_mode: bool,
    pub suite: TestSuiteReport,
    pub source: ReportSource,
    pub summary: String,
    pub report_dir: String,
    pub elapsed_ms: u64,
    pub stdout_excerpt: String,
    pub stderr_excerpt: String,
}

/// Mock-server operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCommand {
    Start {
        spec_content: String,
        format: SpecFormat,
        port: u16,
    },
    Stop {
        port: u16,
    },
    List,
}

impl MockCommand {
    /// Assemble a command from loosely typed caller input.
    ///
    /// `format` defaults to YAML when absent.
    pub fn from_parts(
        command: &str,
        spec_content: Option<String>,
        format: Option<&str>,
        port: Option<u16>,
    ) -> PilotResult<Self> {
        let require_port = || port.ok_or_else(|| PilotError::invalid(format!("'{command}' requires a port")));
        match command {
            "start" => {
                let spec_content =
                    spec_content.ok_or_else(|| PilotError::invalid("'start' requires spec content"))?;
                Ok(MockCommand::Start {
                    spec_content,
                    format: parse_format(format)?,
                    port: require_port()?,
                })
            }
            "stop" => Ok(MockCommand::Stop { port: require_port()? }),
            "list" => Ok(MockCommand::List),
            other => Err(PilotError::invalid(format!(
                "unknown mock command '{other}' (expected start, stop, or list)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MockOpResult {
    Started { server: MockServerInfo },
    Stopped { server: MockServerInfo },
    Listing { servers: Vec<MockServerInfo> },
}

/// Operations this deployment can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ContractTest,
    ResiliencyTest,
    MockServer,
    CompatibilityCheck,
}

/// Orchestration core for the contract engine.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Arc<PilotConfig>,
    coordinator: Arc<ExecutionCoordinator>,
    mocks: Arc<MockRegistry>,
    compat: CompatibilityChecker,
}

impl Orchestrator {
    /// ## Errors
    /// [`PilotError::InvalidInput`] if `config` fails validation.
    pub fn new(config: PilotConfig) -> PilotResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let mocks = Arc::new(MockRegistry::new(Arc::clone(&config)));
        Ok(Self::with_registry(config, mocks))
    }

    /// Build around an existing registry, e.g. one shared between several front ends.
    pub fn with_registry(config: Arc<PilotConfig>, mocks: Arc<MockRegistry>) -> Self {
        let coordinator = Arc::new(ExecutionCoordinator::new(Arc::clone(&config)));
        let compat = CompatibilityChecker::new(Arc::clone(&coordinator));
        Self {
            config,
            coordinator,
            mocks,
            compat,
        }
    }

    pub fn config(&self) -> &PilotConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<MockRegistry> {
        &self.mocks
    }

    /// Stage the spec, run the engine in test mode, and reduce the outcome to a report.
    ///
    /// A failing run is a normal result with `success == false`. The returned suite comes from the run's
    /// authoritative report artifact when one exists and parses, otherwise from the console output.
    #[tracing::instrument(skip_all, fields(base_url = %request.base_url, boundary = request.boundary))]
    pub async fn run_test(&self, request: TestRequest) -> PilotResult<TestRunReport> {
        validate_base_url(&request.base_url)?;
        let staged = staging::stage(&request.spec_content, request.format, self.config.staging_root.as_deref())?;
        let outcome = self
            .coordinator
            .run_test(
                &staged,
                &ExecutionRequest {
                    base_url: request.base_url.clone(),
                    boundary: request.boundary,
                    timeout: None,
                },
            )
            .await?;
        Ok(self.build_report(&outcome, request.boundary))
    }

    /// Start, stop, or list mock servers.
    pub async fn manage_mock(&self, command: MockCommand) -> PilotResult<MockOpResult> {
        match command {
            MockCommand::Start {
                spec_content,
                format,
                port,
            } => {
                let server = self.mocks.start(&spec_content, format, port).await?;
                Ok(MockOpResult::Started { server })
            }
            MockCommand::Stop { port } => {
                let server = self.mocks.stop(port).await?;
                Ok(MockOpResult::Stopped { server })
            }
            MockCommand::List => Ok(MockOpResult::Listing {
                servers: self.mocks.list().await,
            }),
        }
    }

    pub async fn check_compatibility(&self, request: CompatibilityRequest) -> PilotResult<CompatibilityReport> {
        self.compat.check(&request).await
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps = vec![
            Capability::ContractTest,
            Capability::ResiliencyTest,
            Capability::MockServer,
        ];
        if self.config.vcs_available {
            caps.push(Capability::CompatibilityCheck);
        }
        caps
    }

    /// Terminate every mock server this orchestrator's registry tracks.
    pub async fn shutdown(&self) {
        self.mocks.shutdown().await;
    }

    fn build_report(&self, outcome: &ExecutionOutcome, boundary: bool) -> TestRunReport {
        let output = &outcome.output;
        let (suite, source) = reduce_outcome(outcome);
        let summary = render_summary(&suite, &source, output.exit_code, &output.stderr);
        let limit = self.config.excerpt_limit;
        TestRunReport {
            success: output.success(),
            exit_code: output.exit_code,
            boundary_mode: boundary,
            suite,
            source,
            summary,
            report_dir: outcome.report_dir.display().to_string(),
            elapsed_ms: output.elapsed.as_millis() as u64,
            stdout_excerpt: tail_excerpt(&output.stdout, limit).to_string(),
            stderr_excerpt: tail_excerpt(&output.stderr, limit).to_string(),
        }
    }
}

/// Pick the suite: authoritative artifact if it reads and parses, otherwise the console heuristic.
fn reduce_outcome(outcome: &ExecutionOutcome) -> (TestSuiteReport, ReportSource) {
    if let Some(report) = outcome.authoritative_report() {
        match fs::read_to_string(&report.path) {
            Ok(text) => match junit::parse_junit(&text) {
                Ok(suite) => {
                    return (
                        suite,
                        ReportSource::Artifact {
                            file: report.file_name.clone(),
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(file = %report.path.display(), error = %e, "report unparseable; using console output");
                }
            },
            Err(e) => {
                tracing::warn!(file = %report.path.display(), error = %e, "report unreadable; using console output");
            }
        }
    } else {
        tracing::debug!("no new report artifact; using console output");
    }
    (console::parse_console(&outcome.output.stdout), ReportSource::ConsoleFallback)
}

/// One-line human summary of a run.
pub fn render_summary(suite: &TestSuiteReport, source: &ReportSource, exit_code: Option<i32>, stderr: &str) -> String {
    if suite.total > 0 {
        return format!(
            "{} passed, {} failed, {} skipped ({})",
            suite.passed(),
            suite.failed(),
            suite.skipped,
            source.label()
        );
    }
    let exit = match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    };
    match stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
        Some(last) => format!("no test results recognised in {} ({exit}): {last}", source.label()),
        None => format!("no test results recognised in {} ({exit})", source.label()),
    }
}

/// Parse a caller-supplied format name; absent means YAML.
pub fn parse_format(raw: Option<&str>) -> PilotResult<SpecFormat> {
    match raw {
        Some(raw) => raw
            .parse::<SpecFormat>()
            .map_err(|e| PilotError::invalid(e.to_string())),
        None => Ok(SpecFormat::Yaml),
    }
}

fn validate_base_url(raw: &str) -> PilotResult<()> {
    let url = Url::parse(raw.trim()).map_err(|e| PilotError::invalid(format!("base_url '{raw}' is not a URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PilotError::invalid(format!(
            "base_url '{raw}' must use http or https, not '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(PilotError::invalid(format!("base_url '{raw}' has no host")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use specpilot_core::TestCase;

    use super::*;

    #[test]
    fn test_base_url_validation() {
        assert!(validate_base_url("http://localhost:8080").is_ok());
        assert!(validate_base_url("https://api.example.com/v1").is_ok());
        for bad in ["", "localhost:8080", "ftp://host", "not a url"] {
            assert!(
                matches!(validate_base_url(bad), Err(PilotError::InvalidInput(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_mock_command_from_parts() {
        assert_eq!(
            MockCommand::from_parts("start", Some("x: 1".into()), None, Some(9000)).unwrap(),
            MockCommand::Start {
                spec_content: "x: 1".into(),
                format: SpecFormat::Yaml,
                port: 9000
            }
        );
        assert_eq!(
            MockCommand::from_parts("stop", None, None, Some(9000)).unwrap(),
            MockCommand::Stop { port: 9000 }
        );
        assert_eq!(MockCommand::from_parts("list", None, None, None).unwrap(), MockCommand::List);

        for (cmd, spec, format, port) in [
            ("start", None, None, Some(9000)),
            ("start", Some("x".to_string()), Some("toml"), Some(9000)),
            ("stop", None, None, None),
            ("restart", None, None, None),
        ] {
            assert!(matches!(
                MockCommand::from_parts(cmd, spec, format, port),
                Err(PilotError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_summary_with_results() {
        let suite = TestSuiteReport::from_cases(
            "api",
            vec![
                TestCase::passed("a", "api"),
                TestCase::failed("b", "api", None),
                TestCase::skipped("c", "api"),
            ],
            0.0,
        );
        let summary = render_summary(
            &suite,
            &ReportSource::Artifact {
                file: "TEST-api.xml".into(),
            },
            Some(1),
            "",
        );
        insta::assert_snapshot!(summary, @"1 passed, 1 failed, 1 skipped (report artifact)");
    }

    #[test]
    fn test_summary_for_crash_is_never_empty() {
        let suite = console::parse_console("");
        let summary = render_summary(
            &suite,
            &ReportSource::ConsoleFallback,
            Some(1),
            "Exception in thread main\njava.lang.IllegalStateException: bad spec\n",
        );
        assert_eq!(
            summary,
            "no test results recognised in console output (exit code 1): java.lang.IllegalStateException: bad spec"
        );
        assert!(!render_summary(&suite, &ReportSource::ConsoleFallback, None, "").is_empty());
    }

    #[test]
    fn test_capabilities_follow_vcs_flag() {
        let plain = Orchestrator::new(PilotConfig::new()).unwrap();
        assert!(!plain.capabilities().contains(&Capability::CompatibilityCheck));
        let vcs = Orchestrator::new(PilotConfig::new().with_vcs_available(true)).unwrap();
        assert!(vcs.capabilities().contains(&Capability::CompatibilityCheck));
    }
}
