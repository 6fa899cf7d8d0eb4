//! Execution coordinator: runs one engine invocation under a timeout and correlates its report artifacts.
//!
//! ```text
//! Idle -> Spawned -> Running -> Completed
//!            |          \-> TimedOut (process terminated and reaped before returning)
//!            \-> SpawnFailed
//! ```

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex as SyncMutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::{PilotConfig, ReportLayout};
use crate::discovery::{self, DiscoveredReport};
use crate::engine::{self, CommandSpec, EngineMode};
use crate::error::{PilotError, PilotResult};
use crate::process::{ChildProcess, ProcessHandle, terminate_with_grace};
use crate::staging::StagedSpec;

/// Grace between terminate and kill when a run overruns its limit.
const KILL_GRACE: Duration = Duration::from_secs(2);
/// Upper bound on draining stdout/stderr after exit; grandchildren may hold the pipes open.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecPhase {
    Idle,
    Spawned,
    Running,
    Completed,
    TimedOut,
    SpawnFailed,
}

impl ExecPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecPhase::Completed | ExecPhase::TimedOut | ExecPhase::SpawnFailed)
    }
}

/// Captured result of a supervised subprocess.
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub phase: ExecPhase,
}

impl RawOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Parameters of a contract or resiliency run.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub base_url: String,
    pub boundary: bool,
    /// Overrides the configured test timeout.
    pub timeout: Option<Duration>,
}

/// A completed test run: captured output plus the report artifacts it produced.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub output: RawOutput,
    pub report_dir: PathBuf,
    /// Newest first; see [`discovery::discover`].
    pub discovered: Vec<DiscoveredReport>,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.output.success()
    }

    pub fn authoritative_report(&self) -> Option<&DiscoveredReport> {
        discovery::authoritative(&self.discovered)
    }
}

/// Drives engine subprocesses.
#[derive(Debug)]
pub struct ExecutionCoordinator {
    config: Arc<PilotConfig>,
    /// Held across snapshot, run, and re-snapshot when runs share one report directory.
    shared_reports: Mutex<()>,
}

impl ExecutionCoordinator {
    pub fn new(config: Arc<PilotConfig>) -> Self {
        Self {
            config,
            shared_reports: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PilotConfig {
        &self.config
    }

    /// Run a contract or resiliency test against `spec` and attribute fresh report artifacts to it.
    ///
    /// A non-zero exit is a normal outcome. Only launch failures and timeouts are errors.
    #[tracing::instrument(skip_all, fields(base_url = %request.base_url, boundary = request.boundary))]
    pub async fn run_test(&self, spec: &StagedSpec, request: &ExecutionRequest) -> PilotResult<ExecutionOutcome> {
        let (report_dir, _guard) = match self.config.report_layout {
            ReportLayout::PerRun => (discovery::allocate_run_dir(&self.config.report_root)?, None),
            ReportLayout::Shared => {
                let guard = self.shared_reports.lock().await;
                std::fs::create_dir_all(&self.config.report_root)
                    .map_err(|e| PilotError::io(&self.config.report_root, e))?;
                (self.config.report_root.clone(), Some(guard))
            }
        };

        let extension = self.config.report_extension.as_str();
        let before = discovery::snapshot(&report_dir, extension)?;
        let command = engine::build_command(
            &self.config,
            EngineMode::Test {
                spec: spec.path(),
                base_url: &request.base_url,
                report_dir: &report_dir,
                boundary: request.boundary,
            },
        )?;

        let limit = request.timeout.unwrap_or(self.config.test_timeout);
        let result = self.run_command(&command, limit).await;

        let discovered = match discovery::snapshot(&report_dir, extension) {
            Ok(after) => discovery::discover(&before, &after),
            Err(e) => {
                tracing::warn!(error = %e, "could not re-list report directory; continuing without artifacts");
                Vec::new()
            }
        };
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                if !discovered.is_empty() {
                    tracing::warn!(count = discovered.len(), "discarding reports from a run that did not complete");
                }
                return Err(e);
            }
        };

        tracing::info!(
            exit_code = ?output.exit_code,
            reports = discovered.len(),
            elapsed_ms = output.elapsed.as_millis() as u64,
            "test run finished"
        );
        Ok(ExecutionOutcome {
            output,
            report_dir,
            discovered,
        })
    }

    /// Run `command` to completion with stdout/stderr captured, terminating it if it exceeds `limit`.
    ///
    /// ## Errors
    /// - [`PilotError::SpawnFailure`] if the process cannot be launched.
    /// - [`PilotError::Timeout`] after the overrunning process has been terminated and reaped.
    #[tracing::instrument(skip_all, fields(program = %command.program_name(), limit_secs = limit.as_secs()))]
    pub async fn run_command(&self, command: &CommandSpec, limit: Duration) -> PilotResult<RawOutput> {
        let started = Instant::now();
        let mut phase = ExecPhase::Idle;

        let mut child = match ChildProcess::spawn_piped(command) {
            Ok(child) => child,
            Err(e) => {
                phase = advance(phase, ExecPhase::SpawnFailed);
                tracing::error!(?phase, error = %e, "engine launch failed");
                return Err(e);
            }
        };
        phase = advance(phase, ExecPhase::Spawned);

        let stdout_task = spawn_reader(child.take_stdout());
        let stderr_task = spawn_reader(child.take_stderr());
        phase = advance(phase, ExecPhase::Running);

        let status: ExitStatus = match tokio::time::timeout(limit, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                let _ = terminate_with_grace(&mut child, KILL_GRACE).await;
                return Err(PilotError::io(child.program(), e));
            }
            Err(_) => {
                phase = advance(phase, ExecPhase::TimedOut);
                let pid = child.id();
                tracing::warn!(?pid, ?phase, "engine exceeded its time limit; terminating");
                if !terminate_with_grace(&mut child, KILL_GRACE).await {
                    tracing::error!(?pid, "engine survived kill");
                }
                let _ = drain(stdout_task).await;
                let _ = drain(stderr_task).await;
                return Err(PilotError::Timeout { limit, pid });
            }
        };

        let stdout = drain(stdout_task).await;
        let stderr = drain(stderr_task).await;
        phase = advance(phase, ExecPhase::Completed);

        Ok(RawOutput {
            stdout,
            stderr,
            exit_code: status.code(),
            elapsed: started.elapsed(),
            phase,
        })
    }
}

fn advance(from: ExecPhase, to: ExecPhase) -> ExecPhase {
    debug_assert!(!from.is_terminal(), "phase {from:?} is terminal");
    tracing::trace!(?from, ?to, "phase");
    to
}

/// A pipe reader whose bytes stay reachable even if the task never finishes.
struct Capture {
    buf: Arc<SyncMutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

fn spawn_reader<R>(pipe: Option<R>) -> Capture
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buf = Arc::new(SyncMutex::new(Vec::new()));
    let sink = Arc::clone(&buf);
    let task = tokio::spawn(async move {
        let Some(mut pipe) = pipe else { return };
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let Ok(mut out) = sink.lock() else { break };
                    out.extend_from_slice(&chunk[..n]);
                }
            }
        }
    });
    Capture { buf, task }
}

/// Wait up to [`DRAIN_TIMEOUT`] for EOF, then return whatever was read. A reader still blocked on a pipe held
/// open by a grandchild is aborted.
async fn drain(mut capture: Capture) -> String {
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut capture.task).await.is_err() {
        tracing::debug!("output pipe still open after exit; keeping partial capture");
        capture.task.abort();
    }
    match capture.buf.lock() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
    }
}

/// The last `limit` bytes of `text`, cut on a char boundary.
pub fn tail_excerpt(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
