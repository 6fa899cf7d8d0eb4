//! Error kinds returned across the orchestrator boundary.
//!
//! Only conditions the caller must act on are errors. A failing test run (non-zero engine exit) and an
//! unparseable report are *not* errors: they degrade into a best-effort report instead.

use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Errors produced by staging, execution, the mock registry, and compatibility checks.
#[derive(Debug, Error, Diagnostic)]
pub enum PilotError {
    #[error("failed to launch engine '{program}': {source}")]
    #[diagnostic(
        code(specpilot::spawn_failure),
        help("check that the engine is installed and SPECPILOT_ENGINE points at it")
    )]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine did not finish within {}s and was terminated", .limit.as_secs())]
    #[diagnostic(code(specpilot::timeout))]
    Timeout { limit: Duration, pid: Option<u32> },

    #[error("port {port} is already in use by a mock server")]
    #[diagnostic(code(specpilot::port_conflict), help("stop the existing server first"))]
    PortConflict { port: u16 },

    #[error("no server running on port {port}")]
    #[diagnostic(code(specpilot::not_running))]
    NotRunning { port: u16 },

    #[error("mock server on port {port} exited during startup: {stderr}")]
    #[diagnostic(code(specpilot::start_failed))]
    StartFailed {
        port: u16,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("invalid input: {0}")]
    #[diagnostic(code(specpilot::invalid_input))]
    InvalidInput(String),

    #[error("{operation} is not available in this deployment")]
    #[diagnostic(
        code(specpilot::capability_disabled),
        help("set SPECPILOT_VCS_AVAILABLE=true when a version-controlled working tree is present")
    )]
    CapabilityDisabled { operation: &'static str },

    #[error("I/O error on {}: {source}", .path.display())]
    #[diagnostic(code(specpilot::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PilotError {
    pub fn invalid(message: impl Into<String>) -> Self {
        PilotError::InvalidInput(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PilotError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable code for the stdio protocol.
    pub fn code(&self) -> &'static str {
        match self {
            PilotError::SpawnFailure { .. } => "spawn_failure",
            PilotError::Timeout { .. } => "timeout",
            PilotError::PortConflict { .. } => "port_conflict",
            PilotError::NotRunning { .. } => "not_running",
            PilotError::StartFailed { .. } => "start_failed",
            PilotError::InvalidInput(_) => "invalid_input",
            PilotError::CapabilityDisabled { .. } => "capability_disabled",
            PilotError::Io { .. } => "io",
        }
    }
}

pub type PilotResult<T> = Result<T, PilotError>;
