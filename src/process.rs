//! Process handles.
//!
//! The coordinator and the mock registry only ever talk to a spawned engine through [`ProcessHandle`]
//! (`signal`, `is_alive`, `id`), so neither depends on the platform's process primitives directly.
//!
//! On Unix each engine is placed in its own process group and signals go to the whole group: engines are
//! commonly launched through wrapper scripts, and signalling only the wrapper would orphan the real server.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout};

use crate::engine::CommandSpec;
use crate::error::{PilotError, PilotResult};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Polite shutdown request (SIGTERM on Unix).
    Terminate,
    /// Forced kill.
    Kill,
}

/// Minimal control surface over a running process.
pub trait ProcessHandle: Send + Sync + fmt::Debug {
    fn id(&self) -> Option<u32>;

    /// Non-blocking liveness probe. Reaps the process if it has exited.
    fn is_alive(&mut self) -> bool;

    /// Deliver `signal`. Signalling a process that already exited is not an error.
    fn signal(&mut self, signal: Signal) -> io::Result<()>;
}

/// Terminate `handle`: [`Signal::Terminate`], wait up to `grace` for it to exit, then [`Signal::Kill`].
///
/// Returns `true` once the process is confirmed gone.
pub async fn terminate_with_grace(handle: &mut dyn ProcessHandle, grace: Duration) -> bool {
    if let Err(e) = handle.signal(Signal::Terminate) {
        tracing::warn!(pid = ?handle.id(), error = %e, "terminate signal failed");
    }
    if wait_until_dead(handle, grace).await {
        return true;
    }
    tracing::warn!(pid = ?handle.id(), "process ignored terminate; killing");
    if let Err(e) = handle.signal(Signal::Kill) {
        tracing::warn!(pid = ?handle.id(), error = %e, "kill signal failed");
    }
    wait_until_dead(handle, grace).await
}

async fn wait_until_dead(handle: &mut dyn ProcessHandle, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if !handle.is_alive() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// A spawned engine subprocess.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    pid: Option<u32>,
    program: String,
}

impl ChildProcess {
    /// Spawn with stdout/stderr piped for capture.
    pub fn spawn_piped(spec: &CommandSpec) -> PilotResult<Self> {
        Self::spawn_with(spec, Stdio::piped(), Stdio::piped())
    }

    /// Spawn with stdout and stderr appended to `log_path`.
    ///
    /// Long-lived servers must not write into pipes nobody drains.
    pub fn spawn_logged(spec: &CommandSpec, log_path: &Path) -> PilotResult<Self> {
        let log = File::create(log_path).map_err(|e| PilotError::io(log_path, e))?;
        let log_err = log.try_clone().map_err(|e| PilotError::io(log_path, e))?;
        Self::spawn_with(spec, Stdio::from(log), Stdio::from(log_err))
    }

    fn spawn_with(spec: &CommandSpec, stdout: Stdio, stderr: Stdio) -> PilotResult<Self> {
        let mut command = spec.to_tokio_command();
        command
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let program = spec.program_name();
        let child = command.spawn().map_err(|source| PilotError::SpawnFailure {
            program: program.clone(),
            source,
        })?;
        let pid = child.id();
        tracing::debug!(?pid, command = %spec, "spawned engine");
        Ok(Self { child, pid, program })
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Wait for exit. Cancel-safe, so it can sit under `tokio::time::timeout`.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Exit status if the process has already finished.
    pub fn try_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }
}

impl ProcessHandle for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn signal(&mut self, signal: Signal) -> io::Result<()> {
        if !self.is_alive() {
            return Ok(());
        }
        match self.pid {
            Some(pid) => deliver(&mut self.child, pid, signal),
            None => Ok(()),
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.signal(Signal::Kill);
        }
    }
}

#[cfg(unix)]
fn deliver(_child: &mut Child, pid: u32, signal: Signal) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal as NixSignal, killpg};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| io::Error::other(format!("pid {pid} out of range")))?;
    let sig = match signal {
        Signal::Terminate => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };
    match killpg(Pid::from_raw(raw), sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(not(unix))]
fn deliver(child: &mut Child, _pid: u32, _signal: Signal) -> io::Result<()> {
    child.start_kill()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_spawn_failure_is_distinct() {
        let err = ChildProcess::spawn_piped(&CommandSpec::new("/definitely/not/an/engine")).unwrap_err();
        assert!(matches!(err, PilotError::SpawnFailure { .. }));
    }

    #[tokio::test]
    async fn test_liveness_and_terminate() {
        let mut child = ChildProcess::spawn_piped(&sh("sleep 30")).unwrap();
        assert!(child.id().is_some());
        assert!(child.is_alive());

        assert!(terminate_with_grace(&mut child, Duration::from_secs(5)).await);
        assert!(!child.is_alive());
        // Signalling a dead process is a no-op.
        assert!(child.signal(Signal::Terminate).is_ok());
    }

    #[tokio::test]
    async fn test_kill_after_ignored_terminate() {
        let mut child = ChildProcess::spawn_piped(&sh("trap '' TERM; sleep 30")).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(terminate_with_grace(&mut child, Duration::from_millis(300)).await);
    }

    #[tokio::test]
    async fn test_logged_spawn_writes_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let mut child = ChildProcess::spawn_logged(&sh("echo hello; echo oops >&2"), &log).unwrap();
        let status = child.wait().await.unwrap();
        assert!(status.success());
        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("hello"));
        assert!(text.contains("oops"));
    }
}
