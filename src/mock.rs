//! Mock-server registry: long-running engine stub processes keyed by port.
//!
//! All mutations go through one async lock. [`MockRegistry::start`] claims its port with a `Starting` slot
//! under the lock and only re-takes it to commit, so the startup grace never blocks other ports or `list`.
//! The registry is an ordinary value owned by whoever constructs the orchestrator; dropping it kills every
//! server it still tracks.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use specpilot_core::SpecFormat;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::config::PilotConfig;
use crate::engine::{self, EngineMode};
use crate::error::{PilotError, PilotResult};
use crate::executor::tail_excerpt;
use crate::process::{ChildProcess, ProcessHandle, terminate_with_grace};
use crate::staging::{self, StagedSpec};

const STOP_GRACE: Duration = Duration::from_secs(5);
const LOG_FILE: &str = "mock.log";

/// A running mock server. Owns its process and the staged spec it serves.
#[derive(Debug)]
pub struct MockServerHandle {
    port: u16,
    url: String,
    started_at: SystemTime,
    process: Box<dyn ProcessHandle>,
    // Declared after `process` so the server is killed before its spec file is removed.
    spec: StagedSpec,
}

impl MockServerHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn info(&self) -> MockServerInfo {
        MockServerInfo {
            port: self.port,
            url: self.url.clone(),
            pid: self.process.id(),
            spec_path: self.spec.path().display().to_string(),
            started_at_ms: self
                .started_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        }
    }
}

/// Caller-facing view of a running mock server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MockServerInfo {
    pub port: u16,
    pub url: String,
    pub pid: Option<u32>,
    pub spec_path: String,
    pub started_at_ms: u64,
}

/// One port's registry slot.
#[derive(Debug)]
enum Slot {
    /// Claimed by a `start` still inside its startup grace.
    Starting,
    Running(MockServerHandle),
}

type Slots = BTreeMap<u16, Slot>;

/// Registry of running mock servers.
#[derive(Debug)]
pub struct MockRegistry {
    config: Arc<PilotConfig>,
    servers: Arc<Mutex<Slots>>,
}

impl MockRegistry {
    pub fn new(config: Arc<PilotConfig>) -> Self {
        Self {
            config,
            servers: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Stage `spec_content` and launch a stub server for it on `port`.
    ///
    /// The port is reserved under the lock, then the lock is released while the server proves it stays alive
    /// for the configured startup grace. Entries whose process already died are cleared first.
    ///
    /// ## Errors
    /// - [`PilotError::InvalidInput`] for port 0 or empty content.
    /// - [`PilotError::PortConflict`] if a live or starting server already owns `port`.
    /// - [`PilotError::SpawnFailure`] if the engine cannot be launched.
    /// - [`PilotError::StartFailed`] if it exits during the grace interval.
    #[tracing::instrument(skip(self, spec_content))]
    pub async fn start(&self, spec_content: &str, format: SpecFormat, port: u16) -> PilotResult<MockServerInfo> {
        if port == 0 {
            return Err(PilotError::invalid("port must be between 1 and 65535"));
        }

        let mut reservation = {
            let mut servers = self.servers.lock().await;
            sweep_dead(&mut servers);
            if servers.contains_key(&port) {
                return Err(PilotError::PortConflict { port });
            }
            servers.insert(port, Slot::Starting);
            Reservation {
                servers: Arc::clone(&self.servers),
                port,
                armed: true,
            }
        };

        let launched = self.launch(spec_content, format, port).await;

        let mut servers = self.servers.lock().await;
        reservation.armed = false;
        match launched {
            Ok(handle) => {
                let info = handle.info();
                servers.insert(port, Slot::Running(handle));
                tracing::info!(port, url = %info.url, pid = ?info.pid, "mock server started");
                Ok(info)
            }
            Err(e) => {
                servers.remove(&port);
                Err(e)
            }
        }
    }

    async fn launch(&self, spec_content: &str, format: SpecFormat, port: u16) -> PilotResult<MockServerHandle> {
        let spec = staging::stage(spec_content, format, self.config.staging_root.as_deref())?;
        let log_path = spec.scratch_path(LOG_FILE);
        let command = engine::build_command(
            &self.config,
            EngineMode::Stub {
                spec: spec.path(),
                port,
            },
        )?;
        let mut child = ChildProcess::spawn_logged(&command, &log_path)?;

        match tokio::time::timeout(self.config.mock_startup_grace, child.wait()).await {
            Ok(Ok(status)) => {
                let stderr = read_log_tail(&log_path, self.config.excerpt_limit);
                tracing::warn!(port, exit_code = ?status.code(), "mock server exited during startup");
                return Err(PilotError::StartFailed {
                    port,
                    exit_code: status.code(),
                    stderr,
                });
            }
            Ok(Err(e)) => return Err(PilotError::io(child.program(), e)),
            Err(_) => {}
        }

        Ok(MockServerHandle {
            port,
            url: format!("http://{}:{port}", self.config.mock_host),
            started_at: SystemTime::now(),
            process: Box::new(child),
            spec,
        })
    }

    /// Remove the server on `port` from the registry and terminate it.
    ///
    /// Termination completes in the background; the port is free for a new `start` immediately.
    ///
    /// ## Errors
    /// [`PilotError::NotRunning`] if no server is registered on `port`.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self, port: u16) -> PilotResult<MockServerInfo> {
        let handle = {
            let mut servers = self.servers.lock().await;
            // A `Starting` slot belongs to its `start` call and is not stoppable yet.
            if !matches!(servers.get(&port), Some(Slot::Running(_))) {
                return Err(PilotError::NotRunning { port });
            }
            match servers.remove(&port) {
                Some(Slot::Running(handle)) => handle,
                _ => return Err(PilotError::NotRunning { port }),
            }
        };
        let info = handle.info();
        tokio::spawn(retire(handle));
        tracing::info!(port, "mock server stopped");
        Ok(info)
    }

    /// Snapshot of registered servers, ordered by port. Does not probe liveness.
    pub async fn list(&self) -> Vec<MockServerInfo> {
        self.servers.lock().await.values().filter_map(running).map(MockServerHandle::info).collect()
    }

    /// Drop entries whose process has exited on its own. Returns the freed ports.
    pub async fn reap(&self) -> Vec<u16> {
        sweep_dead(&mut *self.servers.lock().await)
    }

    /// Terminate every registered server and wait for them to exit. Ports still starting stay reserved.
    pub async fn shutdown(&self) {
        let handles: Vec<MockServerHandle> = {
            let mut servers = self.servers.lock().await;
            let (starting, running): (Slots, Slots) =
                std::mem::take(&mut *servers).into_iter().partition(|(_, slot)| matches!(slot, Slot::Starting));
            *servers = starting;
            running
                .into_values()
                .filter_map(|slot| match slot {
                    Slot::Running(handle) => Some(handle),
                    Slot::Starting => None,
                })
                .collect()
        };
        if handles.is_empty() {
            return;
        }
        tracing::info!(count = handles.len(), "shutting down mock servers");
        let mut set = JoinSet::new();
        for handle in handles {
            set.spawn(retire(handle));
        }
        while set.join_next().await.is_some() {}
    }

    /// Number of running servers.
    pub async fn len(&self) -> usize {
        self.servers.lock().await.values().filter_map(running).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn running(slot: &Slot) -> Option<&MockServerHandle> {
    match slot {
        Slot::Running(handle) => Some(handle),
        Slot::Starting => None,
    }
}

fn sweep_dead(servers: &mut Slots) -> Vec<u16> {
    let dead: Vec<u16> = servers
        .iter_mut()
        .filter_map(|(port, slot)| match slot {
            Slot::Running(handle) => (!handle.process.is_alive()).then_some(*port),
            Slot::Starting => None,
        })
        .collect();
    for port in &dead {
        servers.remove(port);
        tracing::info!(port, "reaped exited mock server");
    }
    dead
}

/// Releases a `Starting` slot if its `start` call is dropped before it settles.
struct Reservation {
    servers: Arc<Mutex<Slots>>,
    port: u16,
    armed: bool,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let port = self.port;
        if let Ok(mut servers) = self.servers.try_lock() {
            release(&mut servers, port);
            return;
        }
        let servers = Arc::clone(&self.servers);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move { release(&mut *servers.lock().await, port) });
        }
    }
}

fn release(servers: &mut Slots, port: u16) {
    if matches!(servers.get(&port), Some(Slot::Starting)) {
        servers.remove(&port);
        tracing::debug!(port, "released abandoned port reservation");
    }
}

async fn retire(mut handle: MockServerHandle) {
    let port = handle.port;
    if !terminate_with_grace(handle.process.as_mut(), STOP_GRACE).await {
        tracing::error!(port, pid = ?handle.process.id(), "mock server did not exit");
    }
}

fn read_log_tail(path: &Path, limit: usize) -> String {
    match fs::read(path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            tail_excerpt(text.trim_end(), limit).to_string()
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no startup log");
            String::new()
        }
    }
}
