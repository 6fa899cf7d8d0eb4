//! Engine command surface: argv-style command specs and the argument profile of each engine mode.
//!
//! Every subprocess the orchestrator launches is described by a [`CommandSpec`] built here, so the exact
//! spelling of engine flags lives in exactly one place.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::PilotConfig;
use crate::error::{PilotError, PilotResult};

/// Specification for a command to execute.
///
/// Arguments are discrete elements, never a shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    /// Environment overrides layered on top of the inherited environment.
    pub env: Vec<(OsString, OsString)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Look up an environment override by key.
    pub fn env_value(&self, key: &str) -> Option<&OsString> {
        self.env.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Build a `tokio::process::Command`. Stdio wiring is left to the caller.
    pub fn to_tokio_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// The engine modes the orchestrator drives.
#[derive(Debug, Clone, Copy)]
pub enum EngineMode<'a> {
    /// Contract test; `boundary` switches on resiliency (boundary-condition) generation.
    Test {
        spec: &'a Path,
        base_url: &'a str,
        report_dir: &'a Path,
        boundary: bool,
    },
    /// Long-running stub/mock server.
    Stub { spec: &'a Path, port: u16 },
    /// Backward-compatibility comparison against a committed baseline.
    Compatibility {
        target_path: Option<&'a str>,
        base_branch: Option<&'a str>,
        repo_dir: Option<&'a Path>,
    },
}

impl EngineMode<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            EngineMode::Test { boundary: false, .. } => "contract test",
            EngineMode::Test { boundary: true, .. } => "resiliency test",
            EngineMode::Stub { .. } => "stub",
            EngineMode::Compatibility { .. } => "compatibility check",
        }
    }
}

/// Build the full engine invocation for `mode` under `config`.
///
/// ## Errors
/// [`PilotError::InvalidInput`] if the configured engine command is empty.
pub fn build_command(config: &PilotConfig, mode: EngineMode<'_>) -> PilotResult<CommandSpec> {
    let (program, prefix) = config
        .engine_command
        .split_first()
        .ok_or_else(|| PilotError::invalid("engine command is empty"))?;
    let cmd = CommandSpec::new(program).args(prefix);
    let engine_path = |p: &Path| config.engine_path(p).into_os_string();

    let cmd = match mode {
        EngineMode::Test {
            spec,
            base_url,
            report_dir,
            boundary,
        } => {
            let mut report_arg = OsString::from("--junitReportDir=");
            report_arg.push(engine_path(report_dir));
            cmd.arg("test")
                .arg(engine_path(spec))
                .arg(format!("--testBaseURL={base_url}"))
                .arg(report_arg)
                .env(&config.boundary_env_var, if boundary { "true" } else { "false" })
        }
        EngineMode::Stub { spec, port } => cmd
            .arg("stub")
            .arg(engine_path(spec))
            .arg(format!("--port={port}")),
        EngineMode::Compatibility {
            target_path,
            base_branch,
            repo_dir,
        } => {
            let mut cmd = cmd.arg("backward-compatibility-check");
            if let Some(target) = target_path {
                let mut arg = OsString::from("--target-path=");
                arg.push(engine_path(Path::new(target)));
                cmd = cmd.arg(arg);
            }
            if let Some(branch) = base_branch {
                cmd = cmd.arg(format!("--base-branch={branch}"));
            }
            if let Some(repo) = repo_dir {
                let mut arg = OsString::from("--repo-dir=");
                arg.push(engine_path(repo));
                cmd = cmd.arg(arg).cwd(repo);
            }
            cmd
        }
    };
    Ok(cmd)
}
