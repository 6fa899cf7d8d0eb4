//! Deployment configuration for the orchestrator.
//!
//! Everything that depends on where and how the engine runs (its command, report location, host path mapping,
//! timeouts) is injected through [`PilotConfig`] instead of being sniffed from the filesystem at runtime.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PilotError, PilotResult};

/// Environment variable names read by [`PilotConfig::from_env`].
pub mod env_keys {
    pub const ENGINE: &str = "SPECPILOT_ENGINE";
    pub const REPORT_DIR: &str = "SPECPILOT_REPORT_DIR";
    pub const REPORT_LAYOUT: &str = "SPECPILOT_REPORT_LAYOUT";
    pub const TEST_TIMEOUT_SECS: &str = "SPECPILOT_TEST_TIMEOUT_SECS";
    pub const COMPAT_TIMEOUT_SECS: &str = "SPECPILOT_COMPAT_TIMEOUT_SECS";
    pub const MOCK_GRACE_MS: &str = "SPECPILOT_MOCK_GRACE_MS";
    pub const MOCK_HOST: &str = "SPECPILOT_MOCK_HOST";
    pub const STAGING_DIR: &str = "SPECPILOT_STAGING_DIR";
    pub const VCS_AVAILABLE: &str = "SPECPILOT_VCS_AVAILABLE";
    pub const HOST_PATH_MAP: &str = "SPECPILOT_HOST_PATH_MAP";
}

/// Ceiling for a single contract or resiliency run.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// How long a freshly spawned mock must stay alive before it counts as started.
pub const DEFAULT_MOCK_GRACE: Duration = Duration::from_millis(2_000);
/// Bytes of stdout/stderr tail handed back to callers.
pub const DEFAULT_EXCERPT_LIMIT: usize = 4 * 1024;

/// How report artifacts are correlated with the run that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportLayout {
    /// Each run writes into its own fresh subdirectory of the report root.
    #[default]
    PerRun,
    /// All runs share the report root; the spawn-and-discover window is serialized.
    Shared,
}

impl FromStr for ReportLayout {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-run" | "per_run" | "perrun" => Ok(ReportLayout::PerRun),
            "shared" => Ok(ReportLayout::Shared),
            other => Err(PilotError::invalid(format!(
                "unknown report layout '{other}' (expected per-run or shared)"
            ))),
        }
    }
}

/// Rewrites local paths into the path the engine sees (e.g. a bind mount inside a container).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    pub local_prefix: PathBuf,
    pub engine_prefix: PathBuf,
}

impl PathMapping {
    pub fn new(local_prefix: impl Into<PathBuf>, engine_prefix: impl Into<PathBuf>) -> Self {
        Self {
            local_prefix: local_prefix.into(),
            engine_prefix: engine_prefix.into(),
        }
    }

    /// Map `path` if it lives under the local prefix; otherwise return it unchanged.
    pub fn to_engine(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.local_prefix) {
            Ok(rest) => self.engine_prefix.join(rest),
            Err(_) => path.to_path_buf(),
        }
    }
}

impl FromStr for PathMapping {
    type Err = PilotError;

    /// Parse `<local>=<engine>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (local, engine) = s
            .split_once('=')
            .ok_or_else(|| PilotError::invalid(format!("path mapping '{s}' must look like <local>=<engine>")))?;
        let (local, engine) = (local.trim(), engine.trim());
        if local.is_empty() || engine.is_empty() {
            return Err(PilotError::invalid(format!("path mapping '{s}' has an empty side")));
        }
        Ok(PathMapping::new(local, engine))
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct PilotConfig {
    /// Engine command prefix, e.g. `["specmatic"]` or `["java", "-jar", "specmatic.jar"]`.
    pub engine_command: Vec<String>,
    /// Directory the engine writes report artifacts into.
    pub report_root: PathBuf,
    pub report_layout: ReportLayout,
    /// Extension (without dot) of report artifacts.
    pub report_extension: String,
    /// Parent of per-invocation staging directories; `None` uses the OS temp dir.
    pub staging_root: Option<PathBuf>,
    pub test_timeout: Duration,
    pub compat_timeout: Duration,
    pub mock_startup_grace: Duration,
    /// Host used when deriving a mock's base URL.
    pub mock_host: String,
    /// Environment toggle that switches the engine into boundary/resiliency mode.
    pub boundary_env_var: String,
    /// Whether a version-controlled working tree is available (gates compatibility checks).
    pub vcs_available: bool,
    pub path_mapping: Option<PathMapping>,
    pub excerpt_limit: usize,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            engine_command: vec!["specmatic".to_string()],
            report_root: std::env::temp_dir().join("specpilot-reports"),
            report_layout: ReportLayout::PerRun,
            report_extension: "xml".to_string(),
            staging_root: None,
            test_timeout: DEFAULT_TEST_TIMEOUT,
            compat_timeout: DEFAULT_TEST_TIMEOUT,
            mock_startup_grace: DEFAULT_MOCK_GRACE,
            mock_host: "localhost".to_string(),
            boundary_env_var: "SPECMATIC_GENERATIVE_TESTS".to_string(),
            vcs_available: false,
            path_mapping: None,
            excerpt_limit: DEFAULT_EXCERPT_LIMIT,
        }
    }
}

impl PilotConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from the process environment.
    ///
    /// ## Errors
    /// [`PilotError::InvalidInput`] when a variable is set to an unparseable value.
    pub fn from_env() -> PilotResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, so tests need not touch the real environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PilotResult<Self> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(engine) = get(env_keys::ENGINE) {
            config = config.with_engine_command(engine.split_whitespace().map(str::to_string).collect());
        }
        if let Some(dir) = get(env_keys::REPORT_DIR) {
            config.report_root = PathBuf::from(dir);
        }
        if let Some(layout) = get(env_keys::REPORT_LAYOUT) {
            config.report_layout = layout.parse()?;
        }
        if let Some(secs) = get(env_keys::TEST_TIMEOUT_SECS) {
            config.test_timeout = Duration::from_secs(parse_number(env_keys::TEST_TIMEOUT_SECS, &secs)?);
        }
        if let Some(secs) = get(env_keys::COMPAT_TIMEOUT_SECS) {
            config.compat_timeout = Duration::from_secs(parse_number(env_keys::COMPAT_TIMEOUT_SECS, &secs)?);
        }
        if let Some(ms) = get(env_keys::MOCK_GRACE_MS) {
            config.mock_startup_grace = Duration::from_millis(parse_number(env_keys::MOCK_GRACE_MS, &ms)?);
        }
        if let Some(host) = get(env_keys::MOCK_HOST) {
            config.mock_host = host;
        }
        if let Some(dir) = get(env_keys::STAGING_DIR) {
            config.staging_root = Some(PathBuf::from(dir));
        }
        if let Some(flag) = get(env_keys::VCS_AVAILABLE) {
            config.vcs_available = parse_flag(env_keys::VCS_AVAILABLE, &flag)?;
        }
        if let Some(mapping) = get(env_keys::HOST_PATH_MAP) {
            config.path_mapping = Some(mapping.parse()?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot possibly work.
    pub fn validate(&self) -> PilotResult<()> {
        if self.engine_command.is_empty() {
            return Err(PilotError::invalid("engine command is empty"));
        }
        if self.test_timeout.is_zero() || self.compat_timeout.is_zero() {
            return Err(PilotError::invalid("timeouts must be greater than zero"));
        }
        if self.report_extension.is_empty() || self.report_extension.starts_with('.') {
            return Err(PilotError::invalid("report extension must be non-empty and given without a dot"));
        }
        Ok(())
    }

    pub fn with_engine_command(mut self, command: Vec<String>) -> Self {
        self.engine_command = command;
        self
    }

    pub fn with_report_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.report_root = root.into();
        self
    }

    pub fn with_report_layout(mut self, layout: ReportLayout) -> Self {
        self.report_layout = layout;
        self
    }

    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn with_compat_timeout(mut self, timeout: Duration) -> Self {
        self.compat_timeout = timeout;
        self
    }

    pub fn with_mock_startup_grace(mut self, grace: Duration) -> Self {
        self.mock_startup_grace = grace;
        self
    }

    pub fn with_vcs_available(mut self, available: bool) -> Self {
        self.vcs_available = available;
        self
    }

    pub fn with_path_mapping(mut self, mapping: PathMapping) -> Self {
        self.path_mapping = Some(mapping);
        self
    }

    /// Path as the engine will see it.
    pub fn engine_path(&self, path: &Path) -> PathBuf {
        match &self.path_mapping {
            Some(mapping) => mapping.to_engine(path),
            None => path.to_path_buf(),
        }
    }
}

fn parse_number(key: &str, raw: &str) -> PilotResult<u64> {
    raw.parse::<u64>()
        .map_err(|_| PilotError::invalid(format!("{key} must be a whole number, got '{raw}'")))
}

fn parse_flag(key: &str, raw: &str) -> PilotResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PilotError::invalid(format!("{key} must be true or false, got '{raw}'"))),
    }
}
