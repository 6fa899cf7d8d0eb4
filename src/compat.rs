//! Backward-compatibility checks against a committed baseline.

use std::path::PathBuf;
use std::sync::Arc;

use specpilot_core::CompatibilityReport;
use specpilot_report::compat::classify_changes;

use crate::engine::{self, EngineMode};
use crate::error::{PilotError, PilotResult};
use crate::executor::ExecutionCoordinator;

/// Inputs of a compatibility check. All fields are optional; the engine falls back to its own defaults.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityRequest {
    /// Spec file (relative to the repository) to compare.
    pub target_path: Option<String>,
    /// Baseline branch.
    pub base_branch: Option<String>,
    /// Working tree to run in.
    pub repo_dir: Option<PathBuf>,
}

/// Runs the engine's compatibility mode and classifies what it reports.
#[derive(Debug, Clone)]
pub struct CompatibilityChecker {
    coordinator: Arc<ExecutionCoordinator>,
}

impl CompatibilityChecker {
    pub fn new(coordinator: Arc<ExecutionCoordinator>) -> Self {
        Self { coordinator }
    }

    /// ## Errors
    /// - [`PilotError::CapabilityDisabled`] unless a version-controlled tree is configured as available.
    /// - [`PilotError::InvalidInput`] for a blank path/branch, a branch that looks like a flag, or a
    ///   `repo_dir` that is not a directory.
    /// - [`PilotError::SpawnFailure`] / [`PilotError::Timeout`] from execution.
    #[tracing::instrument(skip_all, fields(target = ?request.target_path, base = ?request.base_branch))]
    pub async fn check(&self, request: &CompatibilityRequest) -> PilotResult<CompatibilityReport> {
        let config = self.coordinator.config();
        if !config.vcs_available {
            return Err(PilotError::CapabilityDisabled {
                operation: "compatibility check",
            });
        }
        validate(request)?;

        let command = engine::build_command(
            config,
            EngineMode::Compatibility {
                target_path: request.target_path.as_deref(),
                base_branch: request.base_branch.as_deref(),
                repo_dir: request.repo_dir.as_deref(),
            },
        )?;
        let output = self.coordinator.run_command(&command, config.compat_timeout).await?;

        let mut changes = classify_changes(&output.stdout);
        changes.extend(classify_changes(&output.stderr));
        let report = CompatibilityReport::new(request.target_path.clone(), output.exit_code, changes);
        tracing::info!(
            compatible = report.compatible,
            breaking = report.breaking,
            warnings = report.warnings,
            "compatibility check finished"
        );
        Ok(report)
    }
}

fn validate(request: &CompatibilityRequest) -> PilotResult<()> {
    if request.target_path.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(PilotError::invalid("target_path is empty"));
    }
    if let Some(branch) = &request.base_branch {
        let branch = branch.trim();
        if branch.is_empty() {
            return Err(PilotError::invalid("base_branch is empty"));
        }
        if branch.starts_with('-') || branch.chars().any(char::is_whitespace) {
            return Err(PilotError::invalid(format!("base_branch '{branch}' is not a branch name")));
        }
    }
    if let Some(repo) = &request.repo_dir {
        if !repo.is_dir() {
            return Err(PilotError::invalid(format!(
                "repo_dir {} is not a directory",
                repo.display()
            )));
        }
    }
    Ok(())
}
