//! Backward-compatibility report model.

use serde::{Deserialize, Serialize};

/// Severity attached to one detected specification change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSeverity {
    Breaking,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub severity: ChangeSeverity,
    pub message: String,
}

/// Result of comparing the working-tree spec against a committed baseline.
///
/// `compatible` comes from the engine's exit status alone; `changes` is a best-effort reading of its output
/// and may be empty even when incompatible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_path: Option<String>,
    pub compatible: bool,
    pub exit_code: Option<i32>,
    pub changes: Vec<ChangeEntry>,
    pub breaking: u32,
    pub warnings: u32,
    pub info: u32,
}

impl CompatibilityReport {
    pub fn new(analyzed_path: Option<String>, exit_code: Option<i32>, changes: Vec<ChangeEntry>) -> Self {
        let count = |severity| {
            let n = changes.iter().filter(|c| c.severity == severity).count();
            u32::try_from(n).unwrap_or(u32::MAX)
        };
        let (breaking, warnings, info) = (
            count(ChangeSeverity::Breaking),
            count(ChangeSeverity::Warning),
            count(ChangeSeverity::Info),
        );
        Self {
            analyzed_path,
            compatible: exit_code == Some(0),
            exit_code,
            changes,
            breaking,
            warnings,
            info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(severity: ChangeSeverity, message: &str) -> ChangeEntry {
        ChangeEntry {
            severity,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_counts_by_severity() {
        let report = CompatibilityReport::new(
            Some("api.yaml".into()),
            Some(1),
            vec![
                entry(ChangeSeverity::Breaking, "removed /pets"),
                entry(ChangeSeverity::Warning, "deprecated field"),
                entry(ChangeSeverity::Breaking, "required param added"),
                entry(ChangeSeverity::Info, "description changed"),
            ],
        );
        assert!(!report.compatible);
        assert_eq!((report.breaking, report.warnings, report.info), (2, 1, 1));
    }

    #[test]
    fn test_zero_exit_without_changes_is_compatible() {
        let report = CompatibilityReport::new(None, Some(0), Vec::new());
        assert!(report.compatible);
        assert!(report.changes.is_empty());
    }

    #[test]
    fn test_missing_exit_code_is_incompatible() {
        let report = CompatibilityReport::new(None, None, Vec::new());
        assert!(!report.compatible);
    }
}
