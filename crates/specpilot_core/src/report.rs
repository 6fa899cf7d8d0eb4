//! Test-suite report model.
//!
//! A [`TestSuiteReport`] is the single normalized shape every engine run is reduced to, whether the data came
//! from a structured report artifact or from the console-text fallback.

use serde::{Deserialize, Serialize};

/// Outcome of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

/// One test case as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    /// Owning class/group name (`classname` in the report).
    pub class_name: String,
    pub status: CaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<String>,
}

impl TestCase {
    pub fn passed(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            status: CaseStatus::Passed,
            failure_message: None,
            failure_type: None,
        }
    }

    pub fn failed(name: impl Into<String>, class_name: impl Into<String>, message: Option<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            status: CaseStatus::Failed,
            failure_message: message,
            failure_type: None,
        }
    }

    pub fn skipped(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            status: CaseStatus::Skipped,
            failure_message: None,
            failure_type: None,
        }
    }
}

/// Normalized suite-level report.
///
/// ## Notes
///
/// - Counts are the engine's *declared* totals. They may legitimately disagree with `cases.len()` when the
///   engine truncated its case list.
/// - `errors` are folded into [`TestSuiteReport::failed`] so that `total == passed + failed + skipped` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuiteReport {
    pub name: String,
    pub total: u32,
    pub failures: u32,
    pub errors: u32,
    pub skipped: u32,
    /// Elapsed time in seconds as declared by the engine.
    pub time_secs: f64,
    pub cases: Vec<TestCase>,
}

impl TestSuiteReport {
    /// Build a report whose counts are derived from its cases.
    ///
    /// Used where no declared totals exist (console fallback, reports missing count attributes).
    pub fn from_cases(name: impl Into<String>, cases: Vec<TestCase>, time_secs: f64) -> Self {
        let mut failures = 0;
        let mut skipped = 0;
        for case in &cases {
            match case.status {
                CaseStatus::Failed => failures += 1,
                CaseStatus::Skipped => skipped += 1,
                CaseStatus::Passed => {}
            }
        }
        Self {
            name: name.into(),
            total: u32::try_from(cases.len()).unwrap_or(u32::MAX),
            failures,
            errors: 0,
            skipped,
            time_secs,
            cases,
        }
    }

    /// An empty report, used when the engine produced nothing recognisable.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::from_cases(name, Vec::new(), 0.0)
    }

    /// Failures plus errors.
    pub fn failed(&self) -> u32 {
        self.failures.saturating_add(self.errors)
    }

    /// `total - failed - skipped`, saturating at zero.
    pub fn passed(&self) -> u32 {
        self.total.saturating_sub(self.failed()).saturating_sub(self.skipped)
    }

    /// Cases whose status is [`CaseStatus::Failed`], in report order.
    pub fn failed_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter().filter(|c| c.status == CaseStatus::Failed)
    }

    /// True when the declared totals and the listed cases disagree.
    pub fn is_truncated(&self) -> bool {
        usize::try_from(self.total).map_or(true, |total| total != self.cases.len())
    }
}

/// Where a [`TestSuiteReport`] came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportSource {
    /// Parsed from a structured report file written by the engine.
    Artifact { file: String },
    /// Reconstructed from console text because no usable artifact existed.
    ConsoleFallback,
}

impl ReportSource {
    pub fn label(&self) -> &str {
        match self {
            ReportSource::Artifact { .. } => "report artifact",
            ReportSource::ConsoleFallback => "console output",
        }
    }
}
