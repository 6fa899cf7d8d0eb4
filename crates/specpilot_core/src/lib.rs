//! Provide the canonical report vocabulary for the specpilot orchestrator.
//!
//! This crate is intentionally small and dependency-light. It contains the data model that both:
//! - the parsers (`specpilot_report`) produce from engine artifacts and console text, and
//! - the orchestrator (`specpilot`) returns upward to its caller.
//!
//! ## Notes
//!
//! - This is a “vocabulary” crate: **no IO**, no async, no process handling.
//! - Every type is `serde`-serializable so the dispatch layer can hand reports over the wire unchanged.

pub mod compat;
pub mod format;
pub mod report;

pub use compat::{ChangeEntry, ChangeSeverity, CompatibilityReport};
pub use format::{SpecFormat, UnknownFormat};
pub use report::{CaseStatus, ReportSource, TestCase, TestSuiteReport};
