//! Pure parsers for everything the contract engine writes.
//!
//! The engine communicates its results in three ways, each with its own parser:
//! - [`junit`]: the structured JUnit-style XML report it may drop into a report directory,
//! - [`console`]: the free-form console text it always prints (degraded fallback),
//! - [`compat`]: the textual diff printed by its backward-compatibility mode.
//!
//! ## Notes
//! - Every function here is a pure function of its input text: no file or process access. Callers read the
//!   files; this crate only interprets them.
//! - Parse failures are ordinary `Err` values. Deciding to fall back is the caller's business.
//!
//! ## Examples
//! ```rust
//! use specpilot_report::{console, junit};
//!
//! let xml = r#"<testsuite name="api" tests="1" failures="0"><testcase name="GET /pets" classname="pets"/></testsuite>"#;
//! let report = junit::parse_junit(xml).unwrap();
//! assert_eq!(report.total, 1);
//!
//! let fallback = console::parse_console("Scenario GET /pets PASSED\n");
//! assert_eq!(fallback.total, 1);
//! ```

pub mod compat;
pub mod console;
pub mod junit;
pub mod xml;

use thiserror::Error;

/// Errors produced while interpreting a report artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportParseError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("report is empty")]
    Empty,

    #[error("unexpected root element <{0}>; expected <testsuite> or <testsuites>")]
    UnexpectedRoot(String),

    #[error("<testsuites> contains no <testsuite>")]
    MissingSuite,

    #[error("attribute '{attribute}' is not a count: '{value}'")]
    InvalidCount { attribute: &'static str, value: String },
}
