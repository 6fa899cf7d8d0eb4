//! JUnit-style report interpretation.
//!
//! ## Rules
//!
//! - The suite is either the root `<testsuite>` or the first `<testsuite>` under a `<testsuites>` wrapper.
//! - A `<testcase>` is Failed if it has a `<failure>` or `<error>` child, Skipped if it has `<skipped>`, else
//!   Passed. A failure's message is its `message` attribute, falling back to its text.
//! - Suite totals are the suite's *declared* counts. A count attribute that is absent is derived from the
//!   listed cases; one that is present but not a number is a parse error.

use specpilot_core::{CaseStatus, TestCase, TestSuiteReport};

use crate::ReportParseError;
use crate::xml::{self, Element};

const SUITES: &str = "testsuites";
const SUITE: &str = "testsuite";
const CASE: &str = "testcase";

/// Parse a JUnit-style XML report into the canonical suite model.
///
/// ## Errors
/// Any structural problem listed on [`ReportParseError`]. Callers are expected to treat these as
/// recoverable and fall back to console parsing.
#[tracing::instrument(skip_all, fields(input_len = input.len()))]
pub fn parse_junit(input: &str) -> Result<TestSuiteReport, ReportParseError> {
    let root = xml::parse_document(input)?;
    let suite = locate_suite(&root)?;

    let suite_name = suite.attr("name").unwrap_or(SUITE).to_string();
    let parsed: Vec<(TestCase, Option<Marker>)> =
        suite.children_named(CASE).map(|c| parse_case(c, &suite_name)).collect();
    let marked = |kind: Marker| count_u32(parsed.iter().filter(|(_, m)| *m == Some(kind)).count());
    let (failure_cases, error_cases) = (marked(Marker::Failure), marked(Marker::Error));
    let cases = parsed.into_iter().map(|(case, _)| case).collect();
    let counted = TestSuiteReport::from_cases(suite_name, cases, 0.0);

    let total = declared_count(suite, "tests")?.unwrap_or(counted.total);
    let failures = declared_count(suite, "failures")?.unwrap_or(failure_cases);
    let errors = declared_count(suite, "errors")?.unwrap_or(error_cases);
    let skipped = declared_count(suite, "skipped")?.unwrap_or(counted.skipped);
    let time_secs = suite.attr("time").and_then(parse_seconds).unwrap_or(0.0);

    Ok(TestSuiteReport {
        total,
        failures,
        errors,
        skipped,
        time_secs,
        ..counted
    })
}

fn locate_suite(root: &Element) -> Result<&Element, ReportParseError> {
    match root.name.as_str() {
        SUITE => Ok(root),
        SUITES => root.child(SUITE).ok_or(ReportParseError::MissingSuite),
        other => Err(ReportParseError::UnexpectedRoot(other.to_string())),
    }
}

/// Which child element made a case fail; `failures` and `errors` are declared separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Failure,
    Error,
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn parse_case(case: &Element, suite_name: &str) -> (TestCase, Option<Marker>) {
    let name = case.attr("name").filter(|n| !n.is_empty()).unwrap_or("(unnamed)");
    let class_name = case.attr("classname").filter(|n| !n.is_empty()).unwrap_or(suite_name);

    let marker = case
        .child("failure")
        .map(|m| (m, Marker::Failure))
        .or_else(|| case.child("error").map(|m| (m, Marker::Error)));
    if let Some((marker, kind)) = marker {
        let message = marker
            .attr("message")
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .or_else(|| Some(marker.text.trim()).filter(|t| !t.is_empty()))
            .map(str::to_string);
        let failed = TestCase {
            name: name.to_string(),
            class_name: class_name.to_string(),
            status: CaseStatus::Failed,
            failure_message: message,
            failure_type: marker.attr("type").map(str::to_string),
        };
        return (failed, Some(kind));
    }

    if case.child("skipped").is_some() {
        return (TestCase::skipped(name, class_name), None);
    }
    (TestCase::passed(name, class_name), None)
}

fn declared_count(suite: &Element, attribute: &'static str) -> Result<Option<u32>, ReportParseError> {
    let Some(raw) = suite.attr(attribute) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|_| ReportParseError::InvalidCount {
            attribute,
            value: raw.to_string(),
        })
}

/// Parse a `time` attribute; some engines emit thousands separators (`1,234.5`).
fn parse_seconds(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    match cleaned.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Some(secs),
        _ => {
            tracing::debug!(time = raw, "ignoring unparseable suite time");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
  <testsuite name="Contract Tests" tests="3" failures="1" errors="0" skipped="1" time="2.5">
    <testcase name="GET /products -> 200" classname="products"/>
    <testcase name="POST /products -> 201" classname="products">
      <failure message="Key named id was missing in RESPONSE.BODY" type="ContractError">stack</failure>
    </testcase>
    <testcase name="DELETE /products -> 204" classname="products"><skipped/></testcase>
  </testsuite>
  <testsuite name="Second" tests="9"/>
</testsuites>"#;

    #[test]
    fn test_wrapped_suite_takes_first() {
        let report = parse_junit(WRAPPED).unwrap();
        assert_eq!(report.name, "Contract Tests");
        assert_eq!((report.total, report.failures, report.errors, report.skipped), (3, 1, 0, 1));
        assert_eq!(report.passed(), 1);
        assert!((report.time_secs - 2.5).abs() < f64::EPSILON);
        assert_eq!(report.cases.len(), 3);
    }

    #[test]
    fn test_case_classification() {
        let report = parse_junit(WRAPPED).unwrap();
        let statuses: Vec<CaseStatus> = report.cases.iter().map(|c| c.status).collect();
        assert_eq!(statuses, vec![CaseStatus::Passed, CaseStatus::Failed, CaseStatus::Skipped]);

        let failed = &report.cases[1];
        assert_eq!(
            failed.failure_message.as_deref(),
            Some("Key named id was missing in RESPONSE.BODY")
        );
        assert_eq!(failed.failure_type.as_deref(), Some("ContractError"));
        assert_eq!(failed.class_name, "products");
    }

    #[test]
    fn test_bare_suite_root() {
        let xml = r#"<testsuite name="api" tests="1" failures="0"><testcase name="t" classname="c"/></testsuite>"#;
        let report = parse_junit(xml).unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn test_error_marker_uses_text_when_no_message() {
        let xml = r#"<testsuite tests="1" errors="1"><testcase name="t"><error>connection refused</error></testcase></testsuite>"#;
        let report = parse_junit(xml).unwrap();
        assert_eq!(report.name, "testsuite");
        assert_eq!(report.errors, 1);
        assert_eq!(report.failed(), 1);
        let case = &report.cases[0];
        assert_eq!(case.status, CaseStatus::Failed);
        assert_eq!(case.failure_message.as_deref(), Some("connection refused"));
        assert_eq!(case.class_name, "testsuite");
    }

    #[test]
    fn test_declared_totals_win_over_case_count() {
        // Truncated case list: the engine declared ten tests but listed one.
        let xml = r#"<testsuite name="s" tests="10" failures="4"><testcase name="only"/></testsuite>"#;
        let report = parse_junit(xml).unwrap();
        assert_eq!(report.total, 10);
        assert_eq!(report.failures, 4);
        assert_eq!(report.cases.len(), 1);
        assert!(report.is_truncated());
    }

    #[test]
    fn test_missing_counts_derived_from_cases() {
        let xml = r#"<testsuite name="s"><testcase name="a"/><testcase name="b"><failure/></testcase></testsuite>"#;
        let report = parse_junit(xml).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.failures, 1);
        assert_eq!(report.cases[1].failure_message, None);
    }

    #[test]
    fn test_undeclared_failures_do_not_double_count_errors() {
        let xml = r#"<testsuite name="s" tests="3" errors="1">
            <testcase name="a"><error message="refused"/></testcase>
            <testcase name="b"><failure message="mismatch"/></testcase>
            <testcase name="c"/>
        </testsuite>"#;
        let report = parse_junit(xml).unwrap();
        assert_eq!((report.failures, report.errors), (1, 1));
        assert_eq!(report.failed(), 2);
        assert_eq!(report.total, report.passed() + report.failed() + report.skipped);
    }

    #[test]
    fn test_missing_errors_derived_from_error_cases() {
        let xml = r#"<testsuite name="s"><testcase name="a"><error/></testcase><testcase name="b"/></testsuite>"#;
        let report = parse_junit(xml).unwrap();
        assert_eq!((report.total, report.failures, report.errors), (2, 0, 1));
        assert_eq!(report.failed(), 1);
        assert_eq!(report.passed(), 1);
    }

    #[test]
    fn test_invalid_count_is_error() {
        let xml = r#"<testsuite tests="many"/>"#;
        assert_eq!(
            parse_junit(xml),
            Err(ReportParseError::InvalidCount {
                attribute: "tests",
                value: "many".to_string()
            })
        );
    }

    #[test]
    fn test_unexpected_root() {
        assert_eq!(
            parse_junit("<html/>"),
            Err(ReportParseError::UnexpectedRoot("html".to_string()))
        );
    }

    #[test]
    fn test_empty_wrapper() {
        assert_eq!(parse_junit("<testsuites/>"), Err(ReportParseError::MissingSuite));
    }

    #[test]
    fn test_time_with_separator() {
        assert_eq!(parse_seconds("1,234.5"), Some(1234.5));
        assert_eq!(parse_seconds("-1"), None);
        assert_eq!(parse_seconds("soon"), None);
    }

    #[test]
    fn test_parsing_is_deterministic() {
        assert_eq!(parse_junit(WRAPPED), parse_junit(WRAPPED));
    }
}
