//! Heuristic console-text fallback.
//!
//! Used only when no report artifact exists or it could not be parsed. The engine's console grammar is not a
//! stable contract, so this is a degraded mode: one case per line that carries a definitive pass/fail token,
//! totals equal to the number of matched lines, nothing else inferred.

use specpilot_core::{CaseStatus, TestCase, TestSuiteReport};

/// Suite name given to reports reconstructed from console text.
pub const CONSOLE_SUITE_NAME: &str = "console-output";

const FAIL_WORDS: &[&str] = &["FAILED", "FAIL"];
const PASS_WORDS: &[&str] = &["PASSED", "SUCCEEDED", "PASS"];
const FAIL_MARK: char = '✗';
const PASS_MARK: char = '✓';

/// Classify one console line. Tokens are case-sensitive whole words; a line carrying both a failure and a
/// pass token counts as a failure.
pub fn classify_line(line: &str) -> Option<CaseStatus> {
    let has_word = |words: &[&str]| {
        line.split(|c: char| !c.is_alphanumeric())
            .any(|w| words.contains(&w))
    };

    if line.contains(FAIL_MARK) || has_word(FAIL_WORDS) {
        Some(CaseStatus::Failed)
    } else if line.contains(PASS_MARK) || has_word(PASS_WORDS) {
        Some(CaseStatus::Passed)
    } else {
        None
    }
}

/// Reconstruct a suite report from captured stdout.
#[tracing::instrument(skip_all, fields(stdout_len = stdout.len()))]
pub fn parse_console(stdout: &str) -> TestSuiteReport {
    let cases: Vec<TestCase> = stdout
        .lines()
        .filter_map(|raw| {
            let line = raw.trim();
            match classify_line(line)? {
                CaseStatus::Failed => Some(TestCase::failed(line, CONSOLE_SUITE_NAME, Some(line.to_string()))),
                _ => Some(TestCase::passed(line, CONSOLE_SUITE_NAME)),
            }
        })
        .collect();

    tracing::debug!(matched = cases.len(), "console fallback matched lines");
    TestSuiteReport::from_cases(CONSOLE_SUITE_NAME, cases, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tokens() {
        assert_eq!(classify_line("Scenario: GET /pets has SUCCEEDED"), Some(CaseStatus::Passed));
        assert_eq!(classify_line("Scenario: GET /pets has FAILED"), Some(CaseStatus::Failed));
        assert_eq!(classify_line("  ✓ GET /pets"), Some(CaseStatus::Passed));
        assert_eq!(classify_line("  ✗ POST /pets"), Some(CaseStatus::Failed));
        assert_eq!(classify_line("[PASS] list"), Some(CaseStatus::Passed));
    }

    #[test]
    fn test_classify_requires_whole_case_sensitive_words() {
        assert_eq!(classify_line("Tests run: 3, Successes: 2, Failures: 1"), None);
        assert_eq!(classify_line("failed to connect"), None);
        assert_eq!(classify_line("PASSWORD field missing"), None);
        assert_eq!(classify_line(""), None);
    }

    #[test]
    fn test_fail_wins_over_pass() {
        assert_eq!(classify_line("PASSED then FAILED"), Some(CaseStatus::Failed));
    }

    #[test]
    fn test_parse_console_counts_matched_lines() {
        let stdout = "Loading spec\n  GET /a PASSED  \nPOST /b FAILED: missing field id\nTests run: 2\n";
        let report = parse_console(stdout);
        assert_eq!(report.name, CONSOLE_SUITE_NAME);
        assert_eq!(report.total, 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.passed(), 1);
        assert_eq!(report.cases[0].name, "GET /a PASSED");
        assert_eq!(
            report.cases[1].failure_message.as_deref(),
            Some("POST /b FAILED: missing field id")
        );
    }

    #[test]
    fn test_parse_console_without_tokens_is_empty() {
        let report = parse_console("Exception in thread main\njava.lang.NullPointerException\n");
        assert_eq!(report.total, 0);
        assert!(report.cases.is_empty());
    }
}
