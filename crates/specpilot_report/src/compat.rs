//! Best-effort change extraction from backward-compatibility output.
//!
//! Only lines that open with an explicit marker produce a change entry; everything else is context. The verdict
//! itself never comes from here, it comes from the exit status.

use specpilot_core::{ChangeEntry, ChangeSeverity};

const BREAKING_MARKERS: &[&str] = &["[breaking]", "breaking:", "breaking change", "(incompatible)", "incompatible:"];
const WARNING_MARKERS: &[&str] = &["[warning]", "warning:", "warn:", "(untested)"];
const INFO_MARKERS: &[&str] = &["[info]", "info:", "note:"];

/// Classify one output line by its leading marker. Bullets (`-`, `*`, `>`) and list numbering are ignored.
pub fn classify_line(line: &str) -> Option<ChangeSeverity> {
    let body = strip_bullet(line.trim()).to_lowercase();
    let opens_with = |markers: &[&str]| markers.iter().any(|m| body.starts_with(m));

    if opens_with(BREAKING_MARKERS) {
        Some(ChangeSeverity::Breaking)
    } else if opens_with(WARNING_MARKERS) {
        Some(ChangeSeverity::Warning)
    } else if opens_with(INFO_MARKERS) {
        Some(ChangeSeverity::Info)
    } else {
        None
    }
}

/// Extract every marked line from the engine's output, in order.
pub fn classify_changes(output: &str) -> Vec<ChangeEntry> {
    output
        .lines()
        .filter_map(|raw| {
            let severity = classify_line(raw)?;
            Some(ChangeEntry {
                severity,
                message: raw.trim().to_string(),
            })
        })
        .collect()
}

fn strip_bullet(line: &str) -> &str {
    let without_marks = line.trim_start_matches(['-', '*', '>', ' ']);
    let digits = without_marks.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && without_marks[digits..].starts_with(['.', ')']) {
        without_marks[digits + 1..].trim_start()
    } else {
        without_marks
    }
}
