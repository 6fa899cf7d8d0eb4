#![no_main]

use libfuzzer_sys::fuzz_target;
use specpilot_report::{compat, console, junit};

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        // Engine artifacts are untrusted; none of these may panic.
        let _ = junit::parse_junit(s);
        let suite = console::parse_console(s);
        assert_eq!(suite.total as usize, suite.cases.len());
        let _ = compat::classify_changes(s);
    }
});
