//! Layering guardrails to keep the vocabulary and parser crates free of IO runtimes.
//!
//! `specpilot_core` and `specpilot_report` are pure: they must never pull in the async runtime or touch
//! processes. This test scans their manifests and fails if a runtime crate appears in `[dependencies]`.

const FORBIDDEN: &[&str] = &["tokio", "tempfile", "nix"];

fn dependency_names(manifest: &str) -> Vec<String> {
    let mut in_dependencies = false;
    let mut names = Vec::new();

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        // Track when we enter/exit the `[dependencies]` table.
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }

        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Strip inline comments for robustness.
        let line_no_comment = line.split('#').next().unwrap_or("").trim();
        if let Some((name, _)) = line_no_comment.split_once('=') {
            names.push(name.trim().to_string());
        }
    }
    names
}

fn assert_pure(crate_name: &str, manifest: &str) {
    for name in dependency_names(manifest) {
        assert!(
            !FORBIDDEN.contains(&name.as_str()),
            "`{name}` must not appear in {crate_name}'s [dependencies]; keep IO in the root crate"
        );
    }
}

#[test]
fn vocabulary_crate_has_no_runtime_dependencies() {
    assert_pure("specpilot_core", include_str!("../crates/specpilot_core/Cargo.toml"));
}

#[test]
fn parser_crate_has_no_runtime_dependencies() {
    assert_pure("specpilot_report", include_str!("../crates/specpilot_report/Cargo.toml"));
}

#[test]
fn scanner_sees_dependencies() {
    let names = dependency_names("[package]\nname = \"x\"\n\n[dependencies]\nserde = \"1\" # ser\n\n[dev-dependencies]\ntokio = \"1\"\n");
    assert_eq!(names, vec!["serde"]);
}
