//! Report artifact discovery.
//!
//! A run's report is identified by diffing the report directory before and after the engine runs. Only
//! files that did not exist in the "before" snapshot are attributed to the run; a pre-existing file is never
//! re-used, even if the engine overwrote it.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{PilotError, PilotResult};

/// File names (with modification times) of report artifacts present in a directory at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSnapshot {
    dir: PathBuf,
    files: BTreeMap<String, SystemTime>,
}

impl ReportSnapshot {
    /// Build a snapshot from known entries, without touching the filesystem.
    pub fn from_entries(dir: impl Into<PathBuf>, entries: impl IntoIterator<Item = (String, SystemTime)>) -> Self {
        Self {
            dir: dir.into(),
            files: entries.into_iter().collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

/// A report artifact attributed to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredReport {
    pub path: PathBuf,
    pub file_name: String,
    pub modified: SystemTime,
}

/// Enumerate regular files in `dir` whose extension matches `extension` (case-insensitive).
///
/// A missing directory is an empty snapshot, not an error: the engine may create it itself.
pub fn snapshot(dir: &Path, extension: &str) -> PilotResult<ReportSnapshot> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(ReportSnapshot::from_entries(dir, []));
        }
        Err(e) => return Err(PilotError::io(dir, e)),
    };

    let mut files = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| PilotError::io(dir, e))?;
        let path = entry.path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !matches_ext {
            continue;
        }
        // Entries can vanish between read_dir and metadata; skip them.
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.insert(name.to_string(), modified);
    }
    Ok(ReportSnapshot {
        dir: dir.to_path_buf(),
        files,
    })
}

/// Files present in `after` but not in `before`, most recently modified first (ties broken by name).
pub fn discover(before: &ReportSnapshot, after: &ReportSnapshot) -> Vec<DiscoveredReport> {
    let mut found: Vec<DiscoveredReport> = after
        .files
        .iter()
        .filter(|(name, _)| !before.contains(name))
        .map(|(name, modified)| DiscoveredReport {
            path: after.dir.join(name),
            file_name: name.clone(),
            modified: *modified,
        })
        .collect();
    found.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.file_name.cmp(&b.file_name)));
    found
}

/// The report to parse when a run produced several: the first of [`discover`]'s ordering.
pub fn authoritative(discovered: &[DiscoveredReport]) -> Option<&DiscoveredReport> {
    discovered.first()
}

/// Create a fresh, uniquely named run directory under `root`.
///
/// The directory is kept after the call; report artifacts outlive the run that produced them.
pub fn allocate_run_dir(root: &Path) -> PilotResult<PathBuf> {
    fs::create_dir_all(root).map_err(|e| PilotError::io(root, e))?;
    let dir = tempfile::Builder::new()
        .prefix("run-")
        .tempdir_in(root)
        .map_err(|e| PilotError::io(root, e))?;
    Ok(dir.keep())
}
