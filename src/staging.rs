//! Spec staging: caller-supplied spec content written to an isolated, self-deleting temp directory.

use std::fs;
use std::path::{Path, PathBuf};

use specpilot_core::SpecFormat;
use tempfile::TempDir;

use crate::error::{PilotError, PilotResult};

const STAGING_PREFIX: &str = "specpilot-spec-";

/// A staged specification file.
///
/// The backing directory is unique to this value and is removed when it is dropped, on every exit path.
#[derive(Debug)]
pub struct StagedSpec {
    dir: TempDir,
    path: PathBuf,
    format: SpecFormat,
    content: String,
}

impl StagedSpec {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn format(&self) -> SpecFormat {
        self.format
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// A path next to the spec for per-invocation scratch files (e.g. captured server logs).
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Write `content` to `<unique dir>/spec.<ext>`.
///
/// ## Errors
/// - [`PilotError::InvalidInput`] for empty or whitespace-only content (nothing touches disk).
/// - [`PilotError::Io`] if the directory or file cannot be created.
#[tracing::instrument(skip(content), fields(content_len = content.len()))]
pub fn stage(content: &str, format: SpecFormat, staging_root: Option<&Path>) -> PilotResult<StagedSpec> {
    if content.trim().is_empty() {
        return Err(PilotError::invalid("spec content is empty"));
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix(STAGING_PREFIX);
    let dir = match staging_root {
        Some(root) => {
            fs::create_dir_all(root).map_err(|e| PilotError::io(root, e))?;
            builder.tempdir_in(root).map_err(|e| PilotError::io(root, e))?
        }
        None => builder
            .tempdir()
            .map_err(|e| PilotError::io(std::env::temp_dir(), e))?,
    };

    let path = dir.path().join(format!("spec.{}", format.extension()));
    fs::write(&path, content).map_err(|e| PilotError::io(&path, e))?;
    tracing::debug!(path = %path.display(), "staged spec");

    Ok(StagedSpec {
        dir,
        path,
        format,
        content: content.to_string(),
    })
}
