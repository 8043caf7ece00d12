//! Local backup artifacts.
//!
//! Naming follows `backup_<engine-tag>_<database>_<YYYYMMDD_HHMMSS>.<ext>`,
//! with `.gz` appended once the artifact is compressed. `ArtifactSet` owns
//! every local file a pipeline run creates and deletes them on all exit
//! paths.

use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use super::database::DatabaseType;
use crate::error::{PipelineError, PipelineResult};

/// Suffix marking a gzip-compressed artifact.
pub const COMPRESSED_SUFFIX: &str = ".gz";

/// Returns true if `name` carries the compressed-artifact suffix.
pub fn is_compressed(name: &str) -> bool {
    name.ends_with(COMPRESSED_SUFFIX)
}

/// A local file holding one backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub database: String,
    pub engine: DatabaseType,
    /// Creation time, second resolution.
    pub created_at: DateTime<Local>,
    pub compressed: bool,
}

impl BackupArtifact {
    /// Allocate a fresh artifact path in `work_dir` for a dump taken at `now`.
    ///
    /// Two runs in the same second would collide on the timestamp alone, so
    /// a `_<n>` counter is appended until the name is unused.
    pub fn allocate(
        work_dir: &Path,
        engine: DatabaseType,
        database: &str,
        now: DateTime<Local>,
    ) -> Self {
        let stem = format!(
            "backup_{}_{}_{}",
            engine.artifact_tag(),
            database,
            now.format("%Y%m%d_%H%M%S")
        );
        let ext = engine.artifact_extension();

        let mut path = work_dir.join(format!("{stem}.{ext}"));
        let mut counter = 1;
        while path.exists() || with_suffix(&path, COMPRESSED_SUFFIX).exists() {
            path = work_dir.join(format!("{stem}_{counter}.{ext}"));
            counter += 1;
        }

        Self {
            path,
            database: database.to_string(),
            engine,
            created_at: now,
            compressed: false,
        }
    }

    /// The same backup after it was compressed into `path`.
    pub fn into_compressed(self, path: PathBuf) -> Self {
        Self {
            path,
            compressed: true,
            ..self
        }
    }

    /// File name, used verbatim as the remote object name.
    pub fn file_name(&self) -> String {
        remote_name_for(&self.path)
    }
}

/// Reject a work directory at or below the root of a local storage backend.
///
/// Artifacts staged there share paths with stored objects, so cleanup
/// would delete the stored copy.
pub fn ensure_outside_storage(work_dir: &Path, storage_root: &Path) -> PipelineResult<()> {
    if resolve(work_dir).starts_with(resolve(storage_root)) {
        return Err(PipelineError::Configuration(format!(
            "work directory {} must not be inside the local storage root {}",
            work_dir.display(),
            storage_root.display()
        )));
    }
    Ok(())
}

/// Canonical form of `path`, resolving through its deepest existing
/// ancestor when the path itself does not exist yet.
fn resolve(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

/// Append `suffix` to the full file name of `path`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Remote object name derived from a local artifact path.
pub fn remote_name_for(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Scoped owner of the local files created during one pipeline run.
///
/// Files are deleted by `release`, by `cleanup`, or when the set is
/// dropped, whichever comes first. Files that are already gone are
/// ignored.
#[derive(Debug, Default)]
pub struct ArtifactSet {
    paths: Vec<PathBuf>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `path`.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Delete one tracked file now.
    pub fn release(&mut self, path: &Path) -> Result<()> {
        self.paths.retain(|p| p != path);
        remove_if_exists(path)
    }

    /// Paths still owned by this set.
    pub fn live(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every tracked file.
    ///
    /// Removal failures are logged and do not stop the remaining deletions.
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            if let Err(e) = remove_if_exists(&path) {
                tracing::warn!("Failed to remove local artifact {}: {:#}", path.display(), e);
            } else {
                tracing::debug!("Removed local artifact {}", path.display());
            }
        }
    }
}

impl Drop for ArtifactSet {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
