//! Restore pipeline: Fetch ─► Decompress? ─► Load ─► Cleanup.
//!
//! Restores send no notifications.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, Span};

use super::artifact::{ensure_outside_storage, is_compressed, ArtifactSet};
use super::compression;
use super::database::Database;
use super::storage::Storage;
use crate::error::{PipelineError, PipelineResult};

/// Loads a stored backup back into a database.
pub struct RestoreManager {
    database: Arc<dyn Database>,
    storage: Arc<dyn Storage>,
    work_dir: PathBuf,
    span: Span,
}

impl std::fmt::Debug for RestoreManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreManager")
            .field("engine", &self.database.engine())
            .field("storage", &self.storage.storage_type())
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl RestoreManager {
    /// Create a manager that stages downloads in `work_dir`.
    pub fn new(database: Arc<dyn Database>, storage: Arc<dyn Storage>, work_dir: PathBuf) -> Self {
        let span = tracing::info_span!(
            "restore",
            engine = database.engine().artifact_tag(),
            storage = storage.storage_type().scheme(),
        );
        Self {
            database,
            storage,
            work_dir,
            span,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Local path a remote object is fetched to: its last path component
    /// inside the work directory.
    fn local_path_for(&self, backup_name: &str) -> PipelineResult<PathBuf> {
        let file_name = Path::new(backup_name.trim_end_matches('/'))
            .file_name()
            .ok_or_else(|| {
                PipelineError::Configuration(format!("invalid backup name '{}'", backup_name))
            })?;
        Ok(self.work_dir.join(file_name))
    }

    /// Fetch `backup_name` from storage and load it into the database.
    ///
    /// Names ending in `.gz` are decompressed first.
    pub async fn perform_restore(&self, backup_name: &str) -> PipelineResult<()> {
        self.run(backup_name).instrument(self.span.clone()).await
    }

    async fn run(&self, backup_name: &str) -> PipelineResult<()> {
        tracing::info!("Starting restore from {}", backup_name);

        if let Some(root) = self.storage.local_root() {
            ensure_outside_storage(&self.work_dir, root)?;
        }
        let local = self.local_path_for(backup_name)?;
        let mut artifacts = ArtifactSet::new();

        let result = self.execute(backup_name, &local, &mut artifacts).await;
        match &result {
            Ok(()) => tracing::info!("Restore completed successfully"),
            Err(err) => tracing::error!(stage = err.stage(), "Restore failed: {}", err),
        }

        artifacts.cleanup();
        result
    }

    async fn execute(
        &self,
        backup_name: &str,
        local: &Path,
        artifacts: &mut ArtifactSet,
    ) -> PipelineResult<()> {
        artifacts.track(local);
        self.storage
            .download(backup_name, local)
            .await
            .map_err(PipelineError::download)?;
        tracing::info!("Downloaded {} to {}", backup_name, local.display());

        let restore_file = if is_compressed(backup_name) {
            let out = compression::decompress(local)
                .await
                .map_err(PipelineError::Decompression)?;
            artifacts.track(&out);
            tracing::info!("Decompressed to: {}", out.display());
            out
        } else {
            local.to_path_buf()
        };

        self.database
            .restore(&restore_file)
            .await
            .map_err(PipelineError::Load)
    }
}
