//! Backup pipeline.
//!
//! A run walks through these states in order, each awaited to completion
//! before the next begins:
//!
//! ```text
//! Verify ─► Extract ─► Compress? ─► Transfer ─► Notify ─► Cleanup
//!   │          │           │            │                   ▲
//!   └──────────┴───────────┴────────────┴──► Notify ────────┘
//! ```
//!
//! Cleanup runs on every path. Every local artifact is owned by an
//! [`ArtifactSet`] that deletes it when the run ends, however it ends.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, Span};

use super::artifact::{ensure_outside_storage, ArtifactSet};
use super::compression;
use super::database::Database;
use super::notifier::Notifier;
use super::storage::Storage;
use crate::config::BackupConfig;
use crate::error::{PipelineError, PipelineResult};

/// Outcome of a successful backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Name of the object written to storage.
    pub remote_name: String,
    pub elapsed: Duration,
    pub compressed: bool,
}

/// Orchestrates one database, one storage backend and an optional notifier.
pub struct BackupManager {
    database: Arc<dyn Database>,
    storage: Arc<dyn Storage>,
    notifier: Option<Arc<dyn Notifier>>,
    config: BackupConfig,
    span: Span,
}

impl std::fmt::Debug for BackupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupManager")
            .field("engine", &self.database.engine())
            .field("storage", &self.storage.storage_type())
            .field("notifier", &self.notifier.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl BackupManager {
    /// Create a manager. Without a notifier no messages are sent.
    pub fn new(
        database: Arc<dyn Database>,
        storage: Arc<dyn Storage>,
        notifier: Option<Arc<dyn Notifier>>,
        config: BackupConfig,
    ) -> Self {
        let span = tracing::info_span!(
            "backup",
            engine = database.engine().artifact_tag(),
            storage = storage.storage_type().scheme(),
        );
        Self {
            database,
            storage,
            notifier,
            config,
            span,
        }
    }

    /// Use `span` as the parent of everything this manager logs.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Run the backup pipeline once.
    ///
    /// Exactly one notification is attempted per run: the success message,
    /// or the failure message for the stage that failed. A compression
    /// failure is only announced when `notify_on_compression_failure` is
    /// set.
    pub async fn perform_backup(&self) -> PipelineResult<BackupReport> {
        self.run().instrument(self.span.clone()).await
    }

    async fn run(&self) -> PipelineResult<BackupReport> {
        let started = Instant::now();
        tracing::info!("Starting backup");

        let mut artifacts = ArtifactSet::new();
        let result = self.execute(&mut artifacts, started).await;

        match &result {
            Ok(report) => {
                let message = format!(
                    "Backup completed successfully in {:.2?}. File: {}",
                    report.elapsed, report.remote_name
                );
                tracing::info!("{}", message);
                self.notify(&message).await;
            }
            Err(err) => {
                tracing::error!(stage = err.stage(), "Backup failed: {}", err);
                if self.announces_failure(err) {
                    self.notify(&format!("Backup failed: {}", err)).await;
                }
            }
        }

        artifacts.cleanup();
        result
    }

    async fn execute(
        &self,
        artifacts: &mut ArtifactSet,
        started: Instant,
    ) -> PipelineResult<BackupReport> {
        if let Some(root) = self.storage.local_root() {
            ensure_outside_storage(&self.config.work_dir, root)?;
        }

        self.database
            .test_connection()
            .await
            .map_err(PipelineError::Connection)?;
        tracing::debug!("Database connection verified");

        let artifact = self
            .database
            .backup(self.config.kind)
            .await
            .map_err(PipelineError::Extraction)?;
        artifacts.track(&artifact.path);
        tracing::info!(
            database = %artifact.database,
            created_at = %artifact.created_at.format("%Y-%m-%d %H:%M:%S"),
            "Database backup created: {}",
            artifact.path.display()
        );

        let artifact = if self.config.compression {
            let gz = compression::compress(&artifact.path)
                .await
                .map_err(PipelineError::Compression)?;
            artifacts.track(&gz);
            if let Err(e) = artifacts.release(&artifact.path) {
                tracing::warn!("Failed to remove {}: {:#}", artifact.path.display(), e);
            }
            tracing::info!("Backup compressed: {}", gz.display());
            artifact.into_compressed(gz)
        } else {
            artifact
        };

        let remote_name = artifact.file_name();
        self.storage
            .upload(&artifact.path, &remote_name)
            .await
            .map_err(PipelineError::upload)?;

        Ok(BackupReport {
            remote_name,
            elapsed: started.elapsed(),
            compressed: artifact.compressed,
        })
    }

    fn announces_failure(&self, err: &PipelineError) -> bool {
        match err {
            PipelineError::Compression(_) => self.config.notify_on_compression_failure,
            _ => true,
        }
    }

    async fn notify(&self, message: &str) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if let Err(e) = notifier.notify(message).await {
            tracing::warn!("Failed to send notification: {:#}", e);
        }
    }
}
