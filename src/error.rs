//! Pipeline error taxonomy.
//!
//! Adapters report failures as `anyhow::Error`. The managers wrap them into
//! a `PipelineError` naming the stage that failed, so callers can tell a
//! bad connection apart from a failed upload without parsing messages.

use thiserror::Error;

/// Error returned by a backup or restore run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The engine is unreachable or rejected the credentials.
    #[error("database connection failed: {0:#}")]
    Connection(anyhow::Error),

    /// The dump tool or driver failed while producing the artifact.
    #[error("database backup failed: {0:#}")]
    Extraction(anyhow::Error),

    #[error("compression failed: {0:#}")]
    Compression(anyhow::Error),

    #[error("decompression failed: {0:#}")]
    Decompression(anyhow::Error),

    /// Upload to or download from the storage backend failed.
    #[error("{direction} storage failed: {cause:#}")]
    Transfer {
        direction: TransferDirection,
        cause: anyhow::Error,
    },

    /// The restore tool or driver failed while loading the artifact.
    #[error("database restore failed: {0:#}")]
    Load(anyhow::Error),

    /// An unsupported engine or backend was selected, or the configuration
    /// is otherwise unusable.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Which way a failed transfer was going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Upload,
    Download,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload => write!(f, "upload to"),
            Self::Download => write!(f, "download from"),
        }
    }
}

impl PipelineError {
    pub fn upload(cause: anyhow::Error) -> Self {
        Self::Transfer {
            direction: TransferDirection::Upload,
            cause,
        }
    }

    pub fn download(cause: anyhow::Error) -> Self {
        Self::Transfer {
            direction: TransferDirection::Download,
            cause,
        }
    }

    /// Short name of the pipeline stage this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Connection(_) => "verify",
            Self::Extraction(_) => "extract",
            Self::Compression(_) => "compress",
            Self::Decompression(_) => "decompress",
            Self::Transfer { .. } => "transfer",
            Self::Load(_) => "load",
            Self::Configuration(_) => "configuration",
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
