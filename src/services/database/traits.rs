//! Core database capability trait.
//!
//! This module defines the `Database` trait that every engine adapter must
//! implement so it can be plugged into the backup and restore pipelines.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use super::types::{BackupKind, DatabaseType};
use crate::services::artifact::BackupArtifact;

/// Capability contract for a database engine.
///
/// Adapters delegate the actual dump and load to the engine's native tools
/// or driver. The contract only fixes the shape of that interaction: one
/// artifact file out of `backup`, one artifact file into `restore`, and
/// errors surfaced rather than swallowed.
///
/// # Example
///
/// ```ignore
/// use dbbackup::services::database::{Database, BackupKind};
///
/// async fn dump(db: &dyn Database) -> anyhow::Result<()> {
///     db.test_connection().await?;
///     let artifact = db.backup(BackupKind::Full).await?;
///     println!("wrote {}", artifact.path.display());
///     db.close().await
/// }
/// ```
#[async_trait]
pub trait Database: Send + Sync {
    /// Get the engine behind this adapter.
    fn engine(&self) -> DatabaseType;

    /// Establish a session with the database.
    async fn connect(&self) -> Result<()>;

    /// Verify the database is reachable and the credentials are accepted.
    ///
    /// Connects first if `connect` has not been called yet.
    async fn test_connection(&self) -> Result<()>;

    /// Dump the database into a new local artifact in the work directory.
    ///
    /// Engines without native incremental support perform a full dump for
    /// every `kind`.
    async fn backup(&self, kind: BackupKind) -> Result<BackupArtifact>;

    /// Load the artifact at `artifact` into the live database.
    async fn restore(&self, artifact: &Path) -> Result<()>;

    /// Release any held session resources.
    ///
    /// Must succeed even if `connect` was never called.
    async fn close(&self) -> Result<()>;
}

/// A boxed database adapter.
pub type BoxedDatabase = Box<dyn Database>;
