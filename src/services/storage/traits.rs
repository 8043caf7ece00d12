//! Storage capability trait.
//!
//! This module defines the core trait for storage backends, providing
//! a unified interface for moving backup artifacts between the local
//! filesystem and a remote namespace.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::path::Path;

use super::types::StorageType;

/// Capability contract for a storage backend.
///
/// Every operation returns the first error it hits; none retry.
///
/// # Example
///
/// ```ignore
/// use dbbackup::services::storage::{Storage, StorageConfig, StorageFactory};
///
/// let config = StorageConfig {
///     storage_type: "s3".to_string(),
///     path: "my-bucket".to_string(),
///     region: "us-east-1".to_string(),
///     ..Default::default()
/// };
///
/// let storage = StorageFactory::create(&config)?;
/// storage.upload(Path::new("dump.sql.gz"), "dump.sql.gz").await?;
///
/// for name in storage.list("backup_pg_").await? {
///     println!("{name}");
/// }
/// ```
#[async_trait]
pub trait Storage: Send + Sync {
    /// Get the storage type for this backend.
    fn storage_type(&self) -> StorageType;

    /// Directory holding the objects, for backends that live on the local
    /// filesystem.
    fn local_root(&self) -> Option<&Path> {
        None
    }

    /// Copy the local file at `local_path` to `remote_name`.
    ///
    /// Creates any remote structure the name requires.
    async fn upload(&self, local_path: &Path, remote_name: &str) -> Result<()>;

    /// Copy the remote object `remote_name` to `local_path`.
    ///
    /// Creates missing local parent directories.
    async fn download(&self, remote_name: &str, local_path: &Path) -> Result<()>;

    /// List object names under `prefix`. An empty result is not an error.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete the remote object `remote_name`.
    async fn delete(&self, remote_name: &str) -> Result<()>;

    /// Open `remote_name` as a byte stream without storing it locally.
    async fn get_reader(&self, remote_name: &str) -> Result<BoxStream<'static, Result<Bytes>>>;
}

/// A boxed storage backend for dynamic dispatch.
pub type BoxedStorage = Box<dyn Storage>;
