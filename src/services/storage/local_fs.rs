//! Local filesystem storage using OpenDAL.
//!
//! Treats a directory as the remote namespace. Useful for NFS mounts,
//! attached volumes and tests.

use anyhow::{anyhow, Context, Result};
use opendal::layers::LoggingLayer;
use opendal::services::Fs;
use opendal::Operator;
use std::path::Path;

use super::operator::OpendalStorage;
use super::traits::BoxedStorage;
use super::types::{StorageConfig, StorageType};

/// Local filesystem storage backend.
pub struct LocalFsStorage;

impl LocalFsStorage {
    /// Build the OpenDAL operator rooted at `config.path`.
    ///
    /// The root directory is created when missing.
    pub fn build_operator(config: &StorageConfig) -> Result<Operator> {
        let root = Path::new(&config.path);
        std::fs::create_dir_all(root)
            .with_context(|| format!("failed to create storage root {}", root.display()))?;

        let root = root
            .to_str()
            .ok_or_else(|| anyhow!("Invalid path encoding"))?;
        let builder = Fs::default().root(root);

        let op = Operator::new(builder)?
            .layer(LoggingLayer::default())
            .finish();

        Ok(op)
    }

    /// Create a boxed local filesystem storage backend.
    pub fn boxed(config: &StorageConfig) -> Result<BoxedStorage> {
        let op = Self::build_operator(config)?;
        Ok(Box::new(
            OpendalStorage::new(StorageType::LocalFs, op, config.path.clone())
                .with_local_root(&config.path),
        ))
    }
}
