//! OpenDAL-backed storage.
//!
//! Every backend builds an [`Operator`] for its service and hands it to
//! [`OpendalStorage`], which implements the [`Storage`] contract on top of
//! it. Transfers are streamed in chunks so memory stays flat regardless of
//! artifact size.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use opendal::{EntryMode, Operator};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::traits::Storage;
use super::types::StorageType;

const CHUNK_SIZE: usize = 256 * 1024;

/// Storage backend over an OpenDAL operator.
pub struct OpendalStorage {
    storage_type: StorageType,
    operator: Operator,
    location: String,
    local_root: Option<PathBuf>,
}

impl std::fmt::Debug for OpendalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpendalStorage")
            .field("storage_type", &self.storage_type)
            .field("location", &self.location)
            .finish()
    }
}

impl OpendalStorage {
    /// Wrap an operator. `location` is the bucket, container or root path
    /// and only shows up in logs.
    pub fn new(storage_type: StorageType, operator: Operator, location: impl Into<String>) -> Self {
        Self {
            storage_type,
            operator,
            location: location.into(),
            local_root: None,
        }
    }

    /// Record the directory the operator is rooted at on local disk.
    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(root.into());
        self
    }

    /// Normalize path (ensure no leading slash for OpenDAL).
    fn normalize_path(path: &str) -> &str {
        path.trim_start_matches('/')
    }

    /// Directory part of a listing prefix, with trailing slash.
    ///
    /// `backups/pg_` lists from `backups/`; `pg_` lists from the root.
    fn list_root(prefix: &str) -> &str {
        match prefix.rfind('/') {
            Some(idx) => &prefix[..=idx],
            None => "/",
        }
    }

    /// Render `name` as a URI for log messages.
    pub fn object_uri(&self, name: &str) -> String {
        format!(
            "{}://{}/{}",
            self.storage_type.scheme(),
            self.location.trim_end_matches('/'),
            Self::normalize_path(name)
        )
    }
}

#[async_trait]
impl Storage for OpendalStorage {
    fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    fn local_root(&self) -> Option<&Path> {
        self.local_root.as_deref()
    }

    async fn upload(&self, local_path: &Path, remote_name: &str) -> Result<()> {
        let path = Self::normalize_path(remote_name);
        let mut file = tokio::fs::File::open(local_path)
            .await
            .with_context(|| format!("failed to open {}", local_path.display()))?;

        let mut writer = self
            .operator
            .writer(path)
            .await
            .with_context(|| format!("failed to open {} for writing", self.object_uri(path)))?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            if let Err(e) = writer.write(Bytes::copy_from_slice(&buf[..n])).await {
                let _ = writer.abort().await;
                return Err(anyhow!("failed to write {}: {}", self.object_uri(path), e));
            }
            total += n as u64;
        }
        writer
            .close()
            .await
            .with_context(|| format!("failed to finish {}", self.object_uri(path)))?;

        tracing::info!("Uploaded {} ({} bytes)", self.object_uri(path), total);
        Ok(())
    }

    async fn download(&self, remote_name: &str, local_path: &Path) -> Result<()> {
        let path = Self::normalize_path(remote_name);
        self.operator
            .stat(path)
            .await
            .with_context(|| format!("failed to stat {}", self.object_uri(path)))?;
        let mut stream = self.get_reader(path).await?;

        if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .with_context(|| format!("failed to create {}", local_path.display()))?;

        let mut total = 0u64;
        let copied: Result<()> = async {
            while let Some(chunk) = stream.try_next().await? {
                file.write_all(&chunk).await?;
                total += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = copied {
            drop(file);
            let _ = tokio::fs::remove_file(local_path).await;
            return Err(e.context(format!("failed to download {}", self.object_uri(path))));
        }

        tracing::info!(
            "Downloaded {} to {} ({} bytes)",
            self.object_uri(path),
            local_path.display(),
            total
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = Self::normalize_path(prefix);
        let root = Self::list_root(prefix);

        let mut lister = match self.operator.lister_with(root).recursive(true).await {
            Ok(lister) => lister,
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = lister.next().await {
            let entry = entry?;
            if entry.metadata().mode() != EntryMode::FILE {
                continue;
            }
            let name = entry.path().trim_start_matches('/');
            if name.starts_with(prefix) {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete(&self, remote_name: &str) -> Result<()> {
        let path = Self::normalize_path(remote_name);
        self.operator
            .delete(path)
            .await
            .with_context(|| format!("failed to delete {}", self.object_uri(path)))?;
        tracing::info!("Deleted {}", self.object_uri(path));
        Ok(())
    }

    async fn get_reader(&self, remote_name: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let path = Self::normalize_path(remote_name).to_string();

        let reader = self
            .operator
            .reader(&path)
            .await
            .with_context(|| format!("failed to open {}", self.object_uri(&path)))?;
        let stream = reader
            .into_bytes_stream(..)
            .await?
            .map(|result| result.map_err(|e| anyhow!("Read error: {}", e)));

        Ok(Box::pin(stream))
    }
}
