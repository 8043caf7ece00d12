//! S3 storage using OpenDAL.
//!
//! This module provides S3 and S3-compatible storage support including:
//! - Amazon S3
//! - MinIO
//! - Cloudflare R2
//! - DigitalOcean Spaces
//!
//! Credentials come from the standard AWS chain (environment variables,
//! shared config and credentials files, instance metadata).

use anyhow::Result;
use opendal::layers::LoggingLayer;
use opendal::services::S3;
use opendal::Operator;

use super::operator::OpendalStorage;
use super::traits::BoxedStorage;
use super::types::{StorageConfig, StorageType};

/// S3 storage backend.
pub struct S3Storage;

impl S3Storage {
    /// Build the OpenDAL operator. The bucket is `config.path`.
    pub fn build_operator(config: &StorageConfig) -> Result<Operator> {
        let mut builder = S3::default().bucket(config.path.trim());

        if !config.region.is_empty() {
            builder = builder.region(&config.region);
        }

        // Custom endpoint for S3-compatible services
        if let Some(ep) = config.endpoint() {
            builder = builder.endpoint(ep);
        }

        let op = Operator::new(builder)?
            .layer(LoggingLayer::default())
            .finish();

        Ok(op)
    }

    /// Create a boxed S3 storage backend.
    pub fn boxed(config: &StorageConfig) -> Result<BoxedStorage> {
        let op = Self::build_operator(config)?;
        Ok(Box::new(OpendalStorage::new(
            StorageType::S3,
            op,
            config.path.trim(),
        )))
    }
}
