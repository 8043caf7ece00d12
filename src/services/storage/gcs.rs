//! Google Cloud Storage using OpenDAL.

use anyhow::{anyhow, Result};
use opendal::layers::LoggingLayer;
use opendal::services::Gcs;
use opendal::Operator;

use super::operator::OpendalStorage;
use super::traits::BoxedStorage;
use super::types::{StorageConfig, StorageType};

/// Google Cloud Storage backend.
///
/// Authenticates with the service account file named by
/// `credentials_file`, or application default credentials without one.
pub struct GcsStorage;

impl GcsStorage {
    /// Build the OpenDAL operator. The bucket is `config.path`.
    pub fn build_operator(config: &StorageConfig) -> Result<Operator> {
        let mut builder = Gcs::default().bucket(config.path.trim());

        if let Some(creds_path) = &config.credentials_file {
            let creds_path = creds_path
                .to_str()
                .ok_or_else(|| anyhow!("Invalid credentials path"))?;
            builder = builder.credential_path(creds_path);
        }

        if let Some(ep) = config.endpoint() {
            builder = builder.endpoint(ep);
        }

        let op = Operator::new(builder)?
            .layer(LoggingLayer::default())
            .finish();

        Ok(op)
    }

    /// Create a boxed GCS storage backend.
    pub fn boxed(config: &StorageConfig) -> Result<BoxedStorage> {
        let op = Self::build_operator(config)?;
        Ok(Box::new(OpendalStorage::new(
            StorageType::Gcs,
            op,
            config.path.trim(),
        )))
    }
}
