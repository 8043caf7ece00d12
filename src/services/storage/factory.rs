//! Storage backend factory.
//!
//! Chooses the backend from the configuration's `type` tag.

use super::azure::AzureBlobStorage;
use super::gcs::GcsStorage;
use super::local_fs::LocalFsStorage;
use super::s3::S3Storage;
use super::traits::BoxedStorage;
use super::types::{StorageConfig, StorageType};
use crate::error::{PipelineError, PipelineResult};

/// Factory for creating storage backends based on configuration.
///
/// # Example
///
/// ```ignore
/// use dbbackup::services::storage::{StorageConfig, StorageFactory};
///
/// let config = StorageConfig {
///     storage_type: "local".to_string(),
///     path: "/var/backups/db".to_string(),
///     ..Default::default()
/// };
///
/// let storage = StorageFactory::create(&config)?;
/// ```
pub struct StorageFactory;

impl StorageFactory {
    /// Create a storage backend for `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if:
    /// - The storage type is unknown
    /// - The path (root, bucket or container) is empty
    /// - The backend rejects its settings
    pub fn create(config: &StorageConfig) -> PipelineResult<BoxedStorage> {
        let storage_type = StorageType::from_str(&config.storage_type).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "unsupported storage type: {} (expected one of: {})",
                config.storage_type,
                Self::supported_types()
                    .iter()
                    .map(StorageType::config_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        config
            .validate(storage_type)
            .map_err(PipelineError::Configuration)?;

        tracing::debug!(
            "Creating {} storage at {}",
            storage_type.display_name(),
            config.path
        );

        let storage = match storage_type {
            StorageType::LocalFs => LocalFsStorage::boxed(config),
            StorageType::S3 => S3Storage::boxed(config),
            StorageType::Gcs => GcsStorage::boxed(config),
            StorageType::AzureBlob => AzureBlobStorage::boxed(config),
        };

        storage.map_err(|e| PipelineError::Configuration(format!("{:#}", e)))
    }

    /// Get a list of all supported storage types.
    pub fn supported_types() -> Vec<StorageType> {
        StorageType::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_validates_config() {
        // Invalid: S3 with empty bucket
        let config = StorageConfig {
            storage_type: "s3".to_string(),
            region: "us-east-1".to_string(),
            ..Default::default()
        };

        let result = StorageFactory::create(&config);
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_factory_rejects_unknown_type() {
        let config = StorageConfig {
            storage_type: "ftp".to_string(),
            path: "/srv".to_string(),
            ..Default::default()
        };

        let err = StorageFactory::create(&config).err().unwrap();
        assert_eq!(
            err.to_string(),
            "configuration error: unsupported storage type: ftp \
             (expected one of: s3, gcs, azure, local)"
        );
    }

    #[test]
    fn test_factory_creates_s3() {
        let config = StorageConfig {
            storage_type: "s3".to_string(),
            path: "my-bucket".to_string(),
            region: "us-east-1".to_string(),
            ..Default::default()
        };

        let storage = StorageFactory::create(&config).unwrap();
        assert_eq!(storage.storage_type(), StorageType::S3);
    }

    #[test]
    fn test_factory_creates_local_fs() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig {
            storage_type: "fs".to_string(),
            path: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        };

        let storage = StorageFactory::create(&config).unwrap();
        assert_eq!(storage.storage_type(), StorageType::LocalFs);
    }

    #[test]
    fn test_supported_type_names_parse_back() {
        let supported = StorageFactory::supported_types();
        assert_eq!(supported.len(), 4);
        for storage_type in supported {
            assert_eq!(
                StorageType::from_str(storage_type.config_name()),
                Some(storage_type)
            );
        }
    }
}
