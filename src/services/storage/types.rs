//! Storage types and configuration.
//!
//! This module defines the storage backend types and the backend
//! configuration read from the config file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Supported storage backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Amazon S3 and S3-compatible services (MinIO, R2, DigitalOcean Spaces)
    S3,
    /// Google Cloud Storage
    Gcs,
    /// Azure Blob Storage
    AzureBlob,
    /// Local filesystem
    LocalFs,
}

impl StorageType {
    /// Get the display name for this storage type.
    pub fn display_name(&self) -> &'static str {
        match self {
            StorageType::S3 => "Amazon S3",
            StorageType::Gcs => "Google Cloud Storage",
            StorageType::AzureBlob => "Azure Blob Storage",
            StorageType::LocalFs => "Local Filesystem",
        }
    }

    /// Name used for this backend in the `type` configuration key.
    pub fn config_name(&self) -> &'static str {
        match self {
            StorageType::S3 => "s3",
            StorageType::Gcs => "gcs",
            StorageType::AzureBlob => "azure",
            StorageType::LocalFs => "local",
        }
    }

    /// Get all available storage types.
    pub fn all() -> Vec<StorageType> {
        vec![
            StorageType::S3,
            StorageType::Gcs,
            StorageType::AzureBlob,
            StorageType::LocalFs,
        ]
    }

    /// Parse from the `type` string used in configuration.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "fs" | "localfs" => Some(StorageType::LocalFs),
            "s3" => Some(StorageType::S3),
            "gcs" | "gs" => Some(StorageType::Gcs),
            "azure" | "azblob" => Some(StorageType::AzureBlob),
            _ => None,
        }
    }

    /// URI scheme used when logging object locations.
    pub fn scheme(&self) -> &'static str {
        match self {
            StorageType::S3 => "s3",
            StorageType::Gcs => "gs",
            StorageType::AzureBlob => "azblob",
            StorageType::LocalFs => "file",
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration for a storage backend.
///
/// Immutable for the lifetime of the backend built from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend type: local, s3, gcs, azure
    #[serde(rename = "type")]
    pub storage_type: String,
    /// Root directory for local storage, bucket or container name otherwise
    pub path: String,
    /// Region for cloud backends
    pub region: String,
    /// Credentials file (GCS service account JSON, Azure connection string)
    pub credentials_file: Option<PathBuf>,
    /// Custom endpoint for S3-compatible services or Azure
    pub endpoint: Option<String>,
}

impl StorageConfig {
    /// Validate the configuration for the given storage type.
    pub fn validate(&self, storage_type: StorageType) -> Result<(), String> {
        if self.path.trim().is_empty() {
            return Err(match storage_type {
                StorageType::S3 => "S3 bucket name is required".to_string(),
                StorageType::Gcs => "GCS bucket name is required".to_string(),
                StorageType::AzureBlob => "Azure container name is required".to_string(),
                StorageType::LocalFs => "Local filesystem root path is required".to_string(),
            });
        }
        Ok(())
    }

    /// Endpoint, if one is configured and non-empty.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|ep| !ep.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!(StorageType::from_str("local"), Some(StorageType::LocalFs));
        assert_eq!(StorageType::from_str("S3"), Some(StorageType::S3));
        assert_eq!(StorageType::from_str("gcs"), Some(StorageType::Gcs));
        assert_eq!(StorageType::from_str("azure"), Some(StorageType::AzureBlob));
        assert_eq!(StorageType::from_str("ftp"), None);
    }

    #[test]
    fn test_storage_type_display() {
        assert_eq!(StorageType::S3.display_name(), "Amazon S3");
        assert_eq!(StorageType::LocalFs.display_name(), "Local Filesystem");
    }

    #[test]
    fn test_storage_config_validation() {
        let config = StorageConfig {
            storage_type: "s3".to_string(),
            path: "my-bucket".to_string(),
            ..Default::default()
        };
        assert!(config.validate(StorageType::S3).is_ok());

        let config = StorageConfig {
            storage_type: "s3".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(StorageType::S3).unwrap_err(),
            "S3 bucket name is required"
        );
    }

    #[test]
    fn test_empty_endpoint_is_ignored() {
        let config = StorageConfig {
            endpoint: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), None);
    }
}
