//! Azure Blob Storage using OpenDAL.
//!
//! Account credentials come from a connection string, read from
//! `credentials_file` when set and from `AZURE_STORAGE_CONNECTION_STRING`
//! otherwise.

use anyhow::{anyhow, bail, Context, Result};
use opendal::layers::LoggingLayer;
use opendal::services::Azblob;
use opendal::Operator;
use std::collections::HashMap;

use super::operator::OpendalStorage;
use super::traits::BoxedStorage;
use super::types::{StorageConfig, StorageType};

/// Environment variable holding the connection string.
pub const CONNECTION_STRING_ENV: &str = "AZURE_STORAGE_CONNECTION_STRING";

/// Parsed pieces of an Azure storage connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub account_key: String,
    pub blob_endpoint: Option<String>,
}

impl ConnectionString {
    /// Parse `Key=Value;Key=Value` pairs.
    ///
    /// Values may contain `=` (account keys are base64). Without a
    /// `BlobEndpoint`, one is derived from the account name and
    /// `EndpointSuffix`.
    pub fn parse(raw: &str) -> Result<Self> {
        let pairs: HashMap<&str, &str> = raw
            .split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(|part| part.split_once('='))
            .collect();

        let account_name = pairs
            .get("AccountName")
            .ok_or_else(|| anyhow!("connection string is missing AccountName"))?
            .to_string();
        let account_key = pairs
            .get("AccountKey")
            .ok_or_else(|| anyhow!("connection string is missing AccountKey"))?
            .to_string();

        let blob_endpoint = match pairs.get("BlobEndpoint") {
            Some(ep) => Some(ep.to_string()),
            None => pairs.get("EndpointSuffix").map(|suffix| {
                let protocol = pairs.get("DefaultEndpointsProtocol").unwrap_or(&"https");
                format!("{}://{}.blob.{}", protocol, account_name, suffix)
            }),
        };

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint,
        })
    }

    fn load(config: &StorageConfig) -> Result<Self> {
        let raw = match &config.credentials_file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            None => match std::env::var(CONNECTION_STRING_ENV) {
                Ok(raw) => raw,
                Err(_) => bail!(
                    "Azure storage needs credentials_file or {}",
                    CONNECTION_STRING_ENV
                ),
            },
        };
        Self::parse(raw.trim())
    }
}

/// Azure Blob Storage backend. The container is `config.path`.
pub struct AzureBlobStorage;

impl AzureBlobStorage {
    /// Build the OpenDAL operator.
    pub fn build_operator(config: &StorageConfig) -> Result<Operator> {
        let creds = ConnectionString::load(config)?;

        let endpoint = config
            .endpoint()
            .map(str::to_string)
            .or(creds.blob_endpoint)
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", creds.account_name));

        let builder = Azblob::default()
            .container(config.path.trim())
            .endpoint(&endpoint)
            .account_name(&creds.account_name)
            .account_key(&creds.account_key);

        let op = Operator::new(builder)?
            .layer(LoggingLayer::default())
            .finish();

        Ok(op)
    }

    /// Create a boxed Azure storage backend.
    pub fn boxed(config: &StorageConfig) -> Result<BoxedStorage> {
        let op = Self::build_operator(config)?;
        Ok(Box::new(OpendalStorage::new(
            StorageType::AzureBlob,
            op,
            config.path.trim(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connection_string() {
        let parsed = ConnectionString::parse(
            "DefaultEndpointsProtocol=https;AccountName=acme;AccountKey=a2V5PT0=;EndpointSuffix=core.windows.net",
        )
        .unwrap();

        assert_eq!(parsed.account_name, "acme");
        assert_eq!(parsed.account_key, "a2V5PT0=");
        assert_eq!(
            parsed.blob_endpoint.as_deref(),
            Some("https://acme.blob.core.windows.net")
        );
    }

    #[test]
    fn test_explicit_blob_endpoint() {
        let parsed = ConnectionString::parse(
            "AccountName=devstoreaccount1;AccountKey=key;BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1;",
        )
        .unwrap();
        assert_eq!(
            parsed.blob_endpoint.as_deref(),
            Some("http://127.0.0.1:10000/devstoreaccount1")
        );
    }

    #[test]
    fn test_missing_account_key() {
        let err = ConnectionString::parse("AccountName=acme").unwrap_err();
        assert!(err.to_string().contains("AccountKey"));
    }

    #[test]
    fn test_credentials_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("azure.conn");
        std::fs::write(&file, "AccountName=acme;AccountKey=secret\n").unwrap();

        let config = StorageConfig {
            storage_type: "azure".to_string(),
            path: "backups".to_string(),
            credentials_file: Some(file),
            ..Default::default()
        };
        assert!(AzureBlobStorage::build_operator(&config).is_ok());
    }
}
