//! Remote storage backends for backup artifacts.
//!
//! This module provides a unified interface for moving artifacts to and
//! from blob storage using Apache OpenDAL.
//!
//! Supported storage backends:
//!
//! - **Local Filesystem** (a directory, often a mounted volume)
//! - **Amazon S3** and S3-compatible services (MinIO, Cloudflare R2, DigitalOcean Spaces)
//! - **Google Cloud Storage (GCS)**
//! - **Azure Blob Storage**
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    StorageFactory                           │
//! │  - Creates the backend named by the config `type`           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌──────────────┬──────┴───────┬──────────────┐
//!        ▼              ▼              ▼              ▼
//!   LocalFsStorage   S3Storage     GcsStorage   AzureBlobStorage
//!        │              │              │              │
//!        └──────────────┴──────┬───────┴──────────────┘
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    OpendalStorage                           │
//! │  - Implements `Storage` over an OpenDAL Operator            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod azure;
mod factory;
mod gcs;
mod local_fs;
mod operator;
mod s3;
mod traits;
mod types;

// Re-export main types
pub use factory::StorageFactory;
pub use operator::OpendalStorage;
pub use traits::{BoxedStorage, Storage};
pub use types::{StorageConfig, StorageType};

// Re-export storage implementations
pub use azure::{AzureBlobStorage, ConnectionString};
pub use gcs::GcsStorage;
pub use local_fs::LocalFsStorage;
pub use s3::S3Storage;
