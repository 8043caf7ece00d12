//! Database backup and restore orchestration.
//!
//! Dumps PostgreSQL, MySQL and MongoDB databases with their native tools,
//! optionally gzips the dump and ships it to local, S3, GCS or Azure Blob
//! storage, then reverses the trip on restore.

pub mod config;
pub mod error;
pub mod services;

pub use config::AppConfig;
pub use error::{PipelineError, PipelineResult};
