//! Database adapter factory.
//!
//! Selects the engine adapter from the configuration's `type` string.

use std::path::Path;

use super::mongo::MongoDatabase;
use super::mysql::MySqlDatabase;
use super::postgres::PostgresDatabase;
use crate::error::{PipelineError, PipelineResult};
use crate::services::database::traits::BoxedDatabase;
use crate::services::database::types::{DatabaseConfig, DatabaseType};

/// Factory for creating database adapters based on configuration.
///
/// # Example
///
/// ```ignore
/// use dbbackup::services::database::{DatabaseConfig, DatabaseFactory};
///
/// let config = DatabaseConfig {
///     db_type: "postgres".to_string(),
///     host: "localhost".to_string(),
///     dbname: "shop".to_string(),
///     ..Default::default()
/// };
///
/// let database = DatabaseFactory::create(&config, Path::new("/var/tmp/dbbackup"))?;
/// ```
pub struct DatabaseFactory;

impl DatabaseFactory {
    /// Create the adapter for `config.db_type`. Artifacts go to `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Configuration` if the engine type is not
    /// supported or required fields are missing.
    pub fn create(config: &DatabaseConfig, work_dir: &Path) -> PipelineResult<BoxedDatabase> {
        let engine = DatabaseType::from_str(&config.db_type).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "unsupported database type: {} (expected one of: {})",
                config.db_type,
                Self::supported_types()
                    .iter()
                    .map(DatabaseType::config_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        if config.dbname.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "{} database name is required",
                engine
            )));
        }

        let work_dir = work_dir.to_path_buf();
        let database = match engine {
            DatabaseType::PostgreSQL => PostgresDatabase::boxed(config.clone(), work_dir),
            DatabaseType::MySQL => MySqlDatabase::boxed(config.clone(), work_dir),
            DatabaseType::MongoDB => MongoDatabase::boxed(config.clone(), work_dir),
        };

        tracing::debug!("Created {} adapter for '{}'", engine, config.dbname);
        Ok(database)
    }

    /// Get a list of all supported engine types.
    pub fn supported_types() -> Vec<DatabaseType> {
        DatabaseType::all()
    }
}
