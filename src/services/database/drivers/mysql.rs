//! MySQL / MariaDB adapter.
//!
//! Reachability is checked through a SQLx `MySqlPool`; dumps go through
//! `mysqldump` and restores pipe the artifact into the `mysql` client. The
//! password travels in `MYSQL_PWD` on the child process, not on the command
//! line. Tokens in `extra_params` are passed through to `mysqldump`.
//!
//! Incremental MySQL backups need binary log handling, which is not
//! implemented: every backup kind produces a full dump.

use anyhow::{anyhow, Context, Result};
use async_lock::RwLock;
use async_trait::async_trait;
use chrono::Local;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::MySqlPool;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::tool::{dump_tool, restore_tool, ToolCommand};
use crate::services::artifact::BackupArtifact;
use crate::services::database::traits::{BoxedDatabase, Database};
use crate::services::database::types::{BackupKind, DatabaseConfig, DatabaseType};

/// MySQL database adapter.
pub struct MySqlDatabase {
    config: DatabaseConfig,
    work_dir: PathBuf,
    pool: RwLock<Option<MySqlPool>>,
}

impl std::fmt::Debug for MySqlDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlDatabase")
            .field("host", &self.config.host)
            .field("dbname", &self.config.dbname)
            .field("work_dir", &self.work_dir)
            .field("pool", &"<MySqlPool>")
            .finish()
    }
}

impl MySqlDatabase {
    /// Create a new adapter. Artifacts are written to `work_dir`.
    pub fn new(config: DatabaseConfig, work_dir: PathBuf) -> Self {
        Self {
            config,
            work_dir,
            pool: RwLock::new(None),
        }
    }

    /// Create a boxed adapter (for factory use).
    pub fn boxed(config: DatabaseConfig, work_dir: PathBuf) -> BoxedDatabase {
        Box::new(Self::new(config, work_dir))
    }

    fn port(&self) -> u16 {
        self.config.port_or_default(DatabaseType::MySQL)
    }

    fn build_connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.port())
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.dbname)
    }

    fn dump_command(&self, artifact: &Path) -> ToolCommand {
        let program = dump_tool(self.config.tool_path.as_deref(), "mysqldump");
        let mut result_file = std::ffi::OsString::from("--result-file=");
        result_file.push(artifact);

        ToolCommand::new("mysqldump", program)
            .env("MYSQL_PWD", &self.config.password)
            .arg(format!("-h{}", self.config.host))
            .arg(format!("-P{}", self.port()))
            .arg(format!("-u{}", self.config.user))
            .args(self.config.extra_params.split_whitespace())
            .arg(&self.config.dbname)
            .arg(result_file)
    }

    fn restore_command(&self, artifact: &Path) -> ToolCommand {
        let program = restore_tool(self.config.tool_path.as_deref(), "mysql");
        ToolCommand::new("mysql restore", program)
            .env("MYSQL_PWD", &self.config.password)
            .arg(format!("-h{}", self.config.host))
            .arg(format!("-P{}", self.port()))
            .arg(format!("-u{}", self.config.user))
            .arg(&self.config.dbname)
            .stdin_file(artifact)
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    fn engine(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    async fn connect(&self) -> Result<()> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(self.build_connect_options())
            .await?;

        let mut guard = self.pool.write().await;
        *guard = Some(pool);

        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        if self.pool.read().await.is_none() {
            self.connect().await?;
        }

        let guard = self.pool.read().await;
        let pool = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Database not connected"))?;
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    async fn backup(&self, kind: BackupKind) -> Result<BackupArtifact> {
        if kind != BackupKind::Full {
            tracing::warn!(
                "MySQL {} backups require binary logs; performing a full dump",
                kind
            );
        }

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| format!("failed to create {}", self.work_dir.display()))?;

        let artifact = BackupArtifact::allocate(
            &self.work_dir,
            DatabaseType::MySQL,
            &self.config.dbname,
            Local::now(),
        );

        self.dump_command(&artifact.path)
            .run_into(&artifact.path)
            .await?;
        Ok(artifact)
    }

    async fn restore(&self, artifact: &Path) -> Result<()> {
        self.restore_command(artifact).run().await
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.pool.write().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> DatabaseConfig {
        DatabaseConfig {
            db_type: "mysql".to_string(),
            host: "localhost".to_string(),
            user: "root".to_string(),
            password: "password".to_string(),
            dbname: "app".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_port() {
        let db = MySqlDatabase::new(create_test_config(), PathBuf::from("."));
        assert_eq!(db.port(), 3306);
    }

    #[tokio::test]
    async fn test_close_without_connect_is_ok() {
        let db = MySqlDatabase::new(create_test_config(), PathBuf::from("."));
        assert!(db.close().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_restore_surfaces_tool_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let artifact = dir.path().join("dump.sql");
        std::fs::write(&artifact, "SELECT 1;").unwrap();

        // The restore tool resolves next to the dump tool, where no `mysql`
        // binary exists.
        let config = DatabaseConfig {
            tool_path: Some(dir.path().join("mysqldump")),
            ..create_test_config()
        };
        let db = MySqlDatabase::new(config, dir.path().to_path_buf());

        let err = db.restore(&artifact).await.unwrap_err();
        assert!(err.to_string().contains("mysql restore"));
    }
}
