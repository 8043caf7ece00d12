//! PostgreSQL adapter.
//!
//! Reachability is checked through a SQLx `PgPool`; dumps and restores go
//! through `pg_dump` and `psql`. The password is handed to the tools in
//! `PGPASSWORD` on the child process only.
//!
//! `pg_dump` has no incremental mode, so every backup kind produces a full
//! plain-SQL dump.

use anyhow::{anyhow, Context, Result};
use async_lock::RwLock;
use async_trait::async_trait;
use chrono::Local;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::tool::{dump_tool, restore_tool, ToolCommand};
use crate::services::artifact::BackupArtifact;
use crate::services::database::traits::{BoxedDatabase, Database};
use crate::services::database::types::{BackupKind, DatabaseConfig, DatabaseType};

/// PostgreSQL database adapter.
pub struct PostgresDatabase {
    config: DatabaseConfig,
    work_dir: PathBuf,
    pool: RwLock<Option<PgPool>>,
}

impl std::fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("host", &self.config.host)
            .field("dbname", &self.config.dbname)
            .field("work_dir", &self.work_dir)
            .field("pool", &"<PgPool>")
            .finish()
    }
}

impl PostgresDatabase {
    /// Create a new adapter. Artifacts are written to `work_dir`.
    ///
    /// This does not connect immediately.
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
        self.config.port_or_default(DatabaseType::PostgreSQL)
    }

    /// Build PgConnectOptions from the configuration.
    ///
    /// `sslmode` from `extra_params` applies; without it SSL is disabled.
    fn build_connect_options(&self) -> Result<PgConnectOptions> {
        let mut ssl_mode = PgSslMode::Disable;
        let mut application_name = None;

        for (key, value) in self.config.extra_pairs() {
            match key {
                "sslmode" => {
                    ssl_mode = PgSslMode::from_str(value)
                        .map_err(|e| anyhow!("invalid sslmode '{}': {}", value, e))?;
                }
                "application_name" => application_name = Some(value),
                other => tracing::debug!("Ignoring PostgreSQL extra parameter '{}'", other),
            }
        }

        let mut options = PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.port())
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.dbname)
            .ssl_mode(ssl_mode);

        if let Some(name) = application_name {
            options = options.application_name(name);
        }

        Ok(options)
    }

    fn dump_command(&self, artifact: &Path) -> ToolCommand {
        let program = dump_tool(self.config.tool_path.as_deref(), "pg_dump");
        ToolCommand::new("pg_dump", program)
            .env("PGPASSWORD", &self.config.password)
            .arg("-h")
            .arg(&self.config.host)
            .arg("-p")
            .arg(self.port().to_string())
            .arg("-U")
            .arg(&self.config.user)
            .arg("-f")
            .arg(artifact)
            .arg(&self.config.dbname)
    }

    fn restore_command(&self, artifact: &Path) -> ToolCommand {
        let program = restore_tool(self.config.tool_path.as_deref(), "psql");
        ToolCommand::new("psql restore", program)
            .env("PGPASSWORD", &self.config.password)
            .arg("-h")
            .arg(&self.config.host)
            .arg("-p")
            .arg(self.port().to_string())
            .arg("-U")
            .arg(&self.config.user)
            .arg("-d")
            .arg(&self.config.dbname)
            .arg("-f")
            .arg(artifact)
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    fn engine(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    async fn connect(&self) -> Result<()> {
        let options = self.build_connect_options()?;

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
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
                "PostgreSQL does not support {} backups; performing a full dump",
                kind
            );
        }

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| format!("failed to create {}", self.work_dir.display()))?;

        let artifact = BackupArtifact::allocate(
            &self.work_dir,
            DatabaseType::PostgreSQL,
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
