//! MongoDB adapter.
//!
//! Reachability is checked with a `ping` against the `admin` database using
//! the official driver; dumps and restores go through `mongodump` and
//! `mongorestore` in `--archive` mode so one backup is one file. Tokens in
//! `extra_params` (e.g. `--authenticationDatabase=admin`) are passed to both
//! tools.
//!
//! `mongodump` has no incremental mode; every backup kind is a full dump.

use anyhow::{Context, Result};
use async_lock::RwLock;
use async_trait::async_trait;
use chrono::Local;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::tool::{dump_tool, restore_tool, ToolCommand};
use crate::services::artifact::BackupArtifact;
use crate::services::database::traits::{BoxedDatabase, Database};
use crate::services::database::types::{BackupKind, DatabaseConfig, DatabaseType};

/// MongoDB database adapter.
pub struct MongoDatabase {
    config: DatabaseConfig,
    work_dir: PathBuf,
    client: RwLock<Option<Client>>,
}

impl std::fmt::Debug for MongoDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoDatabase")
            .field("host", &self.config.host)
            .field("dbname", &self.config.dbname)
            .field("work_dir", &self.work_dir)
            .field("client", &"<Client>")
            .finish()
    }
}

impl MongoDatabase {
    pub fn new(config: DatabaseConfig, work_dir: PathBuf) -> Self {
        Self {
            config,
            work_dir,
            client: RwLock::new(None),
        }
    }

    pub fn boxed(config: DatabaseConfig, work_dir: PathBuf) -> BoxedDatabase {
        Box::new(Self::new(config, work_dir))
    }

    fn port(&self) -> u16 {
        self.config.port_or_default(DatabaseType::MongoDB)
    }

    fn client_options(&self) -> Result<ClientOptions> {
        let address = ServerAddress::parse(format!("{}:{}", self.config.host, self.port()))?;

        let mut options = ClientOptions::default();
        options.hosts = vec![address];
        options.server_selection_timeout = Some(Duration::from_secs(5));
        options.connect_timeout = Some(Duration::from_secs(5));

        if !self.config.user.is_empty() {
            options.credential = Some(
                Credential::builder()
                    .username(self.config.user.clone())
                    .password(self.config.password.clone())
                    .build(),
            );
        }

        Ok(options)
    }

    /// Connection flags shared by `mongodump` and `mongorestore`.
    fn connection_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--host={}", self.config.host),
            format!("--port={}", self.port()),
        ];
        if !self.config.user.is_empty() {
            args.push(format!("--username={}", self.config.user));
            args.push(format!("--password={}", self.config.password));
        }
        args.extend(self.config.extra_params.split_whitespace().map(String::from));
        args
    }

    fn archive_arg(artifact: &Path) -> std::ffi::OsString {
        let mut arg = std::ffi::OsString::from("--archive=");
        arg.push(artifact);
        arg
    }
}

#[async_trait]
impl Database for MongoDatabase {
    fn engine(&self) -> DatabaseType {
        DatabaseType::MongoDB
    }

    async fn connect(&self) -> Result<()> {
        let client = Client::with_options(self.client_options()?)?;

        let mut guard = self.client.write().await;
        *guard = Some(client);

        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        if self.client.read().await.is_none() {
            self.connect().await?;
        }

        let client = self
            .client
            .read()
            .await
            .clone()
            .context("Database not connected")?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn backup(&self, kind: BackupKind) -> Result<BackupArtifact> {
        if kind != BackupKind::Full {
            tracing::warn!(
                "MongoDB does not support {} backups; performing a full dump",
                kind
            );
        }

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| format!("failed to create {}", self.work_dir.display()))?;

        let artifact = BackupArtifact::allocate(
            &self.work_dir,
            DatabaseType::MongoDB,
            &self.config.dbname,
            Local::now(),
        );

        let program = dump_tool(self.config.tool_path.as_deref(), "mongodump");
        ToolCommand::new("mongodump", program)
            .args(self.connection_args())
            .arg(format!("--db={}", self.config.dbname))
            .arg(Self::archive_arg(&artifact.path))
            .run_into(&artifact.path)
            .await?;

        Ok(artifact)
    }

    async fn restore(&self, artifact: &Path) -> Result<()> {
        let program = restore_tool(self.config.tool_path.as_deref(), "mongorestore");
        ToolCommand::new("mongorestore", program)
            .args(self.connection_args())
            .arg(Self::archive_arg(artifact))
            .run()
            .await
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.client.write().await;
        if let Some(client) = guard.take() {
            client.shutdown().await;
        }
        Ok(())
    }
}
