//! Application configuration.
//!
//! Loaded from YAML, looked up in this order:
//!
//! 1. the path given with `--config`
//! 2. `$HOME/.dbbackup.yaml`
//! 3. `./.dbbackup.yaml`
//!
//! Any scalar key can then be overridden from the environment as
//! `DBBACKUP_<SECTION>_<KEY>`, e.g. `DBBACKUP_DATABASE_PASSWORD`.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::services::database::{BackupKind, DatabaseConfig};
use crate::services::notifier::NotifyConfig;
use crate::services::storage::StorageConfig;

/// File name searched for in the home and current directories.
pub const CONFIG_FILE_NAME: &str = ".dbbackup.yaml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "DBBACKUP";

/// Backup pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    #[serde(rename = "type")]
    pub kind: BackupKind,
    pub compression: bool,
    /// Cron expression. Accepted for compatibility, not acted on.
    pub schedule: String,
    /// Directory holding local artifacts while a run is in progress.
    pub work_dir: PathBuf,
    /// Also notify when the compression stage fails.
    pub notify_on_compression_failure: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            kind: BackupKind::Full,
            compression: false,
            schedule: String::new(),
            work_dir: PathBuf::from("."),
            notify_on_compression_failure: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub backup: BackupConfig,
    pub log: LogConfig,
    pub notify: NotifyConfig,
}

impl AppConfig {
    /// Load the configuration and apply environment overrides.
    ///
    /// An explicit path must exist. Without one, the first file found in the
    /// search order is used, and defaults apply when there is none.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let source = match explicit {
            Some(path) => {
                if !path.is_file() {
                    bail!("config file {} not found", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::search_paths().into_iter().find(|p| p.is_file()),
        };

        let mut config = match &source {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;

        Ok((config, source))
    }

    /// Candidate config file locations, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_FILE_NAME));
        }
        paths.push(PathBuf::from(".").join(CONFIG_FILE_NAME));
        paths
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty mapping.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Replace values with `DBBACKUP_<SECTION>_<KEY>` entries from `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |section: &str, key: &str| {
            lookup(&format!(
                "{}_{}_{}",
                ENV_PREFIX,
                section.to_uppercase(),
                key.to_uppercase()
            ))
        };

        let db = &mut self.database;
        override_string(&mut db.db_type, get("database", "type"));
        override_string(&mut db.host, get("database", "host"));
        override_parsed(&mut db.port, get("database", "port"), "database.port")?;
        override_string(&mut db.user, get("database", "user"));
        override_string(&mut db.password, get("database", "password"));
        override_string(&mut db.dbname, get("database", "dbname"));
        override_string(&mut db.extra_params, get("database", "extra_params"));
        override_path(&mut db.tool_path, get("database", "tool_path"));

        let st = &mut self.storage;
        override_string(&mut st.storage_type, get("storage", "type"));
        override_string(&mut st.path, get("storage", "path"));
        override_string(&mut st.region, get("storage", "region"));
        override_path(&mut st.credentials_file, get("storage", "credentials_file"));
        if let Some(endpoint) = get("storage", "endpoint") {
            st.endpoint = Some(endpoint);
        }

        let bk = &mut self.backup;
        if let Some(kind) = get("backup", "type") {
            bk.kind = BackupKind::parse(&kind)
                .ok_or_else(|| anyhow!("invalid backup.type '{}'", kind))?;
        }
        override_bool(&mut bk.compression, get("backup", "compression"), "backup.compression")?;
        override_string(&mut bk.schedule, get("backup", "schedule"));
        if let Some(dir) = get("backup", "work_dir") {
            bk.work_dir = PathBuf::from(dir);
        }
        override_bool(
            &mut bk.notify_on_compression_failure,
            get("backup", "notify_on_compression_failure"),
            "backup.notify_on_compression_failure",
        )?;

        override_string(&mut self.log.level, get("log", "level"));
        override_path(&mut self.log.file, get("log", "file"));

        override_string(
            &mut self.notify.slack_webhook_url,
            get("notify", "slack_webhook_url"),
        );

        Ok(())
    }
}

fn override_string(field: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn override_path(field: &mut Option<PathBuf>, value: Option<String>) {
    if let Some(value) = value {
        *field = (!value.is_empty()).then(|| PathBuf::from(value));
    }
}

fn override_parsed(field: &mut u16, value: Option<String>, key: &str) -> Result<()> {
    if let Some(value) = value {
        *field = value
            .trim()
            .parse()
            .with_context(|| format!("invalid {} '{}'", key, value))?;
    }
    Ok(())
}

fn override_bool(field: &mut bool, value: Option<String>, key: &str) -> Result<()> {
    if let Some(value) = value {
        *field = match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => bail!("invalid {} '{}'", key, value),
        };
    }
    Ok(())
}
