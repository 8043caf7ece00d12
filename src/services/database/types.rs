//! Database engine types and connection configuration.
//!
//! This module contains:
//! - `DatabaseType` - Enum of supported database engines
//! - `DatabaseConfig` - Connection parameters read from the config file
//! - `BackupKind` - The requested backup type

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    MySQL,
    MongoDB,
}

impl DatabaseType {
    /// Get the display name for this database type
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::MongoDB => "MongoDB",
        }
    }

    /// Get the default port for this engine
    pub fn default_port(&self) -> u16 {
        match self {
            Self::PostgreSQL => 5432,
            Self::MySQL => 3306,
            Self::MongoDB => 27017,
        }
    }

    /// Short tag used in artifact file names.
    pub fn artifact_tag(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "pg",
            Self::MySQL => "mysql",
            Self::MongoDB => "mongo",
        }
    }

    /// Extension of the artifact produced by this engine's dump tool.
    pub fn artifact_extension(&self) -> &'static str {
        match self {
            Self::PostgreSQL | Self::MySQL => "sql",
            Self::MongoDB => "archive",
        }
    }

    /// Name used for this engine in the `type` configuration key.
    pub fn config_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
            Self::MongoDB => "mongodb",
        }
    }

    /// Get all supported database types
    pub fn all() -> Vec<DatabaseType> {
        vec![Self::PostgreSQL, Self::MySQL, Self::MongoDB]
    }

    /// Parse from the `type` string used in configuration
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Some(Self::PostgreSQL),
            "mysql" | "mariadb" => Some(Self::MySQL),
            "mongodb" | "mongo" => Some(Self::MongoDB),
            _ => None,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Connection parameters for one database.
///
/// Immutable for the lifetime of the adapter built from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Engine type: mysql, postgres, mongodb
    #[serde(rename = "type")]
    pub db_type: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// Engine-specific extras, e.g. `sslmode=require` for PostgreSQL
    pub extra_params: String,
    /// Path to the dump tool (pg_dump, mysqldump, mongodump)
    pub tool_path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Port to connect to, falling back to the engine default when unset.
    pub fn port_or_default(&self, engine: DatabaseType) -> u16 {
        if self.port == 0 {
            engine.default_port()
        } else {
            self.port
        }
    }

    /// Split `extra_params` into whitespace-separated `key=value` pairs.
    ///
    /// Tokens without `=` are returned with an empty value.
    pub fn extra_pairs(&self) -> Vec<(&str, &str)> {
        self.extra_params
            .split_whitespace()
            .map(|token| token.split_once('=').unwrap_or((token, "")))
            .collect()
    }
}

/// Requested backup type.
///
/// Every shipped adapter only supports full dumps; the other kinds are
/// accepted and performed as full dumps with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    #[default]
    Full,
    Incremental,
    Differential,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::Differential => "differential",
        }
    }

    /// Parse from configuration. An empty string means `Full`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "full" => Some(Self::Full),
            "incremental" => Some(Self::Incremental),
            "differential" => Some(Self::Differential),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
