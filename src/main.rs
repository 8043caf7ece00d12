use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

use dbbackup::config::{AppConfig, LogConfig};
use dbbackup::error::PipelineResult;
use dbbackup::services::database::{Database, DatabaseFactory};
use dbbackup::services::notifier::{notifier_from_config, Notifier};
use dbbackup::services::storage::{Storage, StorageFactory};
use dbbackup::services::{BackupManager, RestoreManager};

#[derive(Parser, Debug)]
#[command(name = "dbbackup", version)]
#[command(about = "Back up and restore MySQL, PostgreSQL and MongoDB databases to local or cloud storage")]
struct Cli {
    /// Config file (default is $HOME/.dbbackup.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Back up the configured database and upload it to storage
    Backup,
    /// Restore the database from a backup in storage
    Restore {
        /// Name of the backup object
        backup_file: String,
    },
    /// List backups in storage
    List {
        /// Only show names starting with this prefix
        prefix: Option<String>,
    },
    /// Delete a backup from storage
    Delete {
        /// Name of the backup object
        name: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, source) = match AppConfig::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(&config.log) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match &source {
        Some(path) => tracing::debug!("Using config file: {}", path.display()),
        None => tracing::debug!("No config file found, using defaults and environment"),
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialise the global subscriber from the `log` section.
///
/// `RUST_LOG` takes precedence over `log.level`.
fn init_tracing(log: &LogConfig) -> Result<()> {
    let level = if log.level.trim().is_empty() {
        "info"
    } else {
        log.level.trim()
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{}'", level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match &log.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| anyhow!("failed to initialise logging: {}", e))
}

fn build_database(config: &AppConfig) -> PipelineResult<Arc<dyn Database>> {
    let database = DatabaseFactory::create(&config.database, &config.backup.work_dir)?;
    Ok(Arc::from(database))
}

fn build_storage(config: &AppConfig) -> PipelineResult<Arc<dyn Storage>> {
    let storage = StorageFactory::create(&config.storage)?;
    Ok(Arc::from(storage))
}

async fn close_database(database: &dyn Database) {
    if let Err(e) = database.close().await {
        tracing::warn!("Failed to close database connection: {:#}", e);
    }
}

async fn run(command: Commands, config: AppConfig) -> Result<()> {
    match command {
        Commands::Backup => {
            let database = build_database(&config)?;
            let storage = build_storage(&config)?;
            let notifier: Option<Arc<dyn Notifier>> =
                notifier_from_config(&config.notify).map(Arc::from);

            let manager = BackupManager::new(
                database.clone(),
                storage,
                notifier,
                config.backup.clone(),
            );
            let result = manager.perform_backup().await;
            close_database(database.as_ref()).await;

            let report = result?;
            println!("{}", report.remote_name);
        }
        Commands::Restore { backup_file } => {
            let database = build_database(&config)?;
            let storage = build_storage(&config)?;

            let manager =
                RestoreManager::new(database.clone(), storage, config.backup.work_dir.clone());
            let result = manager.perform_restore(&backup_file).await;
            close_database(database.as_ref()).await;

            result?;
        }
        Commands::List { prefix } => {
            let storage = build_storage(&config)?;
            for name in storage.list(prefix.as_deref().unwrap_or("")).await? {
                println!("{}", name);
            }
        }
        Commands::Delete { name } => {
            let storage = build_storage(&config)?;
            storage.delete(&name).await?;
            tracing::info!("Deleted {}", name);
        }
    }

    Ok(())
}
