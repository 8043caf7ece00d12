//! End-to-end backup and restore runs against stub databases and the real
//! local filesystem backend.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Local;
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use dbbackup::config::BackupConfig;
use dbbackup::error::PipelineError;
use dbbackup::services::artifact::BackupArtifact;
use dbbackup::services::database::{BackupKind, Database, DatabaseType};
use dbbackup::services::notifier::Notifier;
use dbbackup::services::storage::{Storage, StorageConfig, StorageFactory, StorageType};
use dbbackup::services::{BackupManager, RestoreManager};

const PAYLOAD: &[u8] = b"CREATE TABLE orders (id int);\nINSERT INTO orders VALUES (1), (2), (3);\n";

#[derive(Default)]
struct StubDatabase {
    work_dir: PathBuf,
    unreachable: bool,
    fail_backup: bool,
    /// Occupy the codec's temp path so compression cannot create it.
    block_compression: bool,
    fail_restore: bool,
    backups: AtomicUsize,
    restored: Mutex<Vec<(String, Vec<u8>)>>,
}

impl StubDatabase {
    fn new(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Database for StubDatabase {
    fn engine(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        if self.unreachable {
            bail!("connection refused");
        }
        Ok(())
    }

    async fn backup(&self, _kind: BackupKind) -> Result<BackupArtifact> {
        self.backups.fetch_add(1, Ordering::SeqCst);
        if self.fail_backup {
            bail!("pg_dump failed: exit status: 1, output: permission denied");
        }

        let artifact = BackupArtifact::allocate(
            &self.work_dir,
            DatabaseType::PostgreSQL,
            "shop",
            Local::now(),
        );
        std::fs::write(&artifact.path, PAYLOAD)?;

        if self.block_compression {
            let mut partial = artifact.path.clone().into_os_string();
            partial.push(".gz.partial");
            std::fs::create_dir(PathBuf::from(partial))?;
        }

        Ok(artifact)
    }

    async fn restore(&self, artifact: &Path) -> Result<()> {
        if self.fail_restore {
            bail!("psql restore failed: exit status: 3, output: syntax error");
        }
        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.restored
            .lock()
            .unwrap()
            .push((name, std::fs::read(artifact)?));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Storage whose transfers always fail.
struct BrokenStorage;

#[async_trait]
impl Storage for BrokenStorage {
    fn storage_type(&self) -> StorageType {
        StorageType::S3
    }
    async fn upload(&self, _local_path: &Path, _remote_name: &str) -> Result<()> {
        Err(anyhow!("bucket not found"))
    }
    async fn download(&self, _remote_name: &str, _local_path: &Path) -> Result<()> {
        Err(anyhow!("object not found"))
    }
    async fn list(&self, _prefix: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    async fn delete(&self, _remote_name: &str) -> Result<()> {
        Ok(())
    }
    async fn get_reader(&self, _remote_name: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        Err(anyhow!("object not found"))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            bail!("webhook returned 500");
        }
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    work_dir: PathBuf,
    remote_dir: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let work_dir = dir.path().join("work");
        let remote_dir = dir.path().join("remote");
        std::fs::create_dir_all(&work_dir).unwrap();
        Self {
            _dir: dir,
            work_dir,
            remote_dir,
        }
    }

    fn local_storage(&self) -> Arc<dyn Storage> {
        storage_at(&self.remote_dir)
    }

    fn backup_config(&self, compression: bool) -> BackupConfig {
        BackupConfig {
            compression,
            work_dir: self.work_dir.clone(),
            ..Default::default()
        }
    }

    fn local_files(&self) -> Vec<String> {
        regular_files(&self.work_dir)
    }
}

fn storage_at(root: &Path) -> Arc<dyn Storage> {
    let config = StorageConfig {
        storage_type: "local".to_string(),
        path: root.to_string_lossy().into_owned(),
        ..Default::default()
    };
    Arc::from(StorageFactory::create(&config).unwrap())
}

fn regular_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_successful_local_backup() {
    let fx = Fixture::new();
    let db = Arc::new(StubDatabase::new(&fx.work_dir));
    let notifier = Arc::new(RecordingNotifier::default());

    let manager = BackupManager::new(
        db.clone(),
        fx.local_storage(),
        Some(notifier.clone()),
        fx.backup_config(false),
    );
    let report = manager.perform_backup().await.unwrap();

    assert!(report.remote_name.starts_with("backup_pg_shop_"));
    assert!(report.remote_name.ends_with(".sql"));
    assert!(!report.compressed);

    let stored = std::fs::read(fx.remote_dir.join(&report.remote_name)).unwrap();
    assert_eq!(stored, PAYLOAD);
    assert!(fx.local_files().is_empty());

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Backup completed successfully in "));
    assert!(messages[0].ends_with(&format!(". File: {}", report.remote_name)));
}

#[tokio::test]
async fn test_compressed_backup_and_restore_roundtrip() {
    let fx = Fixture::new();
    let db = Arc::new(StubDatabase::new(&fx.work_dir));
    let storage = fx.local_storage();

    let report = BackupManager::new(db.clone(), storage.clone(), None, fx.backup_config(true))
        .perform_backup()
        .await
        .unwrap();

    assert!(report.compressed);
    assert!(report.remote_name.ends_with(".sql.gz"));
    assert_eq!(regular_files(&fx.remote_dir), vec![report.remote_name.clone()]);
    assert!(fx.local_files().is_empty());

    RestoreManager::new(db.clone(), storage, fx.work_dir.clone())
        .perform_restore(&report.remote_name)
        .await
        .unwrap();

    let restored = db.restored.lock().unwrap().clone();
    assert_eq!(restored.len(), 1);
    assert_eq!(format!("{}.gz", restored[0].0), report.remote_name);
    assert_eq!(restored[0].1, PAYLOAD);
    assert!(fx.local_files().is_empty());
}

#[tokio::test]
async fn test_uncompressed_restore_loads_fetched_file() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.remote_dir.join("nightly")).unwrap();
    std::fs::write(fx.remote_dir.join("nightly").join("plain.sql"), PAYLOAD).unwrap();

    let db = Arc::new(StubDatabase::new(&fx.work_dir));
    RestoreManager::new(db.clone(), fx.local_storage(), fx.work_dir.clone())
        .perform_restore("nightly/plain.sql")
        .await
        .unwrap();

    let restored = db.restored.lock().unwrap().clone();
    assert_eq!(restored, vec![("plain.sql".to_string(), PAYLOAD.to_vec())]);
    assert!(fx.local_files().is_empty());
}

#[tokio::test]
async fn test_unreachable_database_aborts_before_extraction() {
    let fx = Fixture::new();
    let db = Arc::new(StubDatabase {
        unreachable: true,
        ..StubDatabase::new(&fx.work_dir)
    });
    let notifier = Arc::new(RecordingNotifier::default());

    let err = BackupManager::new(
        db.clone(),
        fx.local_storage(),
        Some(notifier.clone()),
        fx.backup_config(true),
    )
    .perform_backup()
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Connection(_)));
    assert_eq!(db.backups.load(Ordering::SeqCst), 0);
    assert!(regular_files(&fx.remote_dir).is_empty());
    assert_eq!(
        notifier.messages(),
        vec!["Backup failed: database connection failed: connection refused".to_string()]
    );
}

#[tokio::test]
async fn test_extraction_failure() {
    let fx = Fixture::new();
    let db = Arc::new(StubDatabase {
        fail_backup: true,
        ..StubDatabase::new(&fx.work_dir)
    });
    let notifier = Arc::new(RecordingNotifier::default());

    let err = BackupManager::new(
        db.clone(),
        fx.local_storage(),
        Some(notifier.clone()),
        fx.backup_config(false),
    )
    .perform_backup()
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Extraction(_)));
    assert!(fx.local_files().is_empty());
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Backup failed: database backup failed: pg_dump failed"));
}

#[tokio::test]
async fn test_compression_failure_cleans_up_without_notifying() {
    let fx = Fixture::new();
    let db = Arc::new(StubDatabase {
        block_compression: true,
        ..StubDatabase::new(&fx.work_dir)
    });
    let notifier = Arc::new(RecordingNotifier::default());

    let err = BackupManager::new(
        db.clone(),
        fx.local_storage(),
        Some(notifier.clone()),
        fx.backup_config(true),
    )
    .perform_backup()
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Compression(_)));
    assert!(fx.local_files().is_empty());
    assert!(regular_files(&fx.remote_dir).is_empty());
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn test_compression_failure_notifies_when_enabled() {
    let fx = Fixture::new();
    let db = Arc::new(StubDatabase {
        block_compression: true,
        ..StubDatabase::new(&fx.work_dir)
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let config = BackupConfig {
        notify_on_compression_failure: true,
        ..fx.backup_config(true)
    };

    let err = BackupManager::new(db.clone(), fx.local_storage(), Some(notifier.clone()), config)
        .perform_backup()
        .await
        .unwrap_err();

    assert_eq!(err.stage(), "compress");
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Backup failed: compression failed: "));
}

#[tokio::test]
async fn test_transfer_failure_removes_all_artifacts() {
    let fx = Fixture::new();
    let db = Arc::new(StubDatabase::new(&fx.work_dir));
    let notifier = Arc::new(RecordingNotifier::default());

    let err = BackupManager::new(
        db.clone(),
        Arc::new(BrokenStorage),
        Some(notifier.clone()),
        fx.backup_config(true),
    )
    .perform_backup()
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Transfer { .. }));
    assert!(fx.local_files().is_empty());
    assert_eq!(
        notifier.messages(),
        vec!["Backup failed: upload to storage failed: bucket not found".to_string()]
    );
}

#[tokio::test]
async fn test_conditional_compression() {
    let fx = Fixture::new();
    let storage = fx.local_storage();

    let plain = BackupManager::new(
        Arc::new(StubDatabase::new(&fx.work_dir)),
        storage.clone(),
        None,
        fx.backup_config(false),
    )
    .perform_backup()
    .await
    .unwrap();
    let compressed = BackupManager::new(
        Arc::new(StubDatabase::new(&fx.work_dir)),
        storage.clone(),
        None,
        fx.backup_config(true),
    )
    .perform_backup()
    .await
    .unwrap();

    assert!(!plain.remote_name.ends_with(".gz"));
    assert!(compressed.remote_name.ends_with(".gz"));
    assert_ne!(plain.remote_name, compressed.remote_name);

    let listed = storage.list("backup_pg_shop_").await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&plain.remote_name));
    assert!(listed.contains(&compressed.remote_name));
}

#[tokio::test]
async fn test_failing_notifier_does_not_change_outcome() {
    let fx = Fixture::new();
    let notifier = Arc::new(RecordingNotifier {
        fail: true,
        ..Default::default()
    });

    let report = BackupManager::new(
        Arc::new(StubDatabase::new(&fx.work_dir)),
        fx.local_storage(),
        Some(notifier.clone()),
        fx.backup_config(false),
    )
    .perform_backup()
    .await
    .unwrap();

    assert!(fx.remote_dir.join(&report.remote_name).is_file());
    assert_eq!(notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_backup_without_notifier() {
    let fx = Fixture::new();
    let report = BackupManager::new(
        Arc::new(StubDatabase::new(&fx.work_dir)),
        fx.local_storage(),
        None,
        fx.backup_config(true),
    )
    .perform_backup()
    .await
    .unwrap();

    assert!(fx.remote_dir.join(&report.remote_name).is_file());
}

#[tokio::test]
async fn test_restore_download_failure() {
    let fx = Fixture::new();
    let db = Arc::new(StubDatabase::new(&fx.work_dir));

    let err = RestoreManager::new(db.clone(), Arc::new(BrokenStorage), fx.work_dir.clone())
        .perform_restore("backup_pg_shop_20240101_000000.sql.gz")
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "download from storage failed: object not found"
    );
    assert!(db.restored.lock().unwrap().is_empty());
    assert!(fx.local_files().is_empty());
}

#[tokio::test]
async fn test_restore_corrupt_archive() {
    let fx = Fixture::new();
    std::fs::create_dir_all(&fx.remote_dir).unwrap();
    std::fs::write(fx.remote_dir.join("broken.sql.gz"), b"not gzip at all").unwrap();
    let db = Arc::new(StubDatabase::new(&fx.work_dir));

    let err = RestoreManager::new(db.clone(), fx.local_storage(), fx.work_dir.clone())
        .perform_restore("broken.sql.gz")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Decompression(_)));
    assert!(db.restored.lock().unwrap().is_empty());
    assert!(fx.local_files().is_empty());
}

#[tokio::test]
async fn test_restore_load_failure_cleans_up() {
    let fx = Fixture::new();
    let db = Arc::new(StubDatabase {
        fail_restore: true,
        ..StubDatabase::new(&fx.work_dir)
    });
    let storage = fx.local_storage();

    let report = BackupManager::new(db.clone(), storage.clone(), None, fx.backup_config(true))
        .perform_backup()
        .await
        .unwrap();

    let err = RestoreManager::new(db.clone(), storage, fx.work_dir.clone())
        .perform_restore(&report.remote_name)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Load(_)));
    assert!(err.to_string().starts_with("database restore failed: psql restore failed"));
    assert!(fx.local_files().is_empty());
}

#[tokio::test]
async fn test_empty_dump_round_trip() {
    struct EmptyDump(StubDatabase);

    #[async_trait]
    impl Database for EmptyDump {
        fn engine(&self) -> DatabaseType {
            self.0.engine()
        }
        async fn connect(&self) -> Result<()> {
            Ok(())
        }
        async fn test_connection(&self) -> Result<()> {
            Ok(())
        }
        async fn backup(&self, kind: BackupKind) -> Result<BackupArtifact> {
            let artifact = self.0.backup(kind).await?;
            std::fs::write(&artifact.path, b"")?;
            Ok(artifact)
        }
        async fn restore(&self, artifact: &Path) -> Result<()> {
            self.0.restore(artifact).await
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    let fx = Fixture::new();
    let db = Arc::new(EmptyDump(StubDatabase::new(&fx.work_dir)));
    let storage = fx.local_storage();

    for compression in [false, true] {
        let report = BackupManager::new(
            db.clone(),
            storage.clone(),
            None,
            fx.backup_config(compression),
        )
        .perform_backup()
        .await
        .unwrap();

        RestoreManager::new(db.clone(), storage.clone(), fx.work_dir.clone())
            .perform_restore(&report.remote_name)
            .await
            .unwrap();
    }

    let restored = db.0.restored.lock().unwrap().clone();
    assert_eq!(restored.len(), 2);
    assert!(restored.iter().all(|(_, bytes)| bytes.is_empty()));
    assert!(fx.local_files().is_empty());
}

#[tokio::test]
async fn test_backup_refuses_work_dir_at_storage_root() {
    let fx = Fixture::new();
    std::fs::create_dir_all(&fx.remote_dir).unwrap();
    let existing = fx.remote_dir.join("backup_pg_shop_20240101_000000.sql");
    std::fs::write(&existing, PAYLOAD).unwrap();

    let db = Arc::new(StubDatabase::new(&fx.remote_dir));
    let notifier = Arc::new(RecordingNotifier::default());
    let config = BackupConfig {
        work_dir: fx.remote_dir.clone(),
        ..fx.backup_config(false)
    };

    let err = BackupManager::new(db.clone(), fx.local_storage(), Some(notifier.clone()), config)
        .perform_backup()
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Configuration(_)));
    assert_eq!(db.backups.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read(&existing).unwrap(), PAYLOAD);
    assert_eq!(regular_files(&fx.remote_dir).len(), 1);
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Backup failed: configuration error: "));
}

#[tokio::test]
async fn test_backup_refuses_work_dir_below_storage_root() {
    let fx = Fixture::new();
    let staging = fx.remote_dir.join("staging");
    let db = Arc::new(StubDatabase::new(&staging));
    let config = BackupConfig {
        work_dir: staging.clone(),
        ..fx.backup_config(true)
    };

    let err = BackupManager::new(db.clone(), fx.local_storage(), None, config)
        .perform_backup()
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Configuration(_)));
    assert_eq!(db.backups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_restore_refuses_work_dir_inside_storage_root() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.remote_dir.join("staging")).unwrap();
    std::fs::write(fx.remote_dir.join("plain.sql"), PAYLOAD).unwrap();
    std::fs::write(fx.remote_dir.join("staging").join("nested.sql"), PAYLOAD).unwrap();
    let db = Arc::new(StubDatabase::new(&fx.work_dir));

    for (work_dir, name) in [
        (fx.remote_dir.clone(), "plain.sql"),
        (fx.remote_dir.join("staging"), "staging/nested.sql"),
    ] {
        let err = RestoreManager::new(db.clone(), fx.local_storage(), work_dir)
            .perform_restore(name)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    assert!(db.restored.lock().unwrap().is_empty());
    assert_eq!(std::fs::read(fx.remote_dir.join("plain.sql")).unwrap(), PAYLOAD);
    assert_eq!(
        std::fs::read(fx.remote_dir.join("staging").join("nested.sql")).unwrap(),
        PAYLOAD
    );
}

#[tokio::test]
async fn test_storage_root_inside_work_dir_is_allowed() {
    let dir = TempDir::new().unwrap();
    let work_dir = dir.path().to_path_buf();
    let storage = storage_at(&dir.path().join("remote"));
    let db = Arc::new(StubDatabase::new(&work_dir));
    let config = BackupConfig {
        work_dir: work_dir.clone(),
        ..Default::default()
    };

    let report = BackupManager::new(db.clone(), storage.clone(), None, config)
        .perform_backup()
        .await
        .unwrap();
    RestoreManager::new(db.clone(), storage, work_dir.clone())
        .perform_restore(&report.remote_name)
        .await
        .unwrap();

    assert!(dir.path().join("remote").join(&report.remote_name).is_file());
    assert_eq!(db.restored.lock().unwrap()[0].1, PAYLOAD);
    assert!(regular_files(&work_dir).is_empty());
}
