pub mod artifact;
pub mod backup;
pub mod compression;
pub mod database;
pub mod notifier;
pub mod restore;
pub mod storage;

pub use backup::{BackupManager, BackupReport};
pub use restore::RestoreManager;
