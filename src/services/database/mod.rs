//! Database capability and engine adapters.

pub mod drivers;
mod traits;
mod types;

pub use drivers::{DatabaseFactory, MongoDatabase, MySqlDatabase, PostgresDatabase};
pub use traits::{BoxedDatabase, Database};
pub use types::{BackupKind, DatabaseConfig, DatabaseType};
