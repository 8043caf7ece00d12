//! Database engine adapters.
//!
//! - **PostgreSQL**: SQLx ping, `pg_dump` / `psql`
//! - **MySQL**: SQLx ping, `mysqldump` / `mysql`
//! - **MongoDB**: driver ping, `mongodump` / `mongorestore`
//!
//! Each adapter implements the `Database` trait.

mod factory;
mod mongo;
mod mysql;
mod postgres;
pub mod tool;

pub use factory::DatabaseFactory;
pub use mongo::MongoDatabase;
pub use mysql::MySqlDatabase;
pub use postgres::PostgresDatabase;
