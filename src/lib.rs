//! Schema migrator for the league simulator databases.
//!
//! Parses a PostgreSQL connection URI, builds a lazily connecting pool,
//! checks that the database answers, then applies a fixed, ordered list of
//! schema files. See [`services::lifecycle::Migrator`] for the entry point.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use db::{Database, DbPool};
pub use error::{MigrateError, MigrateResult};
pub use models::connection::ConnectionConfig;
pub use models::migration::{FileStatus, MigrationFile, MigrationPlan, MigrationReport};
pub use services::lifecycle::{Migrator, RunState};
pub use services::migration_service::{LedgerMode, run_migrations};
