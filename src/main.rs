//! Schema Migrator - Application Entry Point
//!
//! Applies the league simulator schema files to a PostgreSQL database and exits.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Parse the connection string and create the database connection pool
//! 3. Probe the database
//! 4. Run the schema files in order
//! 5. Release the pool and exit (non-zero on any failure)

use schema_migrator::{LedgerMode, MigrateError, Migrator, config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env().map_err(MigrateError::from)?;
    if config.uses_fallback_url() {
        tracing::warn!("DATABASE_URL not set, using local development fallback");
    }
    tracing::info!(schemas_dir = %config.schemas_dir.display(), "Configuration loaded");

    let migrator = Migrator::new(config.database_url(), config.schemas_dir.clone())
        .with_ledger(LedgerMode::from_flag(config.migration_ledger));

    // Pool is created, probed, used and released inside run()
    let report = migrator.run().await.inspect_err(|e| {
        tracing::error!(error = %e, "Migration run failed");
    })?;

    tracing::info!(
        files = report.entries().len(),
        "Database migrations complete"
    );

    Ok(())
}
