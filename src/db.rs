//! Database connection pool and the operations a migration run needs.
//!
//! This module provides:
//! - Building a lazily connecting PostgreSQL pool from a `ConnectionConfig`
//! - The `Database` trait the migration runner drives
//! - A liveness probe that reports reachability as a boolean

use crate::models::connection::ConnectionConfig;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Pool, Postgres};
use std::future::Future;
use std::time::Duration;

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Name of the table that records applied schema files.
pub const LEDGER_TABLE: &str = "_schema_migrations";

/// Sizing and timeout policy of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolPolicy {
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for PoolPolicy {
    fn default() -> Self {
        Self {
            max_connections: 20,
            idle_timeout: Duration::from_millis(30_000),
            acquire_timeout: Duration::from_millis(2_000),
        }
    }
}

/// Connection options for a parsed configuration.
///
/// With TLS enabled the connection uses `sslmode=prefer`: TLS is negotiated
/// when the server offers it and the server certificate is not verified, so
/// self-signed certificates are accepted.
pub fn connect_options(config: &ConnectionConfig) -> PgConnectOptions {
    let ssl_mode = if config.tls_enabled() {
        PgSslMode::Prefer
    } else {
        PgSslMode::Disable
    };

    PgConnectOptions::new()
        .host(config.host())
        .port(config.port())
        .database(config.database())
        .username(config.user())
        .password(config.password())
        .ssl_mode(ssl_mode)
}

/// Create a new PostgreSQL connection pool.
///
/// No connection is opened here; connections are created on first
/// acquisition, so errors (bad host, bad credentials) only show up then.
///
/// # Configuration
///
/// See [`PoolPolicy::default`]: 20 connections, 30 s idle eviction,
/// 2 s acquisition timeout.
///
/// Must be called from within a Tokio runtime.
pub fn create_pool(config: &ConnectionConfig) -> DbPool {
    create_pool_with(config, PoolPolicy::default())
}

pub fn create_pool_with(config: &ConnectionConfig, policy: PoolPolicy) -> DbPool {
    PgPoolOptions::new()
        .max_connections(policy.max_connections)
        .idle_timeout(Some(policy.idle_timeout))
        .acquire_timeout(policy.acquire_timeout)
        .connect_lazy_with(connect_options(config))
}

/// Operations a migration run performs against the database.
///
/// Implemented for [`DbPool`]. `close` consumes the handle, so a pool can be
/// released at most once.
pub trait Database {
    /// Round-trip a trivial query and return the server's clock.
    fn probe(&self) -> impl Future<Output = Result<DateTime<Utc>, sqlx::Error>> + Send;

    /// Execute a (possibly multi-statement) SQL text as one batch.
    fn execute_batch(&self, sql: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Create the applied-file ledger if it does not exist.
    fn ensure_ledger(&self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Checksum recorded for `name`, if it was applied before.
    fn applied_checksum(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<String>, sqlx::Error>> + Send;

    /// Record `name` as applied with the given checksum.
    fn record_applied(
        &self,
        name: &str,
        checksum: &str,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Close every connection held by the pool.
    fn close(self) -> impl Future<Output = ()> + Send;
}

impl Database for DbPool {
    async fn probe(&self) -> Result<DateTime<Utc>, sqlx::Error> {
        sqlx::query_scalar::<_, DateTime<Utc>>("SELECT NOW()")
            .fetch_one(self)
            .await
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), sqlx::Error> {
        // raw_sql runs over the simple query protocol, which accepts many statements
        sqlx::raw_sql(sql).execute(self).await?;
        Ok(())
    }

    async fn ensure_ledger(&self) -> Result<(), sqlx::Error> {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
                name TEXT PRIMARY KEY,
                checksum TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        );
        sqlx::raw_sql(&sql).execute(self).await?;
        Ok(())
    }

    async fn applied_checksum(&self, name: &str) -> Result<Option<String>, sqlx::Error> {
        let sql = format!("SELECT checksum FROM {LEDGER_TABLE} WHERE name = $1");
        sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_optional(self)
            .await
    }

    async fn record_applied(&self, name: &str, checksum: &str) -> Result<(), sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO {LEDGER_TABLE} (name, checksum)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE
            SET checksum = EXCLUDED.checksum,
                applied_at = NOW()
            "#
        );
        sqlx::query(&sql)
            .bind(name)
            .bind(checksum)
            .execute(self)
            .await?;
        Ok(())
    }

    async fn close(self) {
        Pool::close(&self).await;
    }
}

/// Check that the database answers a trivial query.
///
/// Failure is reported, not returned: the caller decides whether to go on.
pub async fn probe_connection<D: Database>(db: &D) -> bool {
    check_connection(db).await.is_ok()
}

/// Like [`probe_connection`], but keeps the cause of a failure.
pub async fn check_connection<D: Database>(db: &D) -> Result<DateTime<Utc>, sqlx::Error> {
    match db.probe().await {
        Ok(now) => {
            tracing::info!(server_time = %now, "Database connected");
            Ok(now)
        }
        Err(e) => {
            tracing::error!(error = %e, "Database connection failed");
            Err(e)
        }
    }
}
