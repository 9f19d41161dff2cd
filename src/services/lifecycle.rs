//! Lifecycle controller for one migration run.
//!
//! # Run Flow
//!
//! 1. Parse the connection URI
//! 2. Create the (lazy) connection pool
//! 3. Probe the database; stop here if it is unreachable
//! 4. Prepare the ledger table when tracking is enabled
//! 5. Apply the schema files in order
//! 6. Release the pool
//!
//! The pool is released at a single point after the body of the run, on
//! every exit path past step 2.

use crate::{
    db::{self, Database},
    error::MigrateError,
    models::{
        connection::ConnectionConfig,
        migration::{FileStatus, MigrationPlan, MigrationReport},
    },
    services::migration_service::{self, LedgerMode},
};
use std::path::PathBuf;

/// Stage a run has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    Configured,
    PoolCreated,
    ProbeOk,
    ProbeFailed,
    MigratingFile(usize),
    AllApplied,
    MigrationFailed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::ProbeFailed | RunState::AllApplied | RunState::MigrationFailed
        )
    }
}

/// Runs the fixed schema plan against one database.
///
/// The connection string is passed in explicitly; nothing here reads the
/// process environment.
#[derive(Clone)]
pub struct Migrator {
    database_url: String,
    plan: MigrationPlan,
    ledger: LedgerMode,
}

impl Migrator {
    /// Migrator for the standard schema files inside `schemas_dir`.
    pub fn new(database_url: impl Into<String>, schemas_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_url: database_url.into(),
            plan: MigrationPlan::standard(schemas_dir.into()),
            ledger: LedgerMode::default(),
        }
    }

    /// Replace the file plan.
    pub fn with_plan(mut self, plan: MigrationPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_ledger(mut self, ledger: LedgerMode) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn plan(&self) -> &MigrationPlan {
        &self.plan
    }

    /// Run against PostgreSQL using the standard pool policy.
    pub async fn run(&self) -> Result<MigrationReport, MigrateError> {
        self.run_with(db::create_pool).await
    }

    /// Run with a custom pool factory.
    ///
    /// The factory is called once, after the URI has been parsed. Whatever it
    /// returns is closed exactly once before this function returns.
    ///
    /// # Errors
    ///
    /// - `MalformedUri`: the connection string did not parse (no pool created)
    /// - `ProbeFailed`: the database was unreachable (no file executed)
    /// - `MigrationFailed`: a file failed; carries the per-file report and the
    ///   runner's error
    /// - `Ledger`: the ledger table could not be created
    pub async fn run_with<D, F>(&self, create_pool: F) -> Result<MigrationReport, MigrateError>
    where
        D: Database,
        F: FnOnce(&ConnectionConfig) -> D,
    {
        let mut state = RunState::Start;
        let config = ConnectionConfig::parse(&self.database_url)?;
        transition(&mut state, RunState::Configured);
        tracing::info!(
            host = %config.host(),
            port = config.port(),
            database = %config.database(),
            tls = config.tls_enabled(),
            "Connecting to database"
        );

        let pool = create_pool(&config);
        transition(&mut state, RunState::PoolCreated);

        let result = self.drive(&pool, &mut state).await;

        // Single release point for every outcome of `drive`
        pool.close().await;
        tracing::debug!(state = ?state, "Connection pool released");

        result
    }

    async fn drive<D: Database>(
        &self,
        pool: &D,
        state: &mut RunState,
    ) -> Result<MigrationReport, MigrateError> {
        if let Err(e) = db::check_connection(pool).await {
            transition(state, RunState::ProbeFailed);
            return Err(MigrateError::ProbeFailed(e));
        }
        transition(state, RunState::ProbeOk);

        if self.ledger == LedgerMode::Tracked {
            if let Err(e) = pool.ensure_ledger().await {
                transition(state, RunState::MigrationFailed);
                return Err(MigrateError::Ledger(e));
            }
        }

        if let Some(first) = self.plan.files().first() {
            transition(state, RunState::MigratingFile(first.position));
        }

        let report = migration_service::run_migrations(pool, &self.plan, self.ledger).await;

        if report.succeeded() {
            transition(state, RunState::AllApplied);
            tracing::info!(
                applied = report.count(&FileStatus::Applied),
                total = self.plan.len(),
                "All migrations completed successfully"
            );
        } else {
            transition(state, RunState::MigrationFailed);
        }

        report.into_run_result()
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The URL may carry a password
        f.debug_struct("Migrator")
            .field("plan", &self.plan)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

fn transition(state: &mut RunState, next: RunState) {
    tracing::debug!(from = ?*state, to = ?next, "Run state changed");
    *state = next;
}
