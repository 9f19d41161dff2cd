//! Error types for the migration run.
//!
//! Every failure the tool can hit is a variant of [`MigrateError`]. Most are
//! fatal and abort the run; `MigrationFileMissing` is only logged.

use crate::models::migration::MigrationReport;

/// Migration-wide error type.
///
/// # Error Categories
///
/// - **Configuration Errors**: bad environment or malformed connection URI
/// - **Connectivity Errors**: the liveness probe could not reach the database
/// - **File Errors**: schema files missing (non-fatal) or unreadable
/// - **Execution Errors**: the server rejected a schema batch
/// - **Ledger Errors**: the applied-file ledger could not be read or written
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Environment variables could not be deserialized into `Config`.
    #[error("Invalid configuration: {0}")]
    Config(#[from] envy::Error),

    /// The connection string is not a valid URI, or has no host or database.
    ///
    /// The reason never includes the password.
    #[error("Malformed connection URI: {reason}")]
    MalformedUri { reason: String },

    /// The database is unreachable or rejected the liveness query.
    #[error("Database liveness probe failed: {0}")]
    ProbeFailed(#[source] sqlx::Error),

    /// A named schema file does not exist. Logged, then the file is skipped.
    #[error("Migration file not found: {file}")]
    MigrationFileMissing { file: String },

    /// A schema file exists but could not be read.
    #[error("Migration file could not be read: {file}")]
    MigrationFileUnreadable {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// The server rejected a schema file's SQL batch.
    #[error("Migration failed: {file}: {source}")]
    MigrationExecutionFailed {
        file: String,
        #[source]
        source: sqlx::Error,
    },

    /// A file recorded in the ledger has changed since it was applied.
    #[error("Migration {file} was modified after being applied (recorded {recorded}, now {current})")]
    ChecksumMismatch {
        file: String,
        recorded: String,
        current: String,
    },

    /// The applied-file ledger could not be created, read or written.
    #[error("Migration ledger error: {0}")]
    Ledger(#[source] sqlx::Error),

    /// A run stopped at a fatal file error.
    ///
    /// Carries the per-file report so callers can see which files were
    /// applied before the failure and which were never attempted.
    #[error("Migration run failed: {cause}")]
    MigrationFailed {
        report: Box<MigrationReport>,
        #[source]
        cause: Box<MigrateError>,
    },
}

impl MigrateError {
    pub(crate) fn malformed_uri(reason: impl Into<String>) -> Self {
        MigrateError::MalformedUri {
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MigrateError::MigrationFileMissing { .. })
    }

    /// Name of the schema file involved, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            MigrateError::MigrationFileMissing { file }
            | MigrateError::MigrationFileUnreadable { file, .. }
            | MigrateError::MigrationExecutionFailed { file, .. }
            | MigrateError::ChecksumMismatch { file, .. } => Some(file),
            MigrateError::MigrationFailed { cause, .. } => cause.file(),
            _ => None,
        }
    }

    /// Per-file report of a failed run, if this error ended one.
    pub fn report(&self) -> Option<&MigrationReport> {
        match self {
            MigrateError::MigrationFailed { report, .. } => Some(&**report),
            _ => None,
        }
    }
}

pub type MigrateResult<T> = Result<T, MigrateError>;
