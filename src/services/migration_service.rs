//! Migration runner - applies the schema files of a plan in order.
//!
//! Each file is read in full and sent to the server as one batch. Whether a
//! file runs inside a transaction is up to the SQL it contains; the runner
//! does not wrap it.
//!
//! # Failure Handling
//!
//! - Missing file: logged and skipped, the run continues
//! - Unreadable file or rejected batch: the run stops, remaining files are
//!   marked not attempted
//!
//! Nothing is rolled back across files: files applied before a failure stay
//! applied.

use crate::{
    db::Database,
    error::MigrateError,
    models::migration::{FileStatus, MigrationFile, MigrationPlan, MigrationReport},
};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;

/// Whether applied files are tracked in the ledger table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LedgerMode {
    /// Every file is executed on every run
    #[default]
    Untracked,

    /// Files are recorded after they run and skipped when unchanged
    Tracked,
}

impl LedgerMode {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            LedgerMode::Tracked
        } else {
            LedgerMode::Untracked
        }
    }
}

/// Apply every file of `plan` in order, stopping at the first failure.
///
/// With `LedgerMode::Tracked`, the ledger table must already exist (see
/// [`Database::ensure_ledger`]).
///
/// # Returns
///
/// A report with one entry per planned file. Use
/// [`MigrationReport::into_result`] to surface the failure, if any.
pub async fn run_migrations<D: Database>(
    db: &D,
    plan: &MigrationPlan,
    ledger: LedgerMode,
) -> MigrationReport {
    let mut report = MigrationReport::default();
    let mut files = plan.files().iter();

    for file in files.by_ref() {
        tracing::debug!(file = %file.name, position = file.position, "Migrating file");

        match apply_file(db, file, ledger).await {
            Ok(status) => report.record(file, status),
            Err(e) if !e.is_fatal() => {
                tracing::warn!(file = %file.name, path = %file.path.display(), "{}", e);
                report.record(file, FileStatus::Skipped);
            }
            Err(e) => {
                tracing::error!(file = %file.name, error = %e, "Migration failed");
                report.fail(file, e);
                break;
            }
        }
    }

    for file in files {
        report.record(file, FileStatus::NotAttempted);
    }

    report
}

/// Read one file and execute it, consulting the ledger if enabled.
async fn apply_file<D: Database>(
    db: &D,
    file: &MigrationFile,
    ledger: LedgerMode,
) -> Result<FileStatus, MigrateError> {
    let sql = match tokio::fs::read_to_string(&file.path).await {
        Ok(sql) => sql,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(MigrateError::MigrationFileMissing {
                file: file.name.clone(),
            });
        }
        Err(source) => {
            return Err(MigrateError::MigrationFileUnreadable {
                file: file.name.clone(),
                source,
            });
        }
    };

    let checksum = checksum(&sql);

    if ledger == LedgerMode::Tracked {
        let recorded = db
            .applied_checksum(&file.name)
            .await
            .map_err(MigrateError::Ledger)?;

        match recorded {
            Some(recorded) if recorded == checksum => {
                tracing::info!(file = %file.name, "Migration already applied, skipping");
                return Ok(FileStatus::AlreadyApplied);
            }
            Some(recorded) => {
                return Err(MigrateError::ChecksumMismatch {
                    file: file.name.clone(),
                    recorded,
                    current: checksum,
                });
            }
            None => {}
        }
    }

    tracing::info!(file = %file.name, "Running migration");

    db.execute_batch(&sql)
        .await
        .map_err(|source| MigrateError::MigrationExecutionFailed {
            file: file.name.clone(),
            source,
        })?;

    if ledger == LedgerMode::Tracked {
        db.record_applied(&file.name, &checksum)
            .await
            .map_err(MigrateError::Ledger)?;
    }

    tracing::info!(file = %file.name, "Migration completed");
    Ok(FileStatus::Applied)
}

/// SHA-256 of a schema file's contents, hex encoded.
pub fn checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    hex::encode(hasher.finalize())
}
