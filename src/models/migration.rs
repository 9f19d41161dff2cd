//! Migration plan and per-file results.
//!
//! This module defines:
//! - `MigrationFile`: one schema file at a fixed position in the plan
//! - `MigrationPlan`: the hand-specified, ordered list of schema files
//! - `FileStatus` / `MigrationReport`: what happened to each file in a run

use crate::error::MigrateError;
use std::path::{Path, PathBuf};

/// Schema files applied on every run, in order.
///
/// Later files may depend on objects created by earlier ones, so this list
/// is never derived from a directory listing.
pub const SCHEMA_FILES: [&str; 2] = ["nfl-schema.sql", "mma-schema.sql"];

/// A schema file at a fixed position in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File name, e.g. `nfl-schema.sql`
    pub name: String,

    /// 0-based position in the plan
    pub position: usize,

    /// Full path the file is read from
    pub path: PathBuf,
}

/// Ordered sequence of schema files resolved against a schema directory.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    files: Vec<MigrationFile>,
}

impl MigrationPlan {
    /// Build a plan from file names, keeping the given order.
    pub fn new<I, S>(schemas_dir: impl AsRef<Path>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dir = schemas_dir.as_ref();
        let files = names
            .into_iter()
            .enumerate()
            .map(|(position, name)| {
                let name = name.into();
                MigrationFile {
                    path: dir.join(&name),
                    name,
                    position,
                }
            })
            .collect();

        Self { files }
    }

    /// The default plan: [`SCHEMA_FILES`] inside `schemas_dir`.
    pub fn standard(schemas_dir: impl AsRef<Path>) -> Self {
        Self::new(schemas_dir, SCHEMA_FILES)
    }

    pub fn files(&self) -> &[MigrationFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Outcome of a single schema file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// SQL batch executed successfully
    Applied,

    /// Ledger already holds this file with the same checksum; not executed
    AlreadyApplied,

    /// File does not exist on disk
    Skipped,

    /// Reading or executing the file failed; the String is the cause
    Failed(String),

    /// An earlier file failed, so this one was never tried
    NotAttempted,
}

/// Result entry for one file of the plan.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub file: MigrationFile,
    pub status: FileStatus,
}

/// Results of a whole run, one entry per planned file.
///
/// The run succeeded only if no file failed. The first fatal error is kept
/// and returned by [`MigrationReport::into_result`].
#[derive(Debug, Default)]
pub struct MigrationReport {
    entries: Vec<FileReport>,
    failure: Option<MigrateError>,
}

impl MigrationReport {
    pub(crate) fn record(&mut self, file: &MigrationFile, status: FileStatus) {
        self.entries.push(FileReport {
            file: file.clone(),
            status,
        });
    }

    pub(crate) fn fail(&mut self, file: &MigrationFile, error: MigrateError) {
        self.record(file, FileStatus::Failed(error.to_string()));
        self.failure = Some(error);
    }

    pub fn entries(&self) -> &[FileReport] {
        &self.entries
    }

    /// Status of the file with the given name.
    pub fn status_of(&self, name: &str) -> Option<&FileStatus> {
        self.entries
            .iter()
            .find(|entry| entry.file.name == name)
            .map(|entry| &entry.status)
    }

    pub fn succeeded(&self) -> bool {
        !self
            .entries
            .iter()
            .any(|e| matches!(e.status, FileStatus::Failed(_)))
    }

    /// Number of files with the given status.
    pub fn count(&self, status: &FileStatus) -> usize {
        self.entries.iter().filter(|e| &e.status == status).count()
    }

    pub fn failure(&self) -> Option<&MigrateError> {
        self.failure.as_ref()
    }

    /// Turn the report into an error if any file failed.
    pub fn into_result(self) -> Result<Self, MigrateError> {
        match self.failure {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }

    /// Like [`into_result`](Self::into_result), but the error keeps the
    /// per-file entries (`MigrateError::MigrationFailed`).
    pub fn into_run_result(mut self) -> Result<Self, MigrateError> {
        match self.failure.take() {
            Some(cause) => Err(MigrateError::MigrationFailed {
                report: Box::new(self),
                cause: Box::new(cause),
            }),
            None => Ok(self),
        }
    }
}
