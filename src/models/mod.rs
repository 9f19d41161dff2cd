//! Data models used by the migration run.

/// Connection URI parsing
pub mod connection;
/// Migration plan and results
pub mod migration;
