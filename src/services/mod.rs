//! Migration services.
//!
//! The runner applies schema files; the lifecycle controller owns the pool
//! and drives a complete run.

pub mod lifecycle;
pub mod migration_service;
