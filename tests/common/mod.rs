//! Shared helpers for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use schema_migrator::Database;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Batches containing this marker are rejected by [`FakeDatabase`].
pub const FAIL_MARKER: &str = "-- fail";

#[derive(Debug, Default)]
pub struct FakeState {
    pub reachable: bool,
    pub ledger_broken: bool,
    pub probes: usize,
    pub executed: Vec<String>,
    pub tables: HashSet<String>,
    pub ledger: HashMap<String, String>,
    pub ledger_created: bool,
    pub closes: usize,
}

/// In-memory stand-in for the PostgreSQL pool.
///
/// `CREATE TABLE` statements are tracked by name, so creating an existing
/// table fails unless the statement says `IF NOT EXISTS`. Clones share
/// state, so a test can keep one handle while the migrator consumes another.
#[derive(Debug, Clone)]
pub struct FakeDatabase {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDatabase {
    pub fn reachable() -> Self {
        Self::with_state(FakeState {
            reachable: true,
            ..FakeState::default()
        })
    }

    pub fn unreachable() -> Self {
        Self::with_state(FakeState::default())
    }

    pub fn with_state(state: FakeState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }
}

impl Database for FakeDatabase {
    async fn probe(&self) -> Result<DateTime<Utc>, sqlx::Error> {
        let mut state = self.state();
        state.probes += 1;
        if state.reachable {
            Ok(Utc::now())
        } else {
            Err(sqlx::Error::PoolTimedOut)
        }
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        state.executed.push(sql.to_string());
        if sql.contains(FAIL_MARKER) {
            return Err(sqlx::Error::Protocol("relation already exists".to_string()));
        }

        // Postgres runs a simple-query batch as one implicit transaction
        let mut created = state.tables.clone();
        for statement in sql.split(';') {
            let words: Vec<String> = statement
                .split(|c: char| c.is_whitespace() || c == '(')
                .filter(|w| !w.is_empty())
                .map(str::to_ascii_uppercase)
                .collect();
            let words: Vec<&str> = words.iter().map(String::as_str).collect();
            let (guarded, name) = match words.as_slice() {
                ["CREATE", "TABLE", "IF", "NOT", "EXISTS", name, ..] => (true, *name),
                ["CREATE", "TABLE", name, ..] => (false, *name),
                _ => continue,
            };
            if !created.insert(name.to_ascii_lowercase()) && !guarded {
                return Err(sqlx::Error::Protocol(format!(
                    "relation \"{}\" already exists",
                    name.to_ascii_lowercase()
                )));
            }
        }
        state.tables = created;
        Ok(())
    }

    async fn ensure_ledger(&self) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        if state.ledger_broken {
            return Err(sqlx::Error::Protocol("permission denied".to_string()));
        }
        state.ledger_created = true;
        Ok(())
    }

    async fn applied_checksum(&self, name: &str) -> Result<Option<String>, sqlx::Error> {
        Ok(self.state().ledger.get(name).cloned())
    }

    async fn record_applied(&self, name: &str, checksum: &str) -> Result<(), sqlx::Error> {
        self.state()
            .ledger
            .insert(name.to_string(), checksum.to_string());
        Ok(())
    }

    async fn close(self) {
        self.state().closes += 1;
    }
}

/// Write `contents` to `dir/name`.
pub fn write_schema(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}
