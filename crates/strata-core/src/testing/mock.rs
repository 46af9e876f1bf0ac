//! In-memory driver for testing runner and store semantics.
//!
//! Records every DDL statement, keeps the applied-migrations history in
//! memory, and supports scripted failures so transaction rollback paths
//! can be exercised without a database.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::driver::{SchemaDriver, SchemaTx};
use crate::error::DriverError;
use crate::migrate::AppliedMigration;

#[derive(Default)]
struct MockState {
    /// DDL statements from committed transactions, in execution order.
    committed_sql: Vec<String>,
    /// In-memory history table.
    applied: Vec<AppliedMigration>,
    /// Total execute_ddl calls seen, committed or not.
    statements_seen: usize,
    /// Fail the Nth execute_ddl call (1-based).
    fail_at_statement: Option<usize>,
    /// Fail any execute_ddl whose SQL contains this fragment.
    fail_matching: Option<String>,
    lock_held: bool,
    lock_acquisitions: usize,
    history_table_ready: bool,
}

/// Mock implementation of [`SchemaDriver`].
///
/// # Example
///
/// ```ignore
/// let driver = MockDriver::new();
/// driver.fail_at_statement(3);
/// // run the migration under test...
/// driver.assert_executed("CREATE TABLE blogs");
/// assert_eq!(driver.applied_ids(), vec!["m1"]);
/// ```
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a failure on the Nth execute_ddl call (1-based, counted
    /// across all transactions).
    pub fn fail_at_statement(&self, n: usize) {
        self.state.lock().unwrap().fail_at_statement = Some(n);
    }

    /// Script a failure on any statement containing the fragment.
    pub fn fail_matching(&self, fragment: &str) {
        self.state.lock().unwrap().fail_matching = Some(fragment.to_string());
    }

    /// Pre-populate the history table.
    pub fn seed_applied(&self, ids: &[&str]) {
        let mut state = self.state.lock().unwrap();
        for id in ids {
            state.applied.push(AppliedMigration {
                id: id.to_string(),
                applied_at: Utc::now(),
            });
        }
    }

    /// DDL statements from committed transactions.
    pub fn committed_sql(&self) -> Vec<String> {
        self.state.lock().unwrap().committed_sql.clone()
    }

    /// Identifiers currently in the history table.
    pub fn applied_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .applied
            .iter()
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn lock_held(&self) -> bool {
        self.state.lock().unwrap().lock_held
    }

    pub fn lock_acquisitions(&self) -> usize {
        self.state.lock().unwrap().lock_acquisitions
    }

    /// Assert that a committed statement contains the fragment.
    pub fn assert_executed(&self, fragment: &str) {
        let state = self.state.lock().unwrap();
        assert!(
            state.committed_sql.iter().any(|s| s.contains(fragment)),
            "no committed statement contains '{}'; committed: {:#?}",
            fragment,
            state.committed_sql
        );
    }

    /// Assert that no committed statement contains the fragment.
    pub fn assert_not_executed(&self, fragment: &str) {
        let state = self.state.lock().unwrap();
        assert!(
            !state.committed_sql.iter().any(|s| s.contains(fragment)),
            "unexpected committed statement containing '{}'",
            fragment
        );
    }
}

#[async_trait]
impl SchemaDriver for MockDriver {
    async fn acquire_lock(&self, _key: i64) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.lock_held = true;
        state.lock_acquisitions += 1;
        Ok(())
    }

    async fn release_lock(&self, _key: i64) -> Result<(), DriverError> {
        self.state.lock().unwrap().lock_held = false;
        Ok(())
    }

    async fn ensure_history_table(&self, _history_table: &str) -> Result<(), DriverError> {
        self.state.lock().unwrap().history_table_ready = true;
        Ok(())
    }

    async fn list_applied(
        &self,
        _history_table: &str,
    ) -> Result<Vec<AppliedMigration>, DriverError> {
        let mut applied = self.state.lock().unwrap().applied.clone();
        applied.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(applied)
    }

    async fn begin(&self) -> Result<Box<dyn SchemaTx>, DriverError> {
        Ok(Box::new(MockTx {
            state: Arc::clone(&self.state),
            pending_sql: Vec::new(),
            pending_inserts: Vec::new(),
            pending_deletes: Vec::new(),
        }))
    }
}

/// Buffered mock transaction; mutations land in the driver state only
/// on commit.
struct MockTx {
    state: Arc<Mutex<MockState>>,
    pending_sql: Vec<String>,
    pending_inserts: Vec<AppliedMigration>,
    pending_deletes: Vec<String>,
}

#[async_trait]
impl SchemaTx for MockTx {
    async fn execute_ddl(&mut self, sql: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.statements_seen += 1;

        if state.fail_at_statement == Some(state.statements_seen) {
            return Err(DriverError::Execution(format!(
                "scripted failure at statement {}",
                state.statements_seen
            )));
        }
        if let Some(ref fragment) = state.fail_matching {
            if sql.contains(fragment.as_str()) {
                return Err(DriverError::Execution(format!(
                    "scripted failure matching '{}'",
                    fragment
                )));
            }
        }

        self.pending_sql.push(sql.to_string());
        Ok(())
    }

    async fn insert_applied(&mut self, _history_table: &str, id: &str) -> Result<(), DriverError> {
        let state = self.state.lock().unwrap();
        let duplicate = state.applied.iter().any(|m| m.id == id)
            || self.pending_inserts.iter().any(|m| m.id == id);
        drop(state);

        if duplicate {
            return Err(DriverError::ConstraintViolation(format!(
                "duplicate key value violates unique constraint: {}",
                id
            )));
        }

        self.pending_inserts.push(AppliedMigration {
            id: id.to_string(),
            applied_at: Utc::now(),
        });
        Ok(())
    }

    async fn delete_applied(&mut self, _history_table: &str, id: &str) -> Result<(), DriverError> {
        self.pending_deletes.push(id.to_string());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.committed_sql.extend(self.pending_sql);
        state.applied.extend(self.pending_inserts);
        state
            .applied
            .retain(|m| !self.pending_deletes.contains(&m.id));
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        // Buffered mutations are simply dropped.
        Ok(())
    }
}
