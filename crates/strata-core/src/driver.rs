use async_trait::async_trait;

use crate::error::DriverError;
use crate::migrate::AppliedMigration;

/// The consumed database boundary.
///
/// The engine never builds SQL connections itself; it talks to the
/// target database through this narrow interface. The runtime crate
/// provides the PostgreSQL implementation, tests use the in-memory mock.
#[async_trait]
pub trait SchemaDriver: Send + Sync {
    /// Acquire the exclusive advisory lock serializing migration runs.
    /// Blocks until acquired.
    async fn acquire_lock(&self, key: i64) -> Result<(), DriverError>;

    /// Release the advisory lock.
    async fn release_lock(&self, key: i64) -> Result<(), DriverError>;

    /// Create the applied-migrations history table if missing.
    async fn ensure_history_table(&self, history_table: &str) -> Result<(), DriverError>;

    /// All applied migrations, ascending by identifier.
    async fn list_applied(&self, history_table: &str)
        -> Result<Vec<AppliedMigration>, DriverError>;

    /// Begin a transaction.
    async fn begin(&self) -> Result<Box<dyn SchemaTx>, DriverError>;
}

/// An open transaction on the target database.
///
/// DDL execution and history bookkeeping share the same transaction so
/// a failed migration leaves neither behind.
#[async_trait]
pub trait SchemaTx: Send {
    /// Execute one DDL statement.
    async fn execute_ddl(&mut self, sql: &str) -> Result<(), DriverError>;

    /// Record a migration as applied.
    async fn insert_applied(&mut self, history_table: &str, id: &str) -> Result<(), DriverError>;

    /// Remove a migration from the history.
    async fn delete_applied(&mut self, history_table: &str, id: &str) -> Result<(), DriverError>;

    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> Result<(), DriverError>;

    /// Roll the transaction back.
    async fn rollback(self: Box<Self>) -> Result<(), DriverError>;
}
