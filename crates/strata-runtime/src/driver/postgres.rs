use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;

use strata_core::driver::{SchemaDriver, SchemaTx};
use strata_core::error::DriverError;
use strata_core::migrate::AppliedMigration;

use crate::db::Database;

/// PostgreSQL implementation of the schema driver boundary.
#[derive(Clone)]
pub struct PgDriver {
    pool: PgPool,
}

impl PgDriver {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaDriver for PgDriver {
    async fn acquire_lock(&self, key: i64) -> Result<(), DriverError> {
        debug!(key, "Acquiring migration advisory lock");
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        debug!(key, "Migration advisory lock acquired");
        Ok(())
    }

    async fn release_lock(&self, key: i64) -> Result<(), DriverError> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        debug!(key, "Migration advisory lock released");
        Ok(())
    }

    async fn ensure_history_table(&self, history_table: &str) -> Result<(), DriverError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id TEXT PRIMARY KEY,\n    \
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()\n\
            )",
            history_table
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_applied(
        &self,
        history_table: &str,
    ) -> Result<Vec<AppliedMigration>, DriverError> {
        let sql = format!(
            "SELECT id, applied_at FROM {} ORDER BY id ASC",
            history_table
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        rows.iter()
            .map(|row| {
                Ok(AppliedMigration {
                    id: row.try_get("id").map_err(classify)?,
                    applied_at: row.try_get("applied_at").map_err(classify)?,
                })
            })
            .collect()
    }

    async fn begin(&self) -> Result<Box<dyn SchemaTx>, DriverError> {
        let tx = self.pool.begin().await.map_err(classify)?;
        Ok(Box::new(PgTx { tx }))
    }
}

/// An open PostgreSQL transaction.
struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SchemaTx for PgTx {
    async fn execute_ddl(&mut self, sql: &str) -> Result<(), DriverError> {
        sqlx::query(sql)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn insert_applied(&mut self, history_table: &str, id: &str) -> Result<(), DriverError> {
        let sql = format!("INSERT INTO {} (id) VALUES ($1)", history_table);
        sqlx::query(&sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_applied(&mut self, history_table: &str, id: &str) -> Result<(), DriverError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", history_table);
        sqlx::query(&sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DriverError> {
        self.tx.commit().await.map_err(classify)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        self.tx.rollback().await.map_err(classify)
    }
}

/// Map an sqlx error onto the driver error taxonomy.
fn classify(err: sqlx::Error) -> DriverError {
    match &err {
        sqlx::Error::Io(e) => DriverError::ConnectionLost(e.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            DriverError::ConnectionLost(err.to_string())
        }
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => DriverError::ConstraintViolation(db.to_string()),
            _ => {
                // Class 42 covers syntax errors and unsupported features
                if db.code().map(|c| c.starts_with("42")).unwrap_or(false) {
                    DriverError::SyntaxUnsupported(db.to_string())
                } else {
                    DriverError::Execution(db.to_string())
                }
            }
        },
        _ => DriverError::Execution(err.to_string()),
    }
}
