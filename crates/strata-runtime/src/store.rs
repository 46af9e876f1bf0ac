//! Applied-migration history store.
//!
//! The history lives in a table inside the database being migrated, so
//! recording an application shares the transaction of the DDL it
//! records: a failed migration leaves no history row behind.

use std::sync::Arc;

use strata_core::driver::{SchemaDriver, SchemaTx};
use strata_core::error::{Result, StoreError};
use strata_core::migrate::AppliedMigration;

/// Store for the applied-migrations history table.
pub struct MigrationStore {
    driver: Arc<dyn SchemaDriver>,
    history_table: String,
}

impl MigrationStore {
    pub fn new(driver: Arc<dyn SchemaDriver>, history_table: impl Into<String>) -> Self {
        Self {
            driver,
            history_table: history_table.into(),
        }
    }

    pub fn history_table(&self) -> &str {
        &self.history_table
    }

    /// Create the history table if missing.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.driver
            .ensure_history_table(&self.history_table)
            .await?;
        Ok(())
    }

    /// Applied migrations, ascending by identifier.
    pub async fn list_applied(&self) -> Result<Vec<AppliedMigration>> {
        Ok(self.driver.list_applied(&self.history_table).await?)
    }

    /// Record a migration as applied inside the given transaction.
    pub async fn record_applied(&self, tx: &mut dyn SchemaTx, id: &str) -> Result<()> {
        if self.list_applied().await?.iter().any(|m| m.id == id) {
            return Err(StoreError::AlreadyApplied(id.to_string()).into());
        }
        tx.insert_applied(&self.history_table, id).await?;
        Ok(())
    }

    /// Remove the most recent history entry inside the given transaction.
    ///
    /// Only the latest applied migration may be reverted; anything else
    /// would leave a gap in the history.
    pub async fn record_reverted(&self, tx: &mut dyn SchemaTx, id: &str) -> Result<()> {
        let applied = self.list_applied().await?;
        let latest = applied
            .last()
            .map(|m| m.id.clone())
            .unwrap_or_else(|| "(none)".to_string());

        if latest != id {
            return Err(StoreError::NotLatest {
                requested: id.to_string(),
                latest,
            }
            .into());
        }

        tx.delete_applied(&self.history_table, id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::error::StrataError;
    use strata_core::testing::MockDriver;

    fn store(driver: &MockDriver) -> MigrationStore {
        MigrationStore::new(Arc::new(driver.clone()), "strata_migrations")
    }

    #[tokio::test]
    async fn test_record_applied_appends() {
        let driver = MockDriver::new();
        let store = store(&driver);

        let mut tx = driver.begin().await.unwrap();
        store.record_applied(tx.as_mut(), "m1").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(driver.applied_ids(), vec!["m1"]);
    }

    #[tokio::test]
    async fn test_record_applied_rejects_duplicate() {
        let driver = MockDriver::new();
        driver.seed_applied(&["m1"]);
        let store = store(&driver);

        let mut tx = driver.begin().await.unwrap();
        let err = store.record_applied(tx.as_mut(), "m1").await.unwrap_err();
        assert!(matches!(
            err,
            StrataError::Store(StoreError::AlreadyApplied(_))
        ));
    }

    #[tokio::test]
    async fn test_record_reverted_requires_latest() {
        let driver = MockDriver::new();
        driver.seed_applied(&["m1", "m2", "m3"]);
        let store = store(&driver);

        let mut tx = driver.begin().await.unwrap();
        let err = store.record_reverted(tx.as_mut(), "m2").await.unwrap_err();
        match err {
            StrataError::Store(StoreError::NotLatest { requested, latest }) => {
                assert_eq!(requested, "m2");
                assert_eq!(latest, "m3");
            }
            other => panic!("expected NotLatest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_record_reverted_removes_latest() {
        let driver = MockDriver::new();
        driver.seed_applied(&["m1", "m2"]);
        let store = store(&driver);

        let mut tx = driver.begin().await.unwrap();
        store.record_reverted(tx.as_mut(), "m2").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(driver.applied_ids(), vec!["m1"]);
    }

    #[tokio::test]
    async fn test_list_applied_sorted() {
        let driver = MockDriver::new();
        driver.seed_applied(&["m2", "m1"]);
        let store = store(&driver);

        let applied = store.list_applied().await.unwrap();
        let ids: Vec<&str> = applied.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }
}
