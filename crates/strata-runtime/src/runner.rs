//! Migration runner.
//!
//! Applies pending migration plans in identifier order, one transaction
//! per plan, under an exclusive advisory lock. A failure rolls back the
//! in-flight plan, halts the run, and names the migration and operation
//! that failed; plans committed earlier stay applied.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use strata_core::config::MigratorConfig;
use strata_core::driver::{SchemaDriver, SchemaTx};
use strata_core::error::{Result, RunError, StoreError, StrataError};
use strata_core::migrate::MigrationPlan;
use strata_core::schema::SchemaModel;

use crate::store::MigrationStore;

/// Result of running pending migrations.
#[derive(Debug)]
pub struct RunReport {
    /// Identifiers applied by this run, in order.
    pub applied: Vec<String>,
    /// Plans skipped because they were already applied.
    pub skipped: usize,
    /// Total execution time in milliseconds.
    pub execution_time_ms: u128,
}

/// Result of reverting migrations.
#[derive(Debug)]
pub struct RevertReport {
    /// Identifiers reverted by this run, in order.
    pub reverted: Vec<String>,
    /// Total execution time in milliseconds.
    pub execution_time_ms: u128,
}

/// Where a known plan stands against the history table.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationState {
    Pending,
    Applied { applied_at: DateTime<Utc> },
}

/// Status line for one migration plan.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub id: String,
    pub name: String,
    pub state: MigrationState,
}

/// Migration runner bound to one database.
pub struct MigrationRunner {
    driver: Arc<dyn SchemaDriver>,
    store: MigrationStore,
    lock_key: i64,
}

impl MigrationRunner {
    pub fn new(driver: Arc<dyn SchemaDriver>, config: &MigratorConfig) -> Self {
        let store = MigrationStore::new(Arc::clone(&driver), config.history_table.clone());
        Self {
            driver,
            store,
            lock_key: config.lock_key,
        }
    }

    pub fn store(&self) -> &MigrationStore {
        &self.store
    }

    /// Apply all pending plans, stopping at `target` (inclusive) when
    /// given. Nothing pending is a successful no-op.
    pub async fn up(&self, plans: &[MigrationPlan], target: Option<&str>) -> Result<RunReport> {
        self.driver.acquire_lock(self.lock_key).await?;
        let result = self.up_inner(plans, target).await;
        if let Err(e) = self.driver.release_lock(self.lock_key).await {
            warn!("Failed to release migration lock: {}", e);
        }
        result
    }

    async fn up_inner(&self, plans: &[MigrationPlan], target: Option<&str>) -> Result<RunReport> {
        let start = std::time::Instant::now();

        self.store.ensure_ready().await?;

        let candidates = sorted_candidates(plans)?;
        let applied = self.store.list_applied().await?;
        check_prefix(
            &applied.iter().map(|m| m.id.clone()).collect::<Vec<_>>(),
            &candidates,
        )?;

        let mut pending: Vec<&MigrationPlan> = candidates[applied.len()..].to_vec();
        if let Some(target) = target {
            if !candidates.iter().any(|p| p.id == target) {
                return Err(StrataError::Plan(format!(
                    "unknown target migration '{}'",
                    target
                )));
            }
            pending.retain(|p| p.id.as_str() <= target);
        }

        // Structural pre-flight: replay pending plans over the already
        // applied model so schema errors surface before any DDL runs.
        let mut preflight = replay(&candidates[..applied.len()])?;
        for plan in &pending {
            plan.apply_to(&mut preflight).map_err(StrataError::from)?;
            preflight.validate()?;
        }

        let mut report = RunReport {
            applied: Vec::new(),
            skipped: applied.len(),
            execution_time_ms: 0,
        };

        for plan in pending {
            self.apply_plan(plan).await?;
            report.applied.push(plan.id.clone());
        }

        report.execution_time_ms = start.elapsed().as_millis();
        Ok(report)
    }

    async fn apply_plan(&self, plan: &MigrationPlan) -> Result<()> {
        info!(id = %plan.id, name = %plan.name, "Applying migration");
        for warning in &plan.warnings {
            warn!(id = %plan.id, "{}", warning);
        }

        let mut tx = self.driver.begin().await?;

        for (index, op) in plan.operations.iter().enumerate() {
            if let Err(source) = tx.execute_ddl(&op.to_sql()).await {
                self.abort(tx).await;
                return Err(RunError {
                    migration_id: plan.id.clone(),
                    operation_index: index,
                    source,
                }
                .into());
            }
        }

        if let Err(e) = self.store.record_applied(tx.as_mut(), &plan.id).await {
            self.abort(tx).await;
            return Err(e);
        }

        if let Err(source) = tx.commit().await {
            return Err(RunError {
                migration_id: plan.id.clone(),
                operation_index: plan.operations.len(),
                source,
            }
            .into());
        }

        info!(id = %plan.id, "Migration applied");
        Ok(())
    }

    /// Revert the latest applied migration, or `target` if it is the
    /// latest. Reverting further back one step at a time keeps the
    /// history contiguous.
    pub async fn down(&self, plans: &[MigrationPlan], target: Option<&str>) -> Result<RevertReport> {
        self.driver.acquire_lock(self.lock_key).await?;
        let result = self.down_inner(plans, target).await;
        if let Err(e) = self.driver.release_lock(self.lock_key).await {
            warn!("Failed to release migration lock: {}", e);
        }
        result
    }

    async fn down_inner(
        &self,
        plans: &[MigrationPlan],
        target: Option<&str>,
    ) -> Result<RevertReport> {
        let start = std::time::Instant::now();

        self.store.ensure_ready().await?;

        let applied = self.store.list_applied().await?;
        let Some(latest) = applied.last() else {
            return Ok(RevertReport {
                reverted: Vec::new(),
                execution_time_ms: start.elapsed().as_millis(),
            });
        };

        let requested = target.unwrap_or(latest.id.as_str());
        // Refuse non-latest reverts before any DDL is prepared.
        if requested != latest.id {
            return Err(StoreError::NotLatest {
                requested: requested.to_string(),
                latest: latest.id.clone(),
            }
            .into());
        }

        let plan = plans
            .iter()
            .find(|p| p.id == requested)
            .ok_or_else(|| {
                StrataError::Plan(format!(
                    "no plan file found for applied migration '{}'",
                    requested
                ))
            })?;

        self.revert_plan(plan).await?;

        Ok(RevertReport {
            reverted: vec![plan.id.clone()],
            execution_time_ms: start.elapsed().as_millis(),
        })
    }

    async fn revert_plan(&self, plan: &MigrationPlan) -> Result<()> {
        info!(id = %plan.id, name = %plan.name, "Reverting migration");

        let mut tx = self.driver.begin().await?;

        for (index, op) in plan.down.iter().enumerate() {
            if let Err(source) = tx.execute_ddl(&op.to_sql()).await {
                self.abort(tx).await;
                return Err(RunError {
                    migration_id: plan.id.clone(),
                    operation_index: index,
                    source,
                }
                .into());
            }
        }

        if let Err(e) = self.store.record_reverted(tx.as_mut(), &plan.id).await {
            self.abort(tx).await;
            return Err(e);
        }

        if let Err(source) = tx.commit().await {
            return Err(RunError {
                migration_id: plan.id.clone(),
                operation_index: plan.down.len(),
                source,
            }
            .into());
        }

        info!(id = %plan.id, "Migration reverted");
        Ok(())
    }

    async fn abort(&self, tx: Box<dyn SchemaTx>) {
        if let Err(e) = tx.rollback().await {
            warn!("Failed to roll back migration transaction: {}", e);
        }
    }

    /// Status of every known plan against the history table.
    pub async fn status(&self, plans: &[MigrationPlan]) -> Result<Vec<MigrationStatus>> {
        self.store.ensure_ready().await?;

        let candidates = sorted_candidates(plans)?;
        let applied: HashMap<String, DateTime<Utc>> = self
            .store
            .list_applied()
            .await?
            .into_iter()
            .map(|m| (m.id, m.applied_at))
            .collect();

        Ok(candidates
            .into_iter()
            .map(|plan| MigrationStatus {
                id: plan.id.clone(),
                name: plan.name.clone(),
                state: match applied.get(&plan.id) {
                    Some(at) => MigrationState::Applied { applied_at: *at },
                    None => MigrationState::Pending,
                },
            })
            .collect())
    }

    /// Reconstruct the current schema by replaying applied plans onto an
    /// empty model.
    pub async fn current_model(&self, plans: &[MigrationPlan]) -> Result<SchemaModel> {
        self.store.ensure_ready().await?;

        let candidates = sorted_candidates(plans)?;
        let applied = self.store.list_applied().await?;
        check_prefix(
            &applied.iter().map(|m| m.id.clone()).collect::<Vec<_>>(),
            &candidates,
        )?;

        replay(&candidates[..applied.len()])
    }
}

/// Candidates sorted ascending by identifier, rejecting duplicates.
fn sorted_candidates(plans: &[MigrationPlan]) -> Result<Vec<&MigrationPlan>> {
    let mut candidates: Vec<&MigrationPlan> = plans.iter().collect();
    candidates.sort_by(|a, b| a.id.cmp(&b.id));

    for pair in candidates.windows(2) {
        if pair[0].id == pair[1].id {
            return Err(StrataError::Plan(format!(
                "duplicate migration identifier '{}'",
                pair[0].id
            )));
        }
    }
    Ok(candidates)
}

/// The applied history must be an in-order prefix of the known plans:
/// no gaps, no unknown entries, no out-of-order application.
fn check_prefix(applied: &[String], candidates: &[&MigrationPlan]) -> Result<()> {
    if applied.len() > candidates.len() {
        return Err(StoreError::HistoryDiverged(format!(
            "{} migrations applied but only {} known",
            applied.len(),
            candidates.len()
        ))
        .into());
    }
    for (a, c) in applied.iter().zip(candidates) {
        if a != &c.id {
            return Err(StoreError::HistoryDiverged(format!(
                "applied '{}' does not match known migration '{}'",
                a, c.id
            ))
            .into());
        }
    }
    Ok(())
}

/// Replay plans onto an empty model.
fn replay(plans: &[&MigrationPlan]) -> Result<SchemaModel> {
    let mut model = SchemaModel::new();
    for plan in plans {
        plan.apply_to(&mut model).map_err(StrataError::from)?;
    }
    Ok(model)
}
