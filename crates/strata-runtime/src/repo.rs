//! On-disk migration plan repository.
//!
//! Plans are stored one per file as pretty-printed JSON named
//! `<id>.json`, where the identifier's timestamp prefix keeps
//! lexicographic order equal to creation order.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use strata_core::error::{Result, StrataError};
use strata_core::migrate::MigrationPlan;

/// Repository of migration plan files in a directory.
pub struct PlanRepository {
    dir: PathBuf,
}

impl PlanRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load all plans, ascending by identifier. A missing directory is
    /// an empty repository, not an error.
    pub fn load_all(&self) -> Result<Vec<MigrationPlan>> {
        if !self.dir.exists() {
            debug!("Migrations directory does not exist: {:?}", self.dir);
            return Ok(Vec::new());
        }

        let mut plans = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                // The snapshot lives alongside plan files
                if path
                    .file_name()
                    .map(|n| n == "schema.snapshot.json")
                    .unwrap_or(false)
                {
                    continue;
                }
                let content = std::fs::read_to_string(&path)?;
                let plan: MigrationPlan = serde_json::from_str(&content).map_err(|e| {
                    StrataError::Plan(format!("invalid plan file {:?}: {}", path, e))
                })?;
                plans.push(plan);
            }
        }

        plans.sort_by(|a, b| a.id.cmp(&b.id));
        debug!("Loaded {} migration plans", plans.len());
        Ok(plans)
    }

    /// Write a plan to `<id>.json`.
    pub fn save(&self, plan: &MigrationPlan) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.json", plan.id));
        let content = serde_json::to_string_pretty(plan)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Generate a fresh identifier for a labelled migration.
    pub fn next_id(&self, label: &str) -> String {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let label = label
            .trim()
            .to_lowercase()
            .replace(|c: char| !c.is_ascii_alphanumeric(), "_");
        format!("{}_{}", timestamp, label)
    }
}
