use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::schema::SchemaModel;

use super::operation::Operation;

/// An ordered, named, reversible schema delta.
///
/// Immutable once constructed: the diff engine (or a hand-written plan
/// file) produces it, the runner only reads it. Identifiers sort
/// lexicographically in creation order (`YYYYMMDD_HHMMSS_label`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Monotonically sortable identifier.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Operations applied by `up`, in order.
    pub operations: Vec<Operation>,

    /// Operations applied by `down`, in order.
    pub down: Vec<Operation>,

    /// Side effects the operator should know about (e.g. a column
    /// rename expressed as drop + add loses data).
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl MigrationPlan {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        operations: Vec<Operation>,
        down: Vec<Operation>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            operations,
            down,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Replay the up operations onto a model.
    pub fn apply_to(&self, model: &mut SchemaModel) -> Result<(), SchemaError> {
        for op in &self.operations {
            op.apply_to(model)?;
        }
        Ok(())
    }

    /// Replay the down operations onto a model.
    pub fn revert_from(&self, model: &mut SchemaModel) -> Result<(), SchemaError> {
        for op in &self.down {
            op.apply_to(model)?;
        }
        Ok(())
    }
}

/// A migration recorded as applied in the history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMigration {
    /// Migration plan identifier.
    pub id: String,

    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}
