//! Schema snapshot persistence.
//!
//! After each generated migration the full target model is written next
//! to the plan files. The next `migrate add` diffs against this snapshot
//! instead of introspecting the database, so plan generation needs no
//! connection at all.

use std::path::Path;

use strata_core::error::{Result, StrataError};
use strata_core::schema::SchemaModel;

/// Load a snapshot if one exists.
pub fn load(path: impl AsRef<Path>) -> Result<Option<SchemaModel>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let model = serde_json::from_str(&content)
        .map_err(|e| StrataError::Plan(format!("invalid snapshot file {:?}: {}", path, e)))?;
    Ok(Some(model))
}

/// Write the snapshot, creating parent directories as needed.
pub fn save(path: impl AsRef<Path>, model: &SchemaModel) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(model)?;
    std::fs::write(path, content)?;
    Ok(())
}
