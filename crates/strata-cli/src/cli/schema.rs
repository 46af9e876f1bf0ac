use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;

use strata_core::schema::SchemaModel;

/// Inspect and validate schema models.
#[derive(Parser)]
pub struct SchemaCommand {
    #[command(subcommand)]
    pub action: SchemaAction,
}

#[derive(Subcommand)]
pub enum SchemaAction {
    /// Validate a schema model file.
    Check {
        /// Path to the schema model (JSON).
        #[arg(long)]
        model: PathBuf,
    },
}

impl SchemaCommand {
    pub async fn execute(self) -> Result<()> {
        match self.action {
            SchemaAction::Check { model } => {
                let parsed = load_model(&model)?;
                parsed.validate()?;
                println!(
                    "  {} Schema model is valid: {} table(s)",
                    style("✓").green(),
                    parsed.len()
                );
            }
        }
        Ok(())
    }
}

/// Load a schema model from a JSON file.
pub fn load_model(path: &Path) -> Result<SchemaModel> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema model {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid schema model {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::schema::{ColumnDef, SqlType, TableDef};
    use tempfile::TempDir;

    #[test]
    fn test_load_model_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");

        let model = SchemaModel::new().with_table(
            TableDef::new("blogs")
                .with_column(ColumnDef::new("blog_id", SqlType::Integer).auto_increment())
                .with_primary_key(&["blog_id"]),
        );
        std::fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();

        assert_eq!(load_model(&path).unwrap(), model);
    }

    #[test]
    fn test_load_model_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{oops").unwrap();

        assert!(load_model(&path).is_err());
    }
}
