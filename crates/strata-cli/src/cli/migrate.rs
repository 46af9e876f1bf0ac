use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;

use strata_core::config::StrataConfig;
use strata_core::schema::SchemaModel;
use strata_runtime::diff::SchemaDiff;
use strata_runtime::runner::{MigrationRunner, MigrationState};
use strata_runtime::{Database, PgDriver, PlanRepository};

use super::schema::load_model;

/// Manage database migrations.
#[derive(Parser)]
pub struct MigrateCommand {
    #[command(subcommand)]
    pub action: MigrateAction,

    /// Configuration file path.
    #[arg(short, long, default_value = "strata.toml", global = true)]
    pub config: String,
}

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Apply all pending migrations, optionally stopping at a target.
    Up {
        /// Last migration identifier to apply (inclusive).
        #[arg(long)]
        target: Option<String>,
    },

    /// Revert the latest applied migration.
    Down {
        /// Identifier to revert; must be the latest applied.
        #[arg(long)]
        target: Option<String>,
    },

    /// Show migration status.
    Status,

    /// Generate a migration plan from a target schema model.
    Add {
        /// Migration label, e.g. "create posts".
        name: String,

        /// Path to the target schema model (JSON).
        #[arg(long)]
        model: PathBuf,
    },
}

impl MigrateCommand {
    pub async fn execute(self) -> Result<()> {
        // Load .env if present
        dotenvy::dotenv().ok();

        let config = load_config(&self.config)?;
        let repo = PlanRepository::new(&config.migrator.migrations_dir);
        let plans = repo.load_all()?;

        match self.action {
            MigrateAction::Up { target } => {
                let runner = connect(&config).await?;
                let report = runner.up(&plans, target.as_deref()).await?;

                if report.applied.is_empty() {
                    println!(
                        "  {} Nothing to apply ({} already applied)",
                        style("ℹ").blue(),
                        report.skipped
                    );
                } else {
                    for id in &report.applied {
                        println!("  {} Applied {}", style("✓").green(), style(id).cyan());
                    }
                    println!(
                        "  {} {} migration(s) applied in {}ms",
                        style("✓").green(),
                        report.applied.len(),
                        report.execution_time_ms
                    );
                }
            }

            MigrateAction::Down { target } => {
                let runner = connect(&config).await?;
                let report = runner.down(&plans, target.as_deref()).await?;

                if report.reverted.is_empty() {
                    println!("  {} Nothing to revert", style("ℹ").blue());
                } else {
                    for id in &report.reverted {
                        println!("  {} Reverted {}", style("✓").green(), style(id).cyan());
                    }
                }
            }

            MigrateAction::Status => {
                let runner = connect(&config).await?;
                let statuses = runner.status(&plans).await?;

                if statuses.is_empty() {
                    println!(
                        "  {} No migrations found in {:?}",
                        style("ℹ").blue(),
                        config.migrator.migrations_dir
                    );
                    return Ok(());
                }

                let mut applied = 0;
                for status in &statuses {
                    match &status.state {
                        MigrationState::Applied { applied_at } => {
                            applied += 1;
                            println!(
                                "  {} {} {} ({})",
                                style("✓").green(),
                                style(&status.id).cyan(),
                                status.name,
                                applied_at.format("%Y-%m-%d %H:%M:%S UTC")
                            );
                        }
                        MigrationState::Pending => {
                            println!(
                                "  {} {} {}",
                                style("○").yellow(),
                                style(&status.id).yellow(),
                                status.name
                            );
                        }
                    }
                }
                println!();
                println!(
                    "  {} {} applied, {} pending",
                    style("ℹ").blue(),
                    applied,
                    statuses.len() - applied
                );
            }

            MigrateAction::Add { name, model } => {
                add_migration(&config, &name, &model)?;
            }
        }

        Ok(())
    }
}

/// Load configuration, falling back to defaults when the file is absent.
/// `DATABASE_URL` always wins over the file.
fn load_config(path: &str) -> Result<StrataConfig> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        StrataConfig::from_file(path)?
    } else {
        StrataConfig::default_with_database_url("")
    };

    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = url;
    }

    Ok(config)
}

async fn connect(config: &StrataConfig) -> Result<MigrationRunner> {
    if config.database.url.is_empty() {
        anyhow::bail!("database URL is not configured; set [database].url or DATABASE_URL");
    }
    let db = Database::from_config(&config.database).await?;
    let driver = Arc::new(PgDriver::new(&db));
    Ok(MigrationRunner::new(driver, &config.migrator))
}

/// Generate a migration plan from the target model and update the
/// snapshot. Needs no database connection: the old model is the
/// snapshot, or the replay of every known plan when the snapshot is
/// missing.
fn add_migration(config: &StrataConfig, name: &str, model_path: &Path) -> Result<()> {
    let new = load_model(model_path)?;
    new.validate()?;

    let repo = PlanRepository::new(&config.migrator.migrations_dir);
    let old = match strata_runtime::snapshot::load(&config.migrator.snapshot_path)? {
        Some(model) => model,
        None => replay_all(&repo)?,
    };

    let diff = SchemaDiff::between(&old, &new)?;
    let id = repo.next_id(name);

    let Some(plan) = diff.into_plan(id, name) else {
        println!("  {} No schema changes detected", style("ℹ").blue());
        return Ok(());
    };

    for warning in &plan.warnings {
        println!("  {} {}", style("⚠").yellow(), warning);
    }

    let path = repo.save(&plan)?;
    strata_runtime::snapshot::save(&config.migrator.snapshot_path, &new)?;

    println!(
        "  {} Created {} ({} operation(s))",
        style("✓").green(),
        style(path.display()).cyan(),
        plan.operations.len()
    );
    Ok(())
}

/// Reconstruct the snapshot-equivalent model from the plan files alone.
fn replay_all(repo: &PlanRepository) -> Result<SchemaModel> {
    let mut model = SchemaModel::new();
    for plan in repo.load_all()? {
        plan.apply_to(&mut model)?;
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::schema::{ColumnDef, ForeignKeyDef, IndexDef, OnDelete, SqlType, TableDef};
    use tempfile::TempDir;

    fn blog_post_model() -> SchemaModel {
        let blogs = TableDef::new("blogs")
            .with_column(ColumnDef::new("blog_id", SqlType::Integer).auto_increment())
            .with_column(ColumnDef::new("url", SqlType::Text))
            .with_primary_key(&["blog_id"]);
        let posts = TableDef::new("posts")
            .with_column(ColumnDef::new("post_id", SqlType::Integer).auto_increment())
            .with_column(ColumnDef::new("blog_id", SqlType::Integer))
            .with_column(ColumnDef::new("title", SqlType::Text))
            .with_column(ColumnDef::new("content", SqlType::Text))
            .with_primary_key(&["post_id"])
            .with_index(IndexDef::new("ix_posts_blog_id", &["blog_id"]))
            .with_foreign_key(
                ForeignKeyDef::new("fk_posts_blogs", &["blog_id"], "blogs", &["blog_id"])
                    .on_delete(OnDelete::Cascade)
                    .required(),
            );
        SchemaModel::new().with_table(blogs).with_table(posts)
    }

    fn test_config(dir: &TempDir) -> StrataConfig {
        let mut config = StrataConfig::default_with_database_url("");
        config.migrator.migrations_dir = dir.path().join("migrations");
        config.migrator.snapshot_path = dir.path().join("migrations/schema.snapshot.json");
        config
    }

    fn write_model(dir: &TempDir, model: &SchemaModel) -> PathBuf {
        let path = dir.path().join("model.json");
        std::fs::write(&path, serde_json::to_string(model).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_add_generates_plan_and_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let model_path = write_model(&dir, &blog_post_model());

        add_migration(&config, "initial create", &model_path).unwrap();

        let repo = PlanRepository::new(&config.migrator.migrations_dir);
        let plans = repo.load_all().unwrap();
        assert_eq!(plans.len(), 1);
        assert!(plans[0].id.ends_with("_initial_create"));
        assert_eq!(plans[0].operations.len(), 4);

        let snapshot = strata_runtime::snapshot::load(&config.migrator.snapshot_path)
            .unwrap()
            .unwrap();
        assert_eq!(snapshot, blog_post_model());
    }

    #[test]
    fn test_add_without_changes_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let model_path = write_model(&dir, &blog_post_model());

        add_migration(&config, "initial create", &model_path).unwrap();

        // Same model again: no new plan
        add_migration(&config, "noop", &model_path).unwrap();
        let plans = PlanRepository::new(&config.migrator.migrations_dir)
            .load_all()
            .unwrap();
        assert_eq!(plans.len(), 1);
    }

    #[test]
    fn test_add_replays_plans_when_snapshot_missing() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let model_path = write_model(&dir, &blog_post_model());

        add_migration(&config, "initial create", &model_path).unwrap();

        // Losing the snapshot must not regenerate the same operations
        std::fs::remove_file(&config.migrator.snapshot_path).unwrap();
        add_migration(&config, "noop", &model_path).unwrap();

        let plans = PlanRepository::new(&config.migrator.migrations_dir)
            .load_all()
            .unwrap();
        assert_eq!(plans.len(), 1);
    }

    #[test]
    fn test_load_config_defaults_when_file_missing() {
        let config = load_config("/nonexistent/strata.toml").unwrap();
        assert_eq!(config.migrator.history_table, "strata_migrations");
    }
}
