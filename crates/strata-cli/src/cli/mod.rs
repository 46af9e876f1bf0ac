mod migrate;
mod schema;

pub use migrate::MigrateCommand;
pub use schema::SchemaCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// STRATA - schema diff and migration engine for PostgreSQL.
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage database migrations.
    Migrate(MigrateCommand),

    /// Inspect and validate schema models.
    Schema(SchemaCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Migrate(cmd) => cmd.execute().await,
            Commands::Schema(cmd) => cmd.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_migrate_up() {
        let cli = Cli::try_parse_from(["strata", "migrate", "up"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_migrate_up_with_target() {
        let cli = Cli::try_parse_from([
            "strata",
            "migrate",
            "up",
            "--target",
            "20240620_215414_initial_create",
        ]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_migrate_add() {
        let cli = Cli::try_parse_from([
            "strata",
            "migrate",
            "add",
            "create posts",
            "--model",
            "model.json",
        ]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_schema_check() {
        let cli = Cli::try_parse_from(["strata", "schema", "check", "--model", "model.json"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        let cli = Cli::try_parse_from(["strata", "frobnicate"]);
        assert!(cli.is_err());
    }
}
