mod database;
mod migrator;

pub use database::DatabaseConfig;
pub use migrator::MigratorConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, StrataError};

/// Root configuration for strata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Database configuration.
    pub database: DatabaseConfig,

    /// Migration engine configuration.
    #[serde(default)]
    pub migrator: MigratorConfig,
}

impl StrataConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| StrataError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| StrataError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Configuration with defaults for everything but the database URL.
    pub fn default_with_database_url(url: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: url.to_string(),
                ..Default::default()
            },
            migrator: MigratorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [database]
            url = "postgres://localhost/app"

            [migrator]
            history_table = "app_history"
        "#;

        let config = StrataConfig::parse_toml(toml).unwrap();
        assert_eq!(config.database.url, "postgres://localhost/app");
        assert_eq!(config.migrator.history_table, "app_history");
    }

    #[test]
    fn test_migrator_section_optional() {
        let toml = r#"
            [database]
            url = "postgres://localhost/app"
        "#;

        let config = StrataConfig::parse_toml(toml).unwrap();
        assert_eq!(config.migrator.history_table, "strata_migrations");
    }

    #[test]
    fn test_default_with_database_url() {
        let config = StrataConfig::default_with_database_url("postgres://localhost/x");
        assert_eq!(config.database.url, "postgres://localhost/x");
        assert_eq!(config.database.pool_size, 5);
    }
}
