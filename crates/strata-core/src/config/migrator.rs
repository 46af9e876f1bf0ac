use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Migration engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigratorConfig {
    /// Directory holding migration plan files.
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,

    /// Path of the schema snapshot file.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Name of the applied-migrations history table.
    #[serde(default = "default_history_table")]
    pub history_table: String,

    /// Advisory lock key serializing migration runs against one database.
    #[serde(default = "default_lock_key")]
    pub lock_key: i64,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            migrations_dir: default_migrations_dir(),
            snapshot_path: default_snapshot_path(),
            history_table: default_history_table(),
            lock_key: default_lock_key(),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("migrations/schema.snapshot.json")
}

fn default_history_table() -> String {
    "strata_migrations".to_string()
}

/// "STRT" in hex. Arbitrary but consistent across runs.
fn default_lock_key() -> i64 {
    0x53545254
}
