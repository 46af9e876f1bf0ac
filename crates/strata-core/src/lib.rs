pub mod config;
pub mod driver;
pub mod error;
pub mod migrate;
pub mod schema;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{DatabaseConfig, MigratorConfig, StrataConfig};
pub use driver::{SchemaDriver, SchemaTx};
pub use error::{DriverError, Result, RunError, SchemaError, StoreError, StrataError};
pub use migrate::{AppliedMigration, MigrationPlan, Operation};
pub use schema::{ColumnDef, ForeignKeyDef, IndexDef, OnDelete, SchemaModel, SqlType, TableDef};
