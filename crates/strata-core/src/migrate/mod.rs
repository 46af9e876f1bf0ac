mod operation;
mod plan;

pub use operation::Operation;
pub use plan::{AppliedMigration, MigrationPlan};
