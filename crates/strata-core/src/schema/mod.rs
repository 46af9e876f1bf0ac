mod column;
mod model;
mod table;
mod types;

pub use column::{ColumnDef, ValueGeneration};
pub use model::SchemaModel;
pub use table::{ForeignKeyDef, IndexDef, OnDelete, TableDef};
pub use types::SqlType;
