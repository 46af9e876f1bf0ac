use serde::{Deserialize, Serialize};

use super::types::SqlType;

/// Value-generation policy for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValueGeneration {
    /// Values are supplied by the application.
    #[default]
    None,
    /// Values are generated by the database on insert.
    AutoIncrement,
}

/// Definition of a table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name (unique within its table).
    pub name: String,

    /// SQL type.
    pub sql_type: SqlType,

    /// Whether NULL values are allowed.
    pub nullable: bool,

    /// Value-generation policy.
    #[serde(default)]
    pub generated: ValueGeneration,

    /// Default value expression (SQL).
    #[serde(default)]
    pub default: Option<String>,
}

impl ColumnDef {
    /// Create a non-nullable column with no generation policy.
    pub fn new(name: &str, sql_type: SqlType) -> Self {
        Self {
            name: name.to_string(),
            sql_type,
            nullable: false,
            generated: ValueGeneration::None,
            default: None,
        }
    }

    /// Mark the column nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the column as database-generated on insert.
    pub fn auto_increment(mut self) -> Self {
        self.generated = ValueGeneration::AutoIncrement;
        self
    }

    /// Set a SQL default expression.
    pub fn with_default(mut self, expr: &str) -> Self {
        self.default = Some(expr.to_string());
        self
    }

    /// Generate the SQL column definition.
    pub fn to_sql_column(&self) -> String {
        let type_sql = match (self.generated, &self.sql_type) {
            // SERIAL/BIGSERIAL subsume the integer type and the sequence
            (ValueGeneration::AutoIncrement, SqlType::Integer) => "SERIAL".to_string(),
            (ValueGeneration::AutoIncrement, SqlType::BigInt) => "BIGSERIAL".to_string(),
            (_, other) => other.to_sql(),
        };

        let mut parts = vec![self.name.clone(), type_sql];

        if !self.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(ref default) = self.default {
            parts.push(format!("DEFAULT {}", default));
        }

        parts.join(" ")
    }
}
