use serde::{Deserialize, Serialize};

use super::column::ColumnDef;

/// ON DELETE referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OnDelete {
    Cascade,
    #[default]
    Restrict,
    SetNull,
}

impl OnDelete {
    pub fn to_sql(self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::SetNull => "SET NULL",
        }
    }
}

/// Definition of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name (unique within the schema).
    pub name: String,

    /// Indexed columns, in order.
    pub columns: Vec<String>,

    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

impl IndexDef {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Generate a CREATE INDEX statement for a table.
    pub fn to_create_sql(&self, table: &str) -> String {
        let unique = if self.unique { "UNIQUE " } else { "" };
        format!(
            "CREATE {}INDEX {} ON {} ({});",
            unique,
            self.name,
            table,
            self.columns.join(", ")
        )
    }
}

/// Definition of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    /// Constraint name (unique within the schema).
    pub name: String,

    /// Referencing columns on the source table, in order.
    pub columns: Vec<String>,

    /// Referenced table.
    pub references_table: String,

    /// Referenced columns, in order.
    pub references_columns: Vec<String>,

    /// ON DELETE action.
    #[serde(default)]
    pub on_delete: OnDelete,

    /// Whether the relationship is required (referencing columns NOT NULL).
    #[serde(default)]
    pub required: bool,
}

impl ForeignKeyDef {
    pub fn new(name: &str, columns: &[&str], references_table: &str, references_columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references_table: references_table.to_string(),
            references_columns: references_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: OnDelete::default(),
            required: false,
        }
    }

    pub fn on_delete(mut self, action: OnDelete) -> Self {
        self.on_delete = action;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Generate the constraint clause used inside CREATE TABLE.
    pub fn to_constraint_sql(&self) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            self.name,
            self.columns.join(", "),
            self.references_table,
            self.references_columns.join(", "),
            self.on_delete.to_sql()
        )
    }
}

/// Definition of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name (unique within the schema).
    pub name: String,

    /// Columns, in declaration order.
    pub columns: Vec<ColumnDef>,

    /// Primary key column names.
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// Indexes on this table.
    #[serde(default)]
    pub indexes: Vec<IndexDef>,

    /// Foreign keys referencing other tables.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl TableDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_foreign_key(mut self, fk: ForeignKeyDef) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a foreign key by name.
    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKeyDef> {
        self.foreign_keys.iter().find(|f| f.name == name)
    }

    /// Look up an index by name.
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Generate the CREATE TABLE statement.
    ///
    /// Foreign keys are rendered inline only when listed in `inline_fks`;
    /// the diff engine emits the rest as separate ALTER TABLE operations
    /// once their target tables exist.
    pub fn to_create_table_sql(&self, inline_fks: &[String]) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(|c| c.to_sql_column()).collect();

        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }

        for fk in &self.foreign_keys {
            if inline_fks.contains(&fk.name) {
                parts.push(fk.to_constraint_sql());
            }
        }

        format!(
            "CREATE TABLE {} (\n    {}\n);",
            self.name,
            parts.join(",\n    ")
        )
    }
}
