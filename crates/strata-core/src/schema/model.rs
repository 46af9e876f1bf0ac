use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{NameKind, SchemaError};

use super::table::TableDef;

/// A complete schema at a point in time.
///
/// A plain value with structural equality: two models compare equal when
/// they describe the same tables, columns, keys, and indexes. Tables are
/// keyed by name so iteration order is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SchemaModel {
    tables: BTreeMap<String, TableDef>,
}

impl SchemaModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table, replacing any previous definition with the same name.
    pub fn insert_table(&mut self, table: TableDef) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Builder-style table insertion.
    pub fn with_table(mut self, table: TableDef) -> Self {
        self.insert_table(table);
        self
    }

    /// Remove a table by name.
    pub fn remove_table(&mut self, name: &str) -> Option<TableDef> {
        self.tables.remove(name)
    }

    /// Get a table by name.
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    /// Get a mutable table by name.
    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableDef> {
        self.tables.get_mut(name)
    }

    /// Iterate tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }

    /// Table names in name order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Validate model invariants.
    ///
    /// Fails with `DanglingForeignKey` when a foreign key references a
    /// table or column missing from this model, and `DuplicateName` when
    /// column, index, or foreign-key names collide. Table-name uniqueness
    /// is structural (the map), so only nested names are checked here.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut index_names: HashSet<&str> = HashSet::new();
        let mut fk_names: HashSet<&str> = HashSet::new();

        for table in self.tables.values() {
            let mut column_names: HashSet<&str> = HashSet::new();
            for column in &table.columns {
                if !column_names.insert(column.name.as_str()) {
                    return Err(SchemaError::DuplicateName {
                        kind: NameKind::Column,
                        name: format!("{}.{}", table.name, column.name),
                    });
                }
            }

            for pk in &table.primary_key {
                if table.column(pk).is_none() {
                    return Err(SchemaError::UnknownColumn {
                        table: table.name.clone(),
                        column: pk.clone(),
                    });
                }
            }

            for index in &table.indexes {
                if !index_names.insert(index.name.as_str()) {
                    return Err(SchemaError::DuplicateName {
                        kind: NameKind::Index,
                        name: index.name.clone(),
                    });
                }
                for col in &index.columns {
                    if table.column(col).is_none() {
                        return Err(SchemaError::UnknownColumn {
                            table: table.name.clone(),
                            column: col.clone(),
                        });
                    }
                }
            }

            for fk in &table.foreign_keys {
                if !fk_names.insert(fk.name.as_str()) {
                    return Err(SchemaError::DuplicateName {
                        kind: NameKind::ForeignKey,
                        name: fk.name.clone(),
                    });
                }

                for col in &fk.columns {
                    if table.column(col).is_none() {
                        return Err(SchemaError::UnknownColumn {
                            table: table.name.clone(),
                            column: col.clone(),
                        });
                    }
                }

                let target = match self.tables.get(&fk.references_table) {
                    Some(t) => t,
                    None => {
                        return Err(SchemaError::DanglingForeignKey {
                            table: table.name.clone(),
                            foreign_key: fk.name.clone(),
                            target: format!("table '{}'", fk.references_table),
                        })
                    }
                };

                for col in &fk.references_columns {
                    if target.column(col).is_none() {
                        return Err(SchemaError::DanglingForeignKey {
                            table: table.name.clone(),
                            foreign_key: fk.name.clone(),
                            target: format!("column '{}.{}'", fk.references_table, col),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Tables whose foreign keys reference the given table.
    pub fn referencing_tables(&self, target: &str) -> Vec<&TableDef> {
        self.tables
            .values()
            .filter(|t| t.foreign_keys.iter().any(|fk| fk.references_table == target))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::ColumnDef;
    use crate::schema::table::{ForeignKeyDef, IndexDef, OnDelete};
    use crate::schema::types::SqlType;

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

    #[test]
    fn test_valid_model() {
        assert!(blog_post_model().validate().is_ok());
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(blog_post_model(), blog_post_model());

        let mut other = blog_post_model();
        other
            .table_mut("posts")
            .unwrap()
            .columns
            .push(ColumnDef::new("extra", SqlType::Text));
        assert_ne!(blog_post_model(), other);
    }

    #[test]
    fn test_dangling_foreign_key_table() {
        let mut model = blog_post_model();
        model.remove_table("blogs");

        match model.validate() {
            Err(SchemaError::DanglingForeignKey { foreign_key, .. }) => {
                assert_eq!(foreign_key, "fk_posts_blogs");
            }
            other => panic!("expected DanglingForeignKey, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_foreign_key_column() {
        let mut model = blog_post_model();
        model.table_mut("blogs").unwrap().columns.retain(|c| c.name != "blog_id");
        model.table_mut("blogs").unwrap().primary_key.clear();

        assert!(matches!(
            model.validate(),
            Err(SchemaError::DanglingForeignKey { .. })
        ));
    }

    #[test]
    fn test_duplicate_column_name() {
        let table = TableDef::new("t")
            .with_column(ColumnDef::new("a", SqlType::Text))
            .with_column(ColumnDef::new("a", SqlType::Integer));
        let model = SchemaModel::new().with_table(table);

        assert!(matches!(
            model.validate(),
            Err(SchemaError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let model = blog_post_model();
        let json = serde_json::to_string(&model).unwrap();
        let back: SchemaModel = serde_json::from_str(&json).unwrap();
        assert_eq!(model, back);
    }

    #[test]
    fn test_referencing_tables() {
        let model = blog_post_model();
        let refs = model.referencing_tables("blogs");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "posts");
    }
}
