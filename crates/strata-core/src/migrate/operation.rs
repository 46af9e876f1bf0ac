use serde::{Deserialize, Serialize};

use crate::error::{NameKind, SchemaError};
use crate::schema::{ColumnDef, ForeignKeyDef, IndexDef, SchemaModel, SqlType, TableDef};

/// A single schema-changing operation.
///
/// Drop variants carry the pre-image of what they remove so every
/// operation has a structural inverse and history can be replayed in
/// either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a table. Foreign keys present on the definition are
    /// rendered inline; the diff engine strips constraints that must be
    /// deferred until their target table exists.
    CreateTable { table: TableDef },

    /// Drop a table, remembering its full definition.
    DropTable { table: TableDef },

    AddColumn { table: String, column: ColumnDef },

    DropColumn { table: String, column: ColumnDef },

    AlterColumn {
        table: String,
        from: ColumnDef,
        to: ColumnDef,
    },

    AddForeignKey {
        table: String,
        foreign_key: ForeignKeyDef,
    },

    DropForeignKey {
        table: String,
        foreign_key: ForeignKeyDef,
    },

    CreateIndex { table: String, index: IndexDef },

    DropIndex { table: String, index: IndexDef },
}

impl Operation {
    /// Render the operation as a DDL statement.
    pub fn to_sql(&self) -> String {
        match self {
            Operation::CreateTable { table } => {
                let inline: Vec<String> =
                    table.foreign_keys.iter().map(|fk| fk.name.clone()).collect();
                table.to_create_table_sql(&inline)
            }
            Operation::DropTable { table } => format!("DROP TABLE {};", table.name),
            Operation::AddColumn { table, column } => {
                let mut sql = format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    table,
                    column.to_sql_column()
                );
                // Adding NOT NULL to a populated table needs a fill value
                if !column.nullable && column.default.is_none() {
                    sql.push_str(&format!(" DEFAULT {}", backfill_default(&column.sql_type)));
                }
                sql.push(';');
                sql
            }
            Operation::DropColumn { table, column } => {
                format!("ALTER TABLE {} DROP COLUMN {};", table, column.name)
            }
            Operation::AlterColumn { table, from, to } => {
                let mut actions = Vec::new();
                if from.sql_type != to.sql_type {
                    actions.push(format!(
                        "ALTER COLUMN {} TYPE {}",
                        to.name,
                        to.sql_type.to_sql()
                    ));
                }
                if from.nullable != to.nullable {
                    if to.nullable {
                        actions.push(format!("ALTER COLUMN {} DROP NOT NULL", to.name));
                    } else {
                        actions.push(format!("ALTER COLUMN {} SET NOT NULL", to.name));
                    }
                }
                if from.default != to.default {
                    match &to.default {
                        Some(expr) => {
                            actions.push(format!("ALTER COLUMN {} SET DEFAULT {}", to.name, expr))
                        }
                        None => actions.push(format!("ALTER COLUMN {} DROP DEFAULT", to.name)),
                    }
                }
                format!("ALTER TABLE {} {};", table, actions.join(", "))
            }
            Operation::AddForeignKey { table, foreign_key } => {
                format!(
                    "ALTER TABLE {} ADD {};",
                    table,
                    foreign_key.to_constraint_sql()
                )
            }
            Operation::DropForeignKey { table, foreign_key } => {
                format!("ALTER TABLE {} DROP CONSTRAINT {};", table, foreign_key.name)
            }
            Operation::CreateIndex { table, index } => index.to_create_sql(table),
            Operation::DropIndex { index, .. } => format!("DROP INDEX {};", index.name),
        }
    }

    /// The structural inverse of this operation.
    pub fn invert(&self) -> Operation {
        match self {
            Operation::CreateTable { table } => Operation::DropTable { table: table.clone() },
            Operation::DropTable { table } => Operation::CreateTable { table: table.clone() },
            Operation::AddColumn { table, column } => Operation::DropColumn {
                table: table.clone(),
                column: column.clone(),
            },
            Operation::DropColumn { table, column } => Operation::AddColumn {
                table: table.clone(),
                column: column.clone(),
            },
            Operation::AlterColumn { table, from, to } => Operation::AlterColumn {
                table: table.clone(),
                from: to.clone(),
                to: from.clone(),
            },
            Operation::AddForeignKey { table, foreign_key } => Operation::DropForeignKey {
                table: table.clone(),
                foreign_key: foreign_key.clone(),
            },
            Operation::DropForeignKey { table, foreign_key } => Operation::AddForeignKey {
                table: table.clone(),
                foreign_key: foreign_key.clone(),
            },
            Operation::CreateIndex { table, index } => Operation::DropIndex {
                table: table.clone(),
                index: index.clone(),
            },
            Operation::DropIndex { table, index } => Operation::CreateIndex {
                table: table.clone(),
                index: index.clone(),
            },
        }
    }

    /// Apply the operation structurally to a model.
    ///
    /// Replaying every applied plan over an empty model reconstructs the
    /// current schema without touching the database.
    pub fn apply_to(&self, model: &mut SchemaModel) -> Result<(), SchemaError> {
        match self {
            Operation::CreateTable { table } => {
                if model.table(&table.name).is_some() {
                    return Err(SchemaError::DuplicateName {
                        kind: NameKind::Table,
                        name: table.name.clone(),
                    });
                }
                model.insert_table(table.clone());
            }
            Operation::DropTable { table } => {
                model
                    .remove_table(&table.name)
                    .ok_or_else(|| SchemaError::UnknownTable(table.name.clone()))?;
            }
            Operation::AddColumn { table, column } => {
                let t = model
                    .table_mut(table)
                    .ok_or_else(|| SchemaError::UnknownTable(table.clone()))?;
                if t.column(&column.name).is_some() {
                    return Err(SchemaError::DuplicateName {
                        kind: NameKind::Column,
                        name: format!("{}.{}", table, column.name),
                    });
                }
                t.columns.push(column.clone());
            }
            Operation::DropColumn { table, column } => {
                let t = model
                    .table_mut(table)
                    .ok_or_else(|| SchemaError::UnknownTable(table.clone()))?;
                if t.column(&column.name).is_none() {
                    return Err(SchemaError::UnknownColumn {
                        table: table.clone(),
                        column: column.name.clone(),
                    });
                }
                t.columns.retain(|c| c.name != column.name);
            }
            Operation::AlterColumn { table, from, to } => {
                let t = model
                    .table_mut(table)
                    .ok_or_else(|| SchemaError::UnknownTable(table.clone()))?;
                let col = t
                    .columns
                    .iter_mut()
                    .find(|c| c.name == from.name)
                    .ok_or_else(|| SchemaError::UnknownColumn {
                        table: table.clone(),
                        column: from.name.clone(),
                    })?;
                *col = to.clone();
            }
            Operation::AddForeignKey { table, foreign_key } => {
                let t = model
                    .table_mut(table)
                    .ok_or_else(|| SchemaError::UnknownTable(table.clone()))?;
                if t.foreign_key(&foreign_key.name).is_some() {
                    return Err(SchemaError::DuplicateName {
                        kind: NameKind::ForeignKey,
                        name: foreign_key.name.clone(),
                    });
                }
                t.foreign_keys.push(foreign_key.clone());
            }
            Operation::DropForeignKey { table, foreign_key } => {
                let t = model
                    .table_mut(table)
                    .ok_or_else(|| SchemaError::UnknownTable(table.clone()))?;
                t.foreign_keys.retain(|f| f.name != foreign_key.name);
            }
            Operation::CreateIndex { table, index } => {
                let t = model
                    .table_mut(table)
                    .ok_or_else(|| SchemaError::UnknownTable(table.clone()))?;
                if t.index(&index.name).is_some() {
                    return Err(SchemaError::DuplicateName {
                        kind: NameKind::Index,
                        name: index.name.clone(),
                    });
                }
                t.indexes.push(index.clone());
            }
            Operation::DropIndex { table, index } => {
                let t = model
                    .table_mut(table)
                    .ok_or_else(|| SchemaError::UnknownTable(table.clone()))?;
                t.indexes.retain(|i| i.name != index.name);
            }
        }
        Ok(())
    }

    /// Human-readable summary for status output and error reporting.
    pub fn describe(&self) -> String {
        match self {
            Operation::CreateTable { table } => format!("create table {}", table.name),
            Operation::DropTable { table } => format!("drop table {}", table.name),
            Operation::AddColumn { table, column } => {
                format!("add column {}.{}", table, column.name)
            }
            Operation::DropColumn { table, column } => {
                format!("drop column {}.{}", table, column.name)
            }
            Operation::AlterColumn { table, to, .. } => {
                format!("alter column {}.{}", table, to.name)
            }
            Operation::AddForeignKey { table, foreign_key } => {
                format!("add foreign key {} on {}", foreign_key.name, table)
            }
            Operation::DropForeignKey { table, foreign_key } => {
                format!("drop foreign key {} on {}", foreign_key.name, table)
            }
            Operation::CreateIndex { index, .. } => format!("create index {}", index.name),
            Operation::DropIndex { index, .. } => format!("drop index {}", index.name),
        }
    }
}

/// Fill value for adding a NOT NULL column without an explicit default.
fn backfill_default(sql_type: &SqlType) -> &'static str {
    match sql_type {
        SqlType::Varchar(_) | SqlType::Text => "''",
        SqlType::Integer | SqlType::BigInt => "0",
        SqlType::Real | SqlType::DoublePrecision => "0",
        SqlType::Boolean => "false",
        SqlType::Timestamptz | SqlType::Date => "NOW()",
        SqlType::Uuid => "gen_random_uuid()",
        SqlType::Jsonb => "'{}'",
        SqlType::Bytea => "''",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OnDelete;

    fn blogs() -> TableDef {
        TableDef::new("blogs")
            .with_column(ColumnDef::new("blog_id", SqlType::Integer).auto_increment())
            .with_column(ColumnDef::new("url", SqlType::Text))
            .with_primary_key(&["blog_id"])
    }

    #[test]
    fn test_create_table_sql_inlines_fks() {
        let table = TableDef::new("posts")
            .with_column(ColumnDef::new("post_id", SqlType::Integer).auto_increment())
            .with_column(ColumnDef::new("blog_id", SqlType::Integer))
            .with_primary_key(&["post_id"])
            .with_foreign_key(
                ForeignKeyDef::new("fk_posts_blogs", &["blog_id"], "blogs", &["blog_id"])
                    .on_delete(OnDelete::Cascade),
            );

        let sql = Operation::CreateTable { table }.to_sql();
        assert!(sql.contains("CONSTRAINT fk_posts_blogs"));
        assert!(sql.contains("ON DELETE CASCADE"));
    }

    #[test]
    fn test_add_column_not_null_gets_backfill_default() {
        let op = Operation::AddColumn {
            table: "posts".into(),
            column: ColumnDef::new("title", SqlType::Text),
        };
        assert_eq!(
            op.to_sql(),
            "ALTER TABLE posts ADD COLUMN title TEXT NOT NULL DEFAULT '';"
        );
    }

    #[test]
    fn test_alter_column_combines_actions() {
        let op = Operation::AlterColumn {
            table: "posts".into(),
            from: ColumnDef::new("title", SqlType::Varchar(Some(80))),
            to: ColumnDef::new("title", SqlType::Text).nullable(),
        };
        let sql = op.to_sql();
        assert!(sql.contains("ALTER COLUMN title TYPE TEXT"));
        assert!(sql.contains("ALTER COLUMN title DROP NOT NULL"));
    }

    #[test]
    fn test_invert_is_involutive() {
        let ops = vec![
            Operation::CreateTable { table: blogs() },
            Operation::AddColumn {
                table: "blogs".into(),
                column: ColumnDef::new("title", SqlType::Text),
            },
            Operation::CreateIndex {
                table: "blogs".into(),
                index: IndexDef::new("ux_blogs_url", &["url"]).unique(),
            },
        ];
        for op in ops {
            assert_eq!(op.invert().invert(), op);
        }
    }

    #[test]
    fn test_apply_create_then_drop_restores_model() {
        let mut model = SchemaModel::new();
        let create = Operation::CreateTable { table: blogs() };

        create.apply_to(&mut model).unwrap();
        assert!(model.table("blogs").is_some());

        create.invert().apply_to(&mut model).unwrap();
        assert!(model.is_empty());
    }

    #[test]
    fn test_apply_to_unknown_table_fails() {
        let mut model = SchemaModel::new();
        let op = Operation::AddColumn {
            table: "missing".into(),
            column: ColumnDef::new("a", SqlType::Text),
        };
        assert!(matches!(
            op.apply_to(&mut model),
            Err(SchemaError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_drop_index_sql() {
        let op = Operation::DropIndex {
            table: "posts".into(),
            index: IndexDef::new("ix_posts_blog_id", &["blog_id"]),
        };
        assert_eq!(op.to_sql(), "DROP INDEX ix_posts_blog_id;");
    }
}
