//! Schema diff engine.
//!
//! Computes the ordered set of DDL operations that transforms one schema
//! model into another, together with the reverse sequence for rollback.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::warn;

use strata_core::error::SchemaError;
use strata_core::migrate::{MigrationPlan, Operation};
use strata_core::schema::{SchemaModel, TableDef};

/// The difference between two schema models.
#[derive(Debug, Clone)]
pub struct SchemaDiff {
    /// Operations that transform `old` into `new`, in application order.
    pub operations: Vec<Operation>,

    /// Operations that undo `operations`, in application order.
    pub down: Vec<Operation>,

    /// Lossy side effects the operator should review.
    pub warnings: Vec<String>,
}

impl SchemaDiff {
    /// Compute the diff between two validated models.
    ///
    /// Emission order guarantees referential integrity at every step:
    /// constraint and index drops first, then table drops (dependents
    /// before their targets), table creates (targets before dependents),
    /// column changes, index creates, and finally deferred foreign keys.
    pub fn between(old: &SchemaModel, new: &SchemaModel) -> Result<Self, SchemaError> {
        old.validate()?;
        new.validate()?;

        let mut ops = Vec::new();
        let mut warnings = Vec::new();

        let created: Vec<&TableDef> = new
            .tables()
            .filter(|t| old.table(&t.name).is_none())
            .collect();
        let dropped: Vec<&TableDef> = old
            .tables()
            .filter(|t| new.table(&t.name).is_none())
            .collect();

        // 1. Foreign keys removed (or re-added under the same name) on
        //    shared tables, plus any constraint pointing at a table that
        //    is about to be dropped. Drops always precede adds.
        let mut fk_adds = Vec::new();
        for table in new.tables() {
            let Some(old_table) = old.table(&table.name) else {
                continue;
            };

            for old_fk in &old_table.foreign_keys {
                match table.foreign_key(&old_fk.name) {
                    Some(new_fk) if new_fk == old_fk => {}
                    _ => ops.push(Operation::DropForeignKey {
                        table: table.name.clone(),
                        foreign_key: old_fk.clone(),
                    }),
                }
            }
            for new_fk in &table.foreign_keys {
                match old_table.foreign_key(&new_fk.name) {
                    Some(old_fk) if old_fk == new_fk => {}
                    _ => fk_adds.push(Operation::AddForeignKey {
                        table: table.name.clone(),
                        foreign_key: new_fk.clone(),
                    }),
                }
            }
        }

        // 2. Index drops on shared tables (removed or redefined).
        let mut index_adds = Vec::new();
        for table in new.tables() {
            let Some(old_table) = old.table(&table.name) else {
                continue;
            };

            for old_idx in &old_table.indexes {
                match table.index(&old_idx.name) {
                    Some(new_idx) if new_idx == old_idx => {}
                    _ => ops.push(Operation::DropIndex {
                        table: table.name.clone(),
                        index: old_idx.clone(),
                    }),
                }
            }
            for new_idx in &table.indexes {
                match old_table.index(&new_idx.name) {
                    Some(old_idx) if old_idx == new_idx => {}
                    _ => index_adds.push(Operation::CreateIndex {
                        table: table.name.clone(),
                        index: new_idx.clone(),
                    }),
                }
            }
        }

        // 3. Dropped tables, dependents before their targets.
        for table in drop_order(&dropped) {
            warnings.push(format!(
                "table '{}' is dropped together with its data",
                table.name
            ));
            ops.push(Operation::DropTable {
                table: (*table).clone(),
            });
        }

        // 4. Created tables, targets before dependents. Constraints that
        //    reference another table created in this same diff are
        //    stripped from the inline definition and deferred to step 7.
        let created_names: Vec<&str> = created.iter().map(|t| t.name.as_str()).collect();
        let mut deferred_fks = Vec::new();
        for table in create_order(&created) {
            let mut def = (*table).clone();
            let (inline, deferred): (Vec<_>, Vec<_>) =
                def.foreign_keys.into_iter().partition(|fk| {
                    fk.references_table == table.name
                        || !created_names.contains(&fk.references_table.as_str())
                });
            def.foreign_keys = inline;

            for fk in deferred {
                deferred_fks.push(Operation::AddForeignKey {
                    table: table.name.clone(),
                    foreign_key: fk,
                });
            }

            // Secondary indexes always follow the create.
            let indexes = std::mem::take(&mut def.indexes);
            ops.push(Operation::CreateTable { table: def });
            for index in indexes {
                index_adds.push(Operation::CreateIndex {
                    table: table.name.clone(),
                    index,
                });
            }
        }

        // 5. Column changes on shared tables.
        for table in new.tables() {
            let Some(old_table) = old.table(&table.name) else {
                continue;
            };

            for column in &table.columns {
                match old_table.column(&column.name) {
                    None => ops.push(Operation::AddColumn {
                        table: table.name.clone(),
                        column: column.clone(),
                    }),
                    Some(old_column) if old_column != column => {
                        let only_generation_changed = old_column.sql_type == column.sql_type
                            && old_column.nullable == column.nullable
                            && old_column.default == column.default;
                        if only_generation_changed {
                            // Sequences are not rewired after the fact
                            warnings.push(format!(
                                "value-generation change on column '{}.{}' is not expressible as an operation and was skipped",
                                table.name, column.name
                            ));
                        } else {
                            ops.push(Operation::AlterColumn {
                                table: table.name.clone(),
                                from: old_column.clone(),
                                to: column.clone(),
                            });
                        }
                    }
                    Some(_) => {}
                }
            }
            for old_column in &old_table.columns {
                if table.column(&old_column.name).is_none() {
                    warnings.push(format!(
                        "column '{}.{}' is dropped and its data lost; a rename is expressed as drop + add",
                        table.name, old_column.name
                    ));
                    ops.push(Operation::DropColumn {
                        table: table.name.clone(),
                        column: old_column.clone(),
                    });
                }
            }

            if old_table.primary_key != table.primary_key {
                warnings.push(format!(
                    "primary key change on table '{}' is not expressible as an operation and was skipped",
                    table.name
                ));
            }
        }

        // 6. Index creates, 7. deferred and new foreign keys.
        ops.extend(index_adds);
        ops.extend(fk_adds);
        ops.extend(deferred_fks);

        // Down sequence: reversed structural inverses.
        let down = ops.iter().rev().map(|op| op.invert()).collect();

        for warning in &warnings {
            warn!("{}", warning);
        }

        Ok(Self {
            operations: ops,
            down,
            warnings,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Freeze the diff into an immutable plan. Empty diffs produce none.
    pub fn into_plan(self, id: impl Into<String>, name: impl Into<String>) -> Option<MigrationPlan> {
        if self.is_empty() {
            return None;
        }
        Some(
            MigrationPlan::new(id, name, self.operations, self.down).with_warnings(self.warnings),
        )
    }
}

/// Creation order: foreign-key targets before dependents, name order
/// among unrelated tables. Cycles fall back to name order, which is safe
/// because intra-diff constraints are deferred.
fn create_order<'a>(created: &[&'a TableDef]) -> Vec<&'a TableDef> {
    dependency_order(created, false)
}

/// Drop order: dependents before their foreign-key targets.
fn drop_order<'a>(dropped: &[&'a TableDef]) -> Vec<&'a TableDef> {
    dependency_order(dropped, true)
}

fn dependency_order<'a>(tables: &[&'a TableDef], reverse: bool) -> Vec<&'a TableDef> {
    let mut sorted: Vec<&'a TableDef> = tables.to_vec();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut graph: DiGraph<&'a TableDef, ()> = DiGraph::new();
    let mut nodes: HashMap<&'a str, NodeIndex> = HashMap::new();
    for &table in &sorted {
        nodes.insert(table.name.as_str(), graph.add_node(table));
    }
    for &table in &sorted {
        for fk in &table.foreign_keys {
            if fk.references_table == table.name {
                continue;
            }
            if let Some(&target) = nodes.get(fk.references_table.as_str()) {
                // Target first, dependent second
                graph.add_edge(target, nodes[table.name.as_str()], ());
            }
        }
    }

    let order: Vec<&'a TableDef> = match toposort(&graph, None) {
        Ok(indices) => indices.into_iter().map(|i| graph[i]).collect(),
        Err(_) => sorted,
    };

    if reverse {
        order.into_iter().rev().collect()
    } else {
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::migrate::Operation;
    use strata_core::schema::{ColumnDef, ForeignKeyDef, IndexDef, OnDelete, SqlType, TableDef};

    fn blogs() -> TableDef {
        TableDef::new("blogs")
            .with_column(ColumnDef::new("blog_id", SqlType::Integer).auto_increment())
            .with_column(ColumnDef::new("url", SqlType::Text))
            .with_primary_key(&["blog_id"])
    }

    fn posts() -> TableDef {
        TableDef::new("posts")
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
            )
    }

    fn blog_post_model() -> SchemaModel {
        SchemaModel::new().with_table(blogs()).with_table(posts())
    }

    #[test]
    fn test_initial_create_orders_targets_first() {
        let diff = SchemaDiff::between(&SchemaModel::new(), &blog_post_model()).unwrap();

        let summary: Vec<String> = diff.operations.iter().map(|op| op.describe()).collect();
        assert_eq!(
            summary,
            vec![
                "create table blogs",
                "create table posts",
                "create index ix_posts_blog_id",
                "add foreign key fk_posts_blogs on posts",
            ]
        );

        // The deferred constraint keeps its delete policy
        match diff.operations.last().unwrap() {
            Operation::AddForeignKey { foreign_key, .. } => {
                assert_eq!(foreign_key.on_delete, OnDelete::Cascade);
            }
            other => panic!("expected AddForeignKey, got {:?}", other),
        }
    }

    #[test]
    fn test_diff_of_identical_models_is_empty() {
        let diff = SchemaDiff::between(&blog_post_model(), &blog_post_model()).unwrap();
        assert!(diff.is_empty());
        assert!(diff.into_plan("x", "x").is_none());
    }

    #[test]
    fn test_drop_order_is_dependents_first() {
        let diff = SchemaDiff::between(&blog_post_model(), &SchemaModel::new()).unwrap();

        let names: Vec<String> = diff
            .operations
            .iter()
            .map(|op| match op {
                Operation::DropTable { table } => table.name.clone(),
                other => panic!("expected DropTable, got {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["posts", "blogs"]);
        assert_eq!(diff.warnings.len(), 2);
    }

    #[test]
    fn test_column_add_alter_drop() {
        let mut new = blog_post_model();
        {
            let posts = new.table_mut("posts").unwrap();
            posts.columns.push(ColumnDef::new("summary", SqlType::Text).nullable());
            posts.columns.retain(|c| c.name != "content");
            let title = posts.columns.iter_mut().find(|c| c.name == "title").unwrap();
            title.sql_type = SqlType::Varchar(Some(200));
        }

        let diff = SchemaDiff::between(&blog_post_model(), &new).unwrap();
        let summary: Vec<String> = diff.operations.iter().map(|op| op.describe()).collect();
        assert_eq!(
            summary,
            vec![
                "alter column posts.title",
                "add column posts.summary",
                "drop column posts.content",
            ]
        );
        assert!(diff.warnings.iter().any(|w| w.contains("posts.content")));
    }

    #[test]
    fn test_redefined_fk_drops_before_add() {
        let mut new = blog_post_model();
        {
            let posts = new.table_mut("posts").unwrap();
            let fk = posts.foreign_keys.iter_mut().find(|f| f.name == "fk_posts_blogs").unwrap();
            fk.on_delete = OnDelete::Restrict;
        }

        let diff = SchemaDiff::between(&blog_post_model(), &new).unwrap();
        let summary: Vec<String> = diff.operations.iter().map(|op| op.describe()).collect();
        assert_eq!(
            summary,
            vec![
                "drop foreign key fk_posts_blogs on posts",
                "add foreign key fk_posts_blogs on posts",
            ]
        );
    }

    #[test]
    fn test_redefined_index_drops_before_create() {
        let mut new = blog_post_model();
        {
            let posts = new.table_mut("posts").unwrap();
            let idx = posts.indexes.iter_mut().find(|i| i.name == "ix_posts_blog_id").unwrap();
            idx.unique = true;
        }

        let diff = SchemaDiff::between(&blog_post_model(), &new).unwrap();
        let summary: Vec<String> = diff.operations.iter().map(|op| op.describe()).collect();
        assert_eq!(
            summary,
            vec!["drop index ix_posts_blog_id", "create index ix_posts_blog_id"]
        );
    }

    #[test]
    fn test_generation_only_change_is_skipped_with_warning() {
        let mut new = blog_post_model();
        {
            let blogs = new.table_mut("blogs").unwrap();
            let id = blogs.columns.iter_mut().find(|c| c.name == "blog_id").unwrap();
            id.generated = strata_core::schema::ValueGeneration::None;
        }

        let diff = SchemaDiff::between(&blog_post_model(), &new).unwrap();
        assert!(diff.is_empty());
        assert!(diff.warnings.iter().any(|w| w.contains("blogs.blog_id")));
    }

    #[test]
    fn test_invalid_model_rejected_before_diffing() {
        let mut broken = blog_post_model();
        broken.remove_table("blogs");
        assert!(matches!(
            SchemaDiff::between(&SchemaModel::new(), &broken),
            Err(SchemaError::DanglingForeignKey { .. })
        ));
    }

    #[test]
    fn test_round_trip_law() {
        let cases: Vec<(SchemaModel, SchemaModel)> = vec![
            (SchemaModel::new(), blog_post_model()),
            (blog_post_model(), SchemaModel::new()),
            (
                SchemaModel::new().with_table(blogs()),
                blog_post_model(),
            ),
            (blog_post_model(), {
                let mut m = blog_post_model();
                m.table_mut("posts")
                    .unwrap()
                    .columns
                    .push(ColumnDef::new("summary", SqlType::Text).nullable());
                m
            }),
        ];

        for (old, new) in cases {
            let diff = SchemaDiff::between(&old, &new).unwrap();

            let mut model = old.clone();
            for op in &diff.operations {
                op.apply_to(&mut model).unwrap();
            }
            assert_eq!(model, new, "up operations must reach the new model");

            for op in &diff.down {
                op.apply_to(&mut model).unwrap();
            }
            assert_eq!(model, old, "down operations must restore the old model");
        }
    }

    #[test]
    fn test_into_plan_carries_warnings() {
        let diff = SchemaDiff::between(&blog_post_model(), &SchemaModel::new()).unwrap();
        let plan = diff.into_plan("20240701_000000_drop_all", "drop all").unwrap();
        assert_eq!(plan.id, "20240701_000000_drop_all");
        assert!(!plan.warnings.is_empty());
        assert_eq!(plan.down.len(), plan.operations.len());
    }
}
