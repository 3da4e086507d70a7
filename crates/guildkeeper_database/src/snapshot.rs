//! Serialized schema snapshots and structural diffs between them.

use crate::{Column, SchemaRegistry, Table};
use guildkeeper_error::{SchemaError, SchemaErrorKind, SchemaResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Every table of a registry, in registration order.
///
/// Deserializing re-validates each table; [`SchemaSnapshot::into_registry`]
/// additionally re-checks foreign-key targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    version: u32,
    tables: Vec<Table>,
}

impl SchemaSnapshot {
    /// Snapshot of `registry`.
    pub fn of(registry: &SchemaRegistry) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tables: registry
                .tables()
                .iter()
                .map(|table| table.as_ref().clone())
                .collect(),
        }
    }

    /// Format version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Tables in registration order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Parse a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, an unsupported version or an invalid table.
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| SchemaError::new(SchemaErrorKind::InvalidSnapshot(e.to_string())))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SchemaError::new(SchemaErrorKind::InvalidSnapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            ))));
        }
        Ok(snapshot)
    }

    /// Render as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Fails only if serialization itself fails.
    pub fn to_json(&self) -> SchemaResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SchemaError::new(SchemaErrorKind::InvalidSnapshot(e.to_string())))
    }

    /// Register every table into a fresh registry.
    ///
    /// # Errors
    ///
    /// Fails on duplicate tables or unresolved foreign keys.
    pub fn into_registry(self) -> SchemaResult<SchemaRegistry> {
        self.tables
            .into_iter()
            .try_fold(SchemaRegistry::new(), SchemaRegistry::with)
    }

    /// Changes needed to go from `self` to `newer`.
    pub fn diff(&self, newer: &SchemaSnapshot) -> Vec<SchemaChange> {
        diff_tables(&self.tables, &newer.tables)
    }
}

/// One structural difference between two schemas.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum SchemaChange {
    /// Table only in the newer schema
    #[display("+ table {}", _0.name())]
    TableAdded(Table),
    /// Table only in the older schema
    #[display("- table {}", _0)]
    TableRemoved(String),
    /// Column only in the newer table
    #[display("+ column {}.{}", table, column.name())]
    ColumnAdded {
        /// Table name
        table: String,
        /// New column
        column: Column,
    },
    /// Column only in the older table
    #[display("- column {}.{}", table, column)]
    ColumnRemoved {
        /// Table name
        table: String,
        /// Removed column name
        column: String,
    },
    /// Same name, different definition
    #[display("~ column {}.{}: {} -> {}", table, before.name(), before.create_fragment(), after.create_fragment())]
    ColumnAltered {
        /// Table name
        table: String,
        /// Older definition
        before: Column,
        /// Newer definition
        after: Column,
    },
    /// Removed and added column with matching type and key flags
    #[display("> column {}.{} -> {}", table, from, to)]
    ColumnRenamed {
        /// Table name
        table: String,
        /// Older name
        from: String,
        /// Newer name
        to: String,
    },
}

fn same_shape(a: &Column, b: &Column) -> bool {
    a.sql_type() == b.sql_type() && a.unique() == b.unique() && a.primary_key() == b.primary_key()
}

fn diff_columns(table: &str, old: &Table, new: &Table, changes: &mut Vec<SchemaChange>) {
    let old_names: HashSet<&str> = old.columns().iter().map(|c| c.name().as_str()).collect();
    let new_names: HashSet<&str> = new.columns().iter().map(|c| c.name().as_str()).collect();

    for before in old.columns() {
        if let Some(after) = new.column(before.name()) {
            if before != after {
                changes.push(SchemaChange::ColumnAltered {
                    table: table.to_string(),
                    before: before.clone(),
                    after: after.clone(),
                });
            }
        }
    }

    let mut added: Vec<&Column> = new
        .columns()
        .iter()
        .filter(|c| !old_names.contains(c.name().as_str()))
        .collect();
    for removed in old.columns().iter().filter(|c| !new_names.contains(c.name().as_str())) {
        match added.iter().position(|candidate| same_shape(removed, candidate)) {
            Some(index) => {
                let renamed = added.remove(index);
                changes.push(SchemaChange::ColumnRenamed {
                    table: table.to_string(),
                    from: removed.name().to_string(),
                    to: renamed.name().to_string(),
                });
            }
            None => changes.push(SchemaChange::ColumnRemoved {
                table: table.to_string(),
                column: removed.name().to_string(),
            }),
        }
    }
    changes.extend(added.into_iter().map(|column| SchemaChange::ColumnAdded {
        table: table.to_string(),
        column: column.clone(),
    }));
}

/// Structural changes between two ordered table lists.
///
/// Tables are matched by name. Within a matched table a removed column and
/// an added column with the same type, uniqueness and primary-key flags are
/// reported as a rename, pairing in declaration order.
pub fn diff_tables(old: &[Table], new: &[Table]) -> Vec<SchemaChange> {
    let old_by_name: HashMap<&str, &Table> = old.iter().map(|t| (t.name(), t)).collect();
    let new_names: HashSet<&str> = new.iter().map(Table::name).collect();
    let mut changes = Vec::new();

    for table in old.iter().filter(|t| !new_names.contains(t.name())) {
        changes.push(SchemaChange::TableRemoved(table.name().to_string()));
    }
    for table in new {
        match old_by_name.get(table.name()) {
            Some(previous) => diff_columns(table.name(), previous, table, &mut changes),
            None => changes.push(SchemaChange::TableAdded(table.clone())),
        }
    }
    debug!(changes = changes.len(), "Computed schema diff");
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqlType;

    fn table(name: &str, columns: Vec<Column>) -> Table {
        Table::builder(name)
            .column(Column::serial_primary_key("id").unwrap())
            .columns(columns)
            .build()
            .unwrap()
    }

    #[test]
    fn test_identical_schemas_have_no_changes() {
        let tables = vec![table("a", vec![Column::new("x", SqlType::text()).unwrap()])];
        assert!(diff_tables(&tables, &tables).is_empty());
    }

    #[test]
    fn test_table_added_and_removed() {
        let old = vec![table("a", vec![])];
        let new = vec![table("b", vec![])];
        let changes = diff_tables(&old, &new);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], SchemaChange::TableRemoved("a".to_string()));
        assert!(matches!(&changes[1], SchemaChange::TableAdded(t) if t.name() == "b"));
    }

    #[test]
    fn test_rename_detected() {
        let old = vec![table("a", vec![Column::new("nick", SqlType::text()).unwrap()])];
        let new = vec![table("a", vec![Column::new("nickname", SqlType::text()).unwrap()])];
        assert_eq!(
            diff_tables(&old, &new),
            vec![SchemaChange::ColumnRenamed {
                table: "a".to_string(),
                from: "nick".to_string(),
                to: "nickname".to_string(),
            }]
        );
    }

    #[test]
    fn test_type_change_is_not_rename() {
        let old = vec![table("a", vec![Column::new("n", SqlType::text()).unwrap()])];
        let new = vec![table("a", vec![Column::new("m", SqlType::integer()).unwrap()])];
        let changes = diff_tables(&old, &new);
        assert!(matches!(&changes[0], SchemaChange::ColumnRemoved { column, .. } if column == "n"));
        assert!(matches!(&changes[1], SchemaChange::ColumnAdded { column, .. } if column.name() == "m"));
    }

    #[test]
    fn test_altered_column() {
        let old = vec![table("a", vec![Column::new("n", SqlType::integer()).unwrap()])];
        let new = vec![table("a", vec![Column::new("n", SqlType::big_integer()).unwrap()])];
        let changes = diff_tables(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].to_string(), "~ column a.n: n INTEGER -> n BIGINT");
    }

    #[test]
    fn test_snapshot_round_trip() {
        let registry = SchemaRegistry::new()
            .with(table("a", vec![Column::new("n", SqlType::integer()).unwrap()]))
            .unwrap();
        let snapshot = SchemaSnapshot::of(&registry);
        let json = snapshot.to_json().unwrap();
        let parsed = SchemaSnapshot::from_json(&json).unwrap();
        assert_eq!(parsed, snapshot);
        assert!(snapshot.diff(&parsed).is_empty());
        assert_eq!(parsed.into_registry().unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_rejects_invalid_table() {
        let json = r#"{"version": 1, "tables": [{"name": "a", "columns": []}]}"#;
        let err = SchemaSnapshot::from_json(json).unwrap_err();
        assert!(matches!(err.kind, SchemaErrorKind::InvalidSnapshot(_)));
    }

    #[test]
    fn test_snapshot_rejects_unknown_version() {
        let json = r#"{"version": 99, "tables": []}"#;
        assert!(SchemaSnapshot::from_json(json).is_err());
    }
}
