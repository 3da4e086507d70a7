//! Ordered registry of table definitions.

use crate::Table;
use guildkeeper_error::{SchemaError, SchemaErrorKind, SchemaResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Process-wide, ordered collection of every declared table.
///
/// Registration order is the order tables are created in, and the reverse
/// of the order they are dropped in. A table can only reference tables
/// registered before it.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: Vec<Arc<Table>>,
    by_name: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a table.
    ///
    /// # Errors
    ///
    /// Fails when a table with the same name is registered, or a foreign key
    /// targets a table or column that is not registered.
    #[instrument(skip(self, table), fields(table = %table.name()))]
    pub fn register(&mut self, table: Table) -> SchemaResult<Arc<Table>> {
        if self.by_name.contains_key(table.name()) {
            return Err(SchemaError::new(SchemaErrorKind::DuplicateTable(
                table.name().to_string(),
            )));
        }
        for (column, fk) in table.foreign_keys() {
            let resolved = if fk.table() == table.name() {
                table.column(fk.column()).is_some()
            } else {
                self.get(fk.table())
                    .is_some_and(|target| target.column(fk.column()).is_some())
            };
            if !resolved {
                return Err(SchemaError::new(SchemaErrorKind::UnresolvedReference {
                    table: table.name().to_string(),
                    column: column.name().to_string(),
                    target: format!("{}.{}", fk.table(), fk.column()),
                }));
            }
        }
        let table = Arc::new(table);
        self.by_name
            .insert(table.name().to_string(), self.tables.len());
        self.tables.push(Arc::clone(&table));
        debug!(total = self.tables.len(), "Registered table");
        Ok(table)
    }

    /// Builder-style [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn with(mut self, table: Table) -> SchemaResult<Self> {
        self.register(table)?;
        Ok(self)
    }

    /// Table by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Table>> {
        self.by_name.get(name).map(|index| &self.tables[*index])
    }

    /// Tables in registration order.
    pub fn tables(&self) -> &[Arc<Table>] {
        &self.tables
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Column, SqlType};

    fn parent() -> Table {
        Table::builder("guilds")
            .column(
                Column::builder("guild_id", SqlType::big_integer())
                    .primary_key(true)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn child(target_column: &str) -> Table {
        Table::builder("roles")
            .column(
                Column::builder("role_id", SqlType::big_integer())
                    .primary_key(true)
                    .build()
                    .unwrap(),
            )
            .column(
                Column::new(
                    "guild_id",
                    SqlType::references("guilds", target_column, SqlType::big_integer()).unwrap(),
                )
                .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_preserves_order() {
        let registry = SchemaRegistry::new()
            .with(parent())
            .unwrap()
            .with(child("guild_id"))
            .unwrap();
        let names: Vec<&str> = registry.tables().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["guilds", "roles"]);
        assert!(registry.get("roles").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register(parent()).unwrap();
        let err = registry.register(parent()).unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::DuplicateTable("guilds".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregistered_reference_rejected() {
        let err = SchemaRegistry::new().with(child("guild_id")).unwrap_err();
        assert!(matches!(err.kind, SchemaErrorKind::UnresolvedReference { .. }));
    }

    #[test]
    fn test_reference_to_missing_column_rejected() {
        let err = SchemaRegistry::new()
            .with(parent())
            .unwrap()
            .with(child("id"))
            .unwrap_err();
        assert_eq!(
            err.kind,
            SchemaErrorKind::UnresolvedReference {
                table: "roles".to_string(),
                column: "guild_id".to_string(),
                target: "guilds.id".to_string(),
            }
        );
    }

    #[test]
    fn test_self_reference_allowed() {
        let table = Table::builder("threads")
            .column(Column::serial_primary_key("id").unwrap())
            .column(
                Column::new(
                    "parent_id",
                    SqlType::references("threads", "id", SqlType::integer()).unwrap(),
                )
                .unwrap(),
            )
            .build()
            .unwrap();
        assert!(SchemaRegistry::new().with(table).is_ok());
    }
}
