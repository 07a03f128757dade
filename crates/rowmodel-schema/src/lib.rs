//! Schema DDL and migration bookkeeping for rowmodel.
//!
//! This crate provides:
//! - CREATE TABLE / DROP TABLE generation from a `ModelSchema`
//! - the migration registry (ordering, duplicate detection)
//! - SQL for the migration version table

pub mod create;
pub mod migrate;

pub use create::{CreateTable, drop_table};
pub use migrate::{
    DEFAULT_MIGRATION_TABLE, Migration, MigrationRegistry, MigrationStatus,
};

use rowmodel_core::ModelSchema;
use std::sync::Arc;

/// `CREATE TABLE IF NOT EXISTS` for a model.
///
/// # Example
///
/// ```
/// use rowmodel_core::{Field, ModelSchema};
///
/// let tags = ModelSchema::builder("tags")
///     .field(Field::text("label").not_null())
///     .primary_key(["label"])
///     .build()
///     .unwrap();
///
/// assert_eq!(
///     rowmodel_schema::create_table(&tags),
///     "CREATE TABLE IF NOT EXISTS tags (label TEXT NOT NULL, PRIMARY KEY (label))"
/// );
/// ```
pub fn create_table(schema: &ModelSchema) -> String {
    CreateTable::new(schema).if_not_exists().build()
}

/// `schemas` reordered so every foreign-key target precedes its referrers.
///
/// Models referenced through foreign keys but not listed are not included.
pub fn dependency_order(schemas: &[Arc<ModelSchema>]) -> Vec<Arc<ModelSchema>> {
    fn visit(
        schema: &Arc<ModelSchema>,
        listed: &[Arc<ModelSchema>],
        ordered: &mut Vec<Arc<ModelSchema>>,
        visiting: &mut Vec<String>,
    ) {
        let name = schema.name();
        if ordered.iter().any(|s| s.name() == name) || visiting.iter().any(|v| v == name) {
            return;
        }
        visiting.push(name.to_string());
        for fk in schema.foreign_keys() {
            if let Some(target) = listed.iter().find(|s| s.name() == fk.target().name()) {
                visit(target, listed, ordered, visiting);
            }
        }
        visiting.pop();
        ordered.push(Arc::clone(schema));
    }

    let mut ordered = Vec::with_capacity(schemas.len());
    let mut visiting = Vec::new();

    for schema in schemas {
        visit(schema, schemas, &mut ordered, &mut visiting);
    }
    ordered
}

/// Create statements for `schemas`, ordered so referenced tables come first.
pub fn create_all(schemas: &[Arc<ModelSchema>]) -> Vec<String> {
    dependency_order(schemas)
        .iter()
        .map(|schema| create_table(schema))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmodel_core::Field;

    #[test]
    fn create_all_puts_targets_first() {
        let customers = ModelSchema::builder("customers")
            .field(Field::serial("id"))
            .primary_key(["id"])
            .build()
            .unwrap();
        let orders = ModelSchema::builder("orders")
            .field(Field::serial("id"))
            .field(Field::int("customer_id").not_null())
            .primary_key(["id"])
            .foreign_key("customer_id", &customers)
            .build()
            .unwrap();

        let sql = create_all(&[Arc::clone(&orders), Arc::clone(&customers)]);
        assert_eq!(sql.len(), 2);
        assert!(sql[0].contains("EXISTS customers"));
        assert!(sql[1].contains("EXISTS orders"));

        let order = dependency_order(&[orders, Arc::clone(&customers)]);
        assert_eq!(order.len(), 2);
        assert!(Arc::ptr_eq(&order[0], &customers));
    }
}
