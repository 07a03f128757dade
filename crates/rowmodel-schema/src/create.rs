//! CREATE TABLE and DROP TABLE statement builders.

use rowmodel_core::{Field, FieldKind, ModelSchema};

/// Builder for CREATE TABLE statements.
#[derive(Debug)]
pub struct CreateTable<'a> {
    schema: &'a ModelSchema,
    if_not_exists: bool,
}

impl<'a> CreateTable<'a> {
    /// Create a new CREATE TABLE builder.
    pub fn new(schema: &'a ModelSchema) -> Self {
        Self {
            schema,
            if_not_exists: false,
        }
    }

    /// Add IF NOT EXISTS clause.
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    fn column_definition(field: &Field) -> String {
        let mut sql = format!("{} {}", field.name(), field.kind().sql_name());
        if field.is_nullable() {
            sql.push_str(" NULL");
        } else {
            sql.push_str(" NOT NULL");
            if let Some(default) = field.default() {
                sql.push_str(" DEFAULT ");
                sql.push_str(default);
            }
        }
        sql
    }

    /// Build the CREATE TABLE SQL.
    ///
    /// A serial field carries its own `PRIMARY KEY`, so the table-level
    /// clause is only emitted for models without one.
    pub fn build(&self) -> String {
        let schema = self.schema;
        let mut parts: Vec<String> = schema
            .fields()
            .iter()
            .map(Self::column_definition)
            .collect();

        let has_serial = schema
            .fields()
            .iter()
            .any(|f| f.kind() == FieldKind::Serial);
        if !has_serial && !schema.primary_keys().is_empty() {
            parts.push(format!("PRIMARY KEY ({})", schema.primary_keys().join(", ")));
        }

        for fk in schema.foreign_keys() {
            parts.push(format!(
                "FOREIGN KEY({}) REFERENCES {}({})",
                fk.field(),
                fk.target().name(),
                fk.target_key()
            ));
        }

        let mut sql = String::from("CREATE TABLE ");
        if self.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(schema.name());
        sql.push_str(" (");
        sql.push_str(&parts.join(", "));
        sql.push(')');
        sql
    }
}

/// `DROP TABLE IF EXISTS` for a model's table.
pub fn drop_table(schema: &ModelSchema) -> String {
    format!("DROP TABLE IF EXISTS {}", schema.name())
}
