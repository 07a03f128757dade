//! The database gateway.
//!
//! [`Database`] is the only path from models to the engine. It owns the
//! connection, creates the declared tables when opened, turns models into
//! statements, reassembles result rows into models, and coordinates
//! transactions and migrations.

use crate::transaction::{Completion, TransactionState};
use parking_lot::Mutex;
use rowmodel_core::{
    Connection, Error, Model, ModelSchema, Result, Row, SchemaError, SchemaErrorKind, Value,
};
use rowmodel_query::{DeleteBuilder, InsertBuilder, Select, UpdateBuilder};
use rowmodel_schema::{MigrationRegistry, MigrationStatus};
use rowmodel_sqlite::{SqliteConfig, SqliteConnection};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// A registered migration action.
pub type MigrationAction<C> = Arc<dyn Fn(&Database<C>) -> Result<()> + Send + Sync>;

/// Gateway over a SQLite connection.
pub type SqliteDatabase = Database<SqliteConnection>;

/// Models, statements and transactions over one engine connection.
///
/// Share a handle between threads and repositories through an `Arc`.
pub struct Database<C: Connection> {
    conn: C,
    schemas: Vec<Arc<ModelSchema>>,
    migrations: Mutex<MigrationRegistry<MigrationAction<C>>>,
    tx: TransactionState<C>,
}

impl<C: Connection + 'static> fmt::Debug for Database<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.schemas.iter().map(|s| s.name()).collect();
        f.debug_struct("Database")
            .field("schemas", &names)
            .field("migrations", &self.migrations.lock().len())
            .field("in_transaction", &self.tx.is_active())
            .finish_non_exhaustive()
    }
}

impl<C: Connection + 'static> Database<C> {
    /// Wrap `conn` and create a table for every schema that lacks one.
    ///
    /// Tables are created so that foreign-key targets come first. A failure
    /// names the table it happened on.
    #[tracing::instrument(level = "info", skip(conn, schemas), fields(tables = schemas.len()))]
    pub fn open(conn: C, schemas: &[Arc<ModelSchema>]) -> Result<Self> {
        let ordered = rowmodel_schema::dependency_order(schemas);
        for schema in &ordered {
            let sql = rowmodel_schema::create_table(schema);
            conn.execute(&sql)
                .map_err(|e| Error::Custom(format!("On '{}' -> {}", schema.name(), e)))?;
            tracing::info!(table = schema.name(), "Table ready");
        }

        Ok(Self {
            conn,
            schemas: ordered,
            migrations: Mutex::new(MigrationRegistry::new()),
            tx: TransactionState::new(),
        })
    }

    /// Use `name` for the migration bookkeeping table instead of the default.
    pub fn with_migration_table(mut self, name: impl Into<String>) -> Result<Self> {
        let registry = std::mem::take(self.migrations.get_mut());
        *self.migrations.get_mut() = registry.table_name(name)?;
        Ok(self)
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Schemas whose tables were created on open, targets first.
    pub fn schemas(&self) -> &[Arc<ModelSchema>] {
        &self.schemas
    }

    /// Execute one statement, streaming rows to `on_row`.
    ///
    /// Returns the number of rows changed, 0 for reads.
    pub fn run(&self, sql: &str, on_row: &mut dyn FnMut(&Row) -> ControlFlow<()>) -> Result<u64> {
        self.conn.run(sql, on_row)
    }

    /// Execute a statement, discarding any rows.
    pub fn execute(&self, sql: &str) -> Result<u64> {
        self.conn.execute(sql)
    }

    /// Execute a statement and collect every row.
    pub fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.conn.query(sql)
    }

    /// Execute a statement and return its first row.
    pub fn query_one(&self, sql: &str) -> Result<Option<Row>> {
        self.conn.query_one(sql)
    }

    /// Row id generated by the most recent insert.
    pub fn last_insert_id(&self) -> i64 {
        self.conn.last_insert_id()
    }

    /// Insert `model` and return it as stored, with engine-assigned values
    /// such as the serial id and column defaults filled in.
    #[tracing::instrument(level = "debug", skip(self, model), fields(table = model.name()))]
    pub fn insert(&self, model: &Model) -> Result<Model> {
        let sql = InsertBuilder::new(model).build()?;
        self.conn.execute(&sql)?;

        let id = self.conn.last_insert_id();
        tracing::debug!(table = model.name(), rowid = id, "Inserted row");

        self.find_by_rowid(model.schema(), id)?.ok_or_else(|| {
            Error::Consistency(format!(
                "unable to recover model sequence for '{}' (ROWID {})",
                model.name(),
                id
            ))
        })
    }

    /// Update the row identified by `model`'s primary keys.
    ///
    /// Returns the number of rows changed. A model with nothing to assign is
    /// a no-op.
    #[tracing::instrument(level = "debug", skip(self, model), fields(table = model.name()))]
    pub fn update(&self, model: &Model) -> Result<u64> {
        match UpdateBuilder::new(model).build()? {
            Some(sql) => self.conn.execute(&sql),
            None => {
                tracing::debug!(table = model.name(), "Nothing to update");
                Ok(0)
            }
        }
    }

    /// Delete the row identified by `model`'s primary keys.
    #[tracing::instrument(level = "debug", skip(self, model), fields(table = model.name()))]
    pub fn remove(&self, model: &Model) -> Result<u64> {
        let sql = DeleteBuilder::for_model(model)?.build();
        self.conn.execute(&sql)
    }

    /// Read the row with engine row id `rowid`.
    pub fn find_by_rowid(&self, schema: &Arc<ModelSchema>, rowid: i64) -> Result<Option<Model>> {
        let sql = Select::new(schema).rowid(rowid).build();
        self.conn
            .query_one(&sql)?
            .map(|row| model_from_row(schema, row))
            .transpose()
    }

    /// Create `schema`'s table if it does not exist.
    pub fn create_table(&self, schema: &ModelSchema) -> Result<()> {
        self.conn.execute(&rowmodel_schema::create_table(schema))?;
        tracing::info!(table = schema.name(), "Table ready");
        Ok(())
    }

    /// Drop `schema`'s table if it exists.
    pub fn drop_table(&self, schema: &ModelSchema) -> Result<()> {
        self.conn.execute(&rowmodel_schema::drop_table(schema))?;
        tracing::info!(table = schema.name(), "Dropped table");
        Ok(())
    }

    /// Run `action` inside a transaction.
    ///
    /// If a transaction is already in progress on this handle, `action` is
    /// queued to run inside it just before it commits, and `Deferred` is
    /// returned at once. Otherwise this call owns the transaction: any
    /// failure, its own or a queued action's, rolls everything back and is
    /// returned.
    pub fn transaction<F>(&self, action: F) -> Result<Completion>
    where
        F: FnOnce(&Self) -> Result<()> + Send + 'static,
    {
        self.tx.run(self, action)
    }

    /// Whether a transaction is in progress on this handle.
    pub fn in_transaction(&self) -> bool {
        self.tx.is_active()
    }

    /// Register a migration to be applied by [`build`](Self::build).
    ///
    /// Ids must be positive and unique on this handle.
    pub fn add_migration<F>(&self, id: i64, action: F) -> Result<&Self>
    where
        F: Fn(&Self) -> Result<()> + Send + Sync + 'static,
    {
        self.migrations.lock().add(id, Arc::new(action))?;
        tracing::debug!(id = id, "Registered migration");
        Ok(self)
    }

    /// Stored migration version, 0 when no migration ever ran.
    pub fn migration_version(&self) -> Result<i64> {
        self.ensure_migration_table()?;
        self.stored_version()
    }

    fn stored_version(&self) -> Result<i64> {
        let sql = self.migrations.lock().select_version_sql();
        let version = self
            .conn
            .query_one(&sql)?
            .and_then(|row| row.get(0).and_then(Value::as_i64))
            .unwrap_or(0);
        Ok(version)
    }

    /// Status of every registered migration against the stored version.
    pub fn migration_status(&self) -> Result<Vec<(i64, MigrationStatus)>> {
        let version = self.migration_version()?;
        Ok(self.migrations.lock().status(version))
    }

    /// Apply pending migrations in ascending id order.
    ///
    /// Each migration runs with its version update in one transaction, so a
    /// failure leaves earlier migrations committed and stops at the failing
    /// one. Running `build` again applies nothing twice.
    #[tracing::instrument(level = "info", skip(self))]
    pub fn build(&self) -> Result<()> {
        let version = self.migration_version()?;
        let (table, pending) = {
            let registry = self.migrations.lock();
            let pending: Vec<_> = registry
                .pending(version)
                .map(|m| (m.id(), Arc::clone(m.action()), registry.update_version_sql(m.id())))
                .collect();
            (registry.table().to_string(), pending)
        };

        if pending.is_empty() {
            tracing::debug!(version = version, "No pending migrations");
            return Ok(());
        }

        for (id, action, update_sql) in pending {
            let table = table.clone();
            let completion = self.transaction(move |db| {
                // Another build may have applied it since the version was read.
                if db.stored_version()? >= id {
                    tracing::debug!(id = id, "Migration already applied");
                    return Ok(());
                }
                action(db)
                    .and_then(|()| db.execute(&update_sql).map(drop))
                    .map_err(|e| migration_error(&table, id, e))?;
                tracing::info!(table = %table, id = id, "Applied migration");
                Ok(())
            })?;

            if completion.is_deferred() {
                tracing::warn!(id = id, "Migration deferred into the open transaction");
            }
        }
        Ok(())
    }

    fn ensure_migration_table(&self) -> Result<()> {
        let (create, seed) = {
            let registry = self.migrations.lock();
            (registry.create_table_sql(), registry.seed_version_sql())
        };
        self.conn.execute(&create)?;
        self.conn.execute(&seed)?;
        Ok(())
    }
}

impl Database<SqliteConnection> {
    /// Open an in-memory SQLite database with `schemas`.
    pub fn open_memory(schemas: &[Arc<ModelSchema>]) -> Result<Self> {
        Self::open(SqliteConnection::open_memory()?, schemas)
    }

    /// Open (creating if needed) the SQLite file at `path` with `schemas`.
    pub fn open_file(path: impl Into<String>, schemas: &[Arc<ModelSchema>]) -> Result<Self> {
        Self::open(SqliteConnection::open_file(path)?, schemas)
    }

    /// Open SQLite with explicit configuration.
    pub fn open_sqlite(config: &SqliteConfig, schemas: &[Arc<ModelSchema>]) -> Result<Self> {
        Self::open(SqliteConnection::open(config)?, schemas)
    }
}

/// Reassemble a `SELECT *` row into a model of `schema`.
pub(crate) fn model_from_row(schema: &Arc<ModelSchema>, row: Row) -> Result<Model> {
    Model::from_values(schema, row.into_values())
}

fn migration_error(table: &str, id: i64, source: Error) -> Error {
    Error::Schema(SchemaError {
        kind: SchemaErrorKind::Migration,
        message: format!(
            "Unable to proceed with migration [{} v{}]: {}",
            table, id, source
        ),
        source: Some(Box::new(source)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmodel_core::Field;

    fn users() -> Arc<ModelSchema> {
        ModelSchema::builder("users")
            .field(Field::serial("id"))
            .field(Field::text("name").not_null())
            .field(Field::int("age"))
            .primary_key(["id"])
            .build()
            .unwrap()
    }

    #[test]
    fn insert_reads_back_assigned_id() {
        let schema = users();
        let db = Database::open_memory(&[Arc::clone(&schema)]).unwrap();

        let model = Model::new(&schema).with("name", "ann").unwrap();
        let stored = db.insert(&model).unwrap();
        assert_eq!(stored.get("id").unwrap(), &Value::Int(1));
        assert_eq!(stored.get("name").unwrap(), &Value::from("ann"));
        assert_eq!(stored.get("age").unwrap(), &Value::Null);
    }

    #[test]
    fn update_without_assignments_is_noop() {
        let tags = ModelSchema::builder("tags")
            .field(Field::serial("id"))
            .primary_key(["id"])
            .build()
            .unwrap();
        let db = Database::open_memory(&[Arc::clone(&tags)]).unwrap();
        let stored = db.insert(&Model::new(&tags)).unwrap();
        assert_eq!(db.update(&stored).unwrap(), 0);
    }

    #[test]
    fn open_names_failing_table() {
        use rowmodel_sqlite::OpenFlags;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.db").to_string_lossy().into_owned();
        SqliteConnection::open_file(path.clone())
            .unwrap()
            .execute_raw("CREATE TABLE other (v INTEGER)")
            .unwrap();

        let config = SqliteConfig::file(path).flags(OpenFlags::read_only());
        let err = Database::open_sqlite(&config, &[users()]).unwrap_err();
        assert!(err.to_string().starts_with("On 'users' -> "), "{err}");
    }

    #[test]
    fn migration_table_name_is_configurable() {
        let db = Database::open_memory(&[])
            .unwrap()
            .with_migration_table("app_versions")
            .unwrap();
        db.add_migration(1, |db| db.execute("CREATE TABLE t (v INTEGER)").map(drop))
            .unwrap();
        db.build().unwrap();

        let row = db
            .query_one("SELECT version FROM app_versions WHERE id = 1")
            .unwrap()
            .unwrap();
        assert_eq!(row.get(0), Some(&Value::Int(1)));
    }

    #[test]
    fn debug_lists_tables() {
        let db = Database::open_memory(&[users()]).unwrap();
        let text = format!("{:?}", db);
        assert!(text.contains("users"));
    }
}
