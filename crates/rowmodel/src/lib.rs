//! rowmodel - schema-described models over embedded SQLite.
//!
//! Application code declares tables as [`ModelSchema`] descriptors built from
//! typed [`Field`]s, primary keys and foreign keys, then reads and writes
//! [`Model`] rows without writing SQL:
//!
//! - [`Database`] creates the declared tables, turns models into statements,
//!   and coordinates transactions and numbered migrations
//! - [`Repository`] gives per-model CRUD, filtered reads and bulk writes
//! - [`CompositeRepository`] reads and updates the inner join of several models
//!
//! # Quick Start
//!
//! ```
//! use rowmodel::prelude::*;
//! use std::sync::Arc;
//!
//! let heroes = ModelSchema::builder("heroes")
//!     .field(Field::serial("id"))
//!     .field(Field::text("name").not_null())
//!     .field(Field::int("age"))
//!     .primary_key(["id"])
//!     .build()
//!     .unwrap();
//!
//! let db = Arc::new(SqliteDatabase::open_memory(&[Arc::clone(&heroes)]).unwrap());
//! let repo = Repository::new(Arc::clone(&db), heroes);
//!
//! // Insert
//! let hero = repo.create().with("name", "Spider-Man").unwrap().with("age", 25).unwrap();
//! let mut hero = repo.save(&hero).unwrap();
//! assert_eq!(hero.get("id").unwrap(), &Value::Int(1));
//!
//! // Update
//! hero.set("age", 26).unwrap();
//! repo.update(&hero).unwrap();
//!
//! // Query (text conditions match substrings)
//! let found = repo.load_by(&Filter::new().eq("name", "Spider")).unwrap();
//! assert_eq!(found[0].get("age").unwrap(), &Value::Int(26));
//!
//! // Delete
//! repo.remove(&hero).unwrap();
//! assert_eq!(repo.count_by(&Filter::new()).unwrap(), 0);
//! ```
//!
//! # Migrations
//!
//! ```
//! use rowmodel::prelude::*;
//!
//! let db = SqliteDatabase::open_memory(&[]).unwrap();
//! db.add_migration(2, |db| db.execute("ALTER TABLE notes ADD COLUMN body TEXT").map(drop))
//!     .unwrap();
//! db.add_migration(1, |db| db.execute("CREATE TABLE notes (id INTEGER)").map(drop))
//!     .unwrap();
//! db.build().unwrap();
//! assert_eq!(db.migration_version().unwrap(), 2);
//! ```

mod batch;
mod composite;
mod database;
mod repository;
mod transaction;

pub use batch::BatchReport;
pub use composite::{CompositeRecord, CompositeRepository};
pub use database::{Database, MigrationAction, SqliteDatabase};
pub use repository::{DEFAULT_ROW_CAP, Repository};
pub use transaction::Completion;

// Re-export all public types from sub-crates
pub use rowmodel_core::{
    ColumnInfo, Connection, Error, Field, FieldKind, ForeignKey, Model, ModelSchema,
    ModelSchemaBuilder, QueryError, QueryErrorKind, Result, Row, SchemaError, SchemaErrorKind,
    TypeError, Value,
};
pub use rowmodel_query::{Filter, OrderBy, OrderDirection};
pub use rowmodel_schema::{DEFAULT_MIGRATION_TABLE, MigrationStatus};
pub use rowmodel_sqlite::{OpenFlags, SqliteConfig, SqliteConnection};

/// Prelude module for convenient imports.
///
/// ```
/// use rowmodel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BatchReport, Completion, CompositeRecord, CompositeRepository, Connection, Database,
        Error, Field, FieldKind, Filter, Model, ModelSchema, Repository, Result, SqliteConfig,
        SqliteConnection, SqliteDatabase, Value,
    };
}
