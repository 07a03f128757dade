//! Migration registry and version bookkeeping.
//!
//! Migrations are numbered actions applied in ascending id order. The highest
//! applied id is stored as the single row of a bookkeeping table, so each
//! migration runs at most once per database file.

use rowmodel_core::{Error, Result, SchemaErrorKind};

/// Default name of the bookkeeping table.
pub const DEFAULT_MIGRATION_TABLE: &str = "_rowmodel_migration";

/// A numbered migration action.
#[derive(Debug, Clone)]
pub struct Migration<A> {
    id: i64,
    action: A,
}

impl<A> Migration<A> {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn action(&self) -> &A {
        &self.action
    }
}

/// Status of a migration relative to a stored version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Migration has not been applied
    Pending,
    /// Migration id is at or below the stored version
    Applied,
}

/// Registered migrations plus the SQL used to track which have run.
///
/// The action type is left open so the registry does not depend on the
/// database gateway that eventually runs them.
#[derive(Debug, Clone)]
pub struct MigrationRegistry<A> {
    migrations: Vec<Migration<A>>,
    table_name: String,
}

impl<A> Default for MigrationRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> MigrationRegistry<A> {
    pub fn new() -> Self {
        Self {
            migrations: Vec::new(),
            table_name: DEFAULT_MIGRATION_TABLE.to_string(),
        }
    }

    /// Set a custom bookkeeping table name.
    pub fn table_name(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        rowmodel_core::check_identifier("migration table", &name)?;
        self.table_name = name;
        Ok(self)
    }

    /// Name of the bookkeeping table.
    pub fn table(&self) -> &str {
        &self.table_name
    }

    /// Register a migration. Ids must be positive and unique.
    ///
    /// Migrations are kept sorted by id, whatever the registration order.
    pub fn add(&mut self, id: i64, action: A) -> Result<()> {
        if id < 1 {
            return Err(Error::schema(
                SchemaErrorKind::InvalidMigration,
                format!("migration id {} must be at least 1", id),
            ));
        }
        match self.migrations.binary_search_by_key(&id, |m| m.id) {
            Ok(_) => Err(Error::schema(
                SchemaErrorKind::DuplicateMigration,
                format!("migration id {} already exists", id),
            )),
            Err(pos) => {
                self.migrations.insert(pos, Migration { id, action });
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// All migrations in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Migration<A>> {
        self.migrations.iter()
    }

    /// Migrations with ids above `version`, ascending.
    pub fn pending(&self, version: i64) -> impl Iterator<Item = &Migration<A>> {
        self.migrations.iter().filter(move |m| m.id > version)
    }

    /// Highest registered id, 0 when empty.
    pub fn latest(&self) -> i64 {
        self.migrations.last().map_or(0, |m| m.id)
    }

    /// Per-migration status relative to `version`.
    pub fn status(&self, version: i64) -> Vec<(i64, MigrationStatus)> {
        self.migrations
            .iter()
            .map(|m| {
                let status = if m.id > version {
                    MigrationStatus::Pending
                } else {
                    MigrationStatus::Applied
                };
                (m.id, status)
            })
            .collect()
    }

    /// Ensure the bookkeeping table exists.
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY, version INTEGER NOT NULL)",
            self.table_name
        )
    }

    /// Seed the singleton row at version 0 if absent.
    pub fn seed_version_sql(&self) -> String {
        format!(
            "INSERT OR IGNORE INTO {} (id, version) VALUES (1, 0)",
            self.table_name
        )
    }

    /// Read the stored version.
    pub fn select_version_sql(&self) -> String {
        format!("SELECT version FROM {} WHERE id = 1", self.table_name)
    }

    /// Persist `version` as the stored version.
    pub fn update_version_sql(&self, version: i64) -> String {
        format!(
            "UPDATE {} SET version = {} WHERE id = 1",
            self.table_name, version
        )
    }
}
