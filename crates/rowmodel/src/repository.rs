//! Per-model data access.

use crate::batch::{BatchReport, run_batch};
use crate::database::{Database, model_from_row};
use rowmodel_core::{Connection, Error, Model, ModelSchema, Result, SchemaErrorKind, Value};
use rowmodel_query::{Count, DeleteBuilder, Filter, OrderBy, OrderDirection, ROWID, Select};
use std::ops::ControlFlow;
use std::sync::Arc;

/// Row cap applied by [`Repository::select`].
pub const DEFAULT_ROW_CAP: usize = 100;

/// Reads and writes for one model over a shared [`Database`].
///
/// Text conditions in filters and key lookups match as substrings, so
/// `name = "bob"` also matches "bobby".
pub struct Repository<C: Connection> {
    db: Arc<Database<C>>,
    schema: Arc<ModelSchema>,
}

impl<C: Connection> Clone for Repository<C> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            schema: Arc::clone(&self.schema),
        }
    }
}

impl<C: Connection> std::fmt::Debug for Repository<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("model", &self.schema.name())
            .finish_non_exhaustive()
    }
}

impl<C: Connection + 'static> Repository<C> {
    pub fn new(db: Arc<Database<C>>, schema: Arc<ModelSchema>) -> Self {
        Self { db, schema }
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn database(&self) -> &Arc<Database<C>> {
        &self.db
    }

    /// A fresh instance of this repository's model, every field NULL.
    pub fn create(&self) -> Model {
        Model::new(&self.schema)
    }

    /// `SELECT * FROM <table> <suffix>`, at most [`DEFAULT_ROW_CAP`] rows.
    pub fn select(&self, suffix: &str) -> Result<Vec<Model>> {
        self.select_limited(suffix, DEFAULT_ROW_CAP)
    }

    /// `SELECT * FROM <table> <suffix>`, at most `cap` rows.
    pub fn select_limited(&self, suffix: &str, cap: usize) -> Result<Vec<Model>> {
        let sql = Select::new(&self.schema).suffix(suffix).build();
        self.collect(&sql, Some(cap))
    }

    /// Every row, in insertion (ROWID) order.
    pub fn load_all(&self) -> Result<Vec<Model>> {
        let sql = Select::new(&self.schema)
            .order_by(OrderBy::asc(ROWID))?
            .build();
        self.collect(&sql, None)
    }

    /// Number of rows matching `filter`.
    pub fn count_by(&self, filter: &Filter) -> Result<u64> {
        let sql = Count::new(&self.schema).filter(filter)?.build();
        let count = self
            .db
            .query_one(&sql)?
            .and_then(|row| row.get(0).and_then(Value::as_i64))
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Rows matching `filter`, in ROWID order.
    pub fn load_by(&self, filter: &Filter) -> Result<Vec<Model>> {
        let sql = Select::new(&self.schema)
            .filter(filter)?
            .order_by(OrderBy::asc(ROWID))?
            .build();
        self.collect(&sql, None)
    }

    /// First row matching `filter` when sorted ascending by `order`.
    ///
    /// The fields decide the result; ROWID only breaks ties, in the same
    /// direction, so equal rows resolve to the oldest.
    pub fn first_by(&self, filter: &Filter, order: &[&str]) -> Result<Option<Model>> {
        self.edge_by(filter, order, OrderDirection::Asc)
    }

    /// First row matching `filter` when sorted descending by `order`.
    ///
    /// Ties resolve to the newest row.
    pub fn last_by(&self, filter: &Filter, order: &[&str]) -> Result<Option<Model>> {
        self.edge_by(filter, order, OrderDirection::Desc)
    }

    /// First row whose primary keys match `keys`, given in key order.
    pub fn find(&self, keys: &[Value]) -> Result<Option<Model>> {
        let names = self.schema.primary_keys();
        if names.is_empty() || names.len() != keys.len() {
            return Err(Error::schema(
                SchemaErrorKind::InvalidKey,
                format!(
                    "'{}' has {} primary key(s) but {} value(s) were given",
                    self.schema.name(),
                    names.len(),
                    keys.len()
                ),
            ));
        }
        let filter: Filter = names.iter().map(String::as_str).zip(keys.iter().cloned()).collect();
        let sql = Select::new(&self.schema)
            .filter(&filter)?
            .order_by(OrderBy::asc(ROWID))?
            .limit(1)
            .build();
        Ok(self.collect(&sql, Some(1))?.into_iter().next())
    }

    /// Insert `model`, returning it as stored.
    pub fn save(&self, model: &Model) -> Result<Model> {
        self.check_model(model)?;
        self.db.insert(model)
    }

    /// Update the row identified by `model`'s primary keys.
    pub fn update(&self, model: &Model) -> Result<u64> {
        self.check_model(model)?;
        self.db.update(model)
    }

    /// Delete the row identified by `model`'s primary keys.
    pub fn remove(&self, model: &Model) -> Result<u64> {
        self.check_model(model)?;
        self.db.remove(model)
    }

    /// Delete every row matching `filter`. An empty filter deletes all rows.
    pub fn remove_by(&self, filter: &Filter) -> Result<u64> {
        let sql = DeleteBuilder::matching(&self.schema, filter)?.build();
        self.db.execute(&sql)
    }

    /// Insert each model inside one transaction, reporting per-item failures.
    pub fn save_all(&self, models: impl IntoIterator<Item = Model>) -> Result<BatchReport> {
        let models = self.owned_batch(models)?;
        run_batch(&self.db, models, |db, model| db.insert(model).map(drop))
    }

    /// Update each model inside one transaction, reporting per-item failures.
    pub fn update_all(&self, models: impl IntoIterator<Item = Model>) -> Result<BatchReport> {
        let models = self.owned_batch(models)?;
        run_batch(&self.db, models, |db, model| db.update(model).map(drop))
    }

    /// Delete each model inside one transaction, reporting per-item failures.
    pub fn remove_all(&self, models: impl IntoIterator<Item = Model>) -> Result<BatchReport> {
        let models = self.owned_batch(models)?;
        run_batch(&self.db, models, |db, model| db.remove(model).map(drop))
    }

    fn edge_by(
        &self,
        filter: &Filter,
        order: &[&str],
        direction: OrderDirection,
    ) -> Result<Option<Model>> {
        if order.is_empty() {
            return Err(Error::Custom(format!(
                "ordering '{}' needs at least one field",
                self.schema.name()
            )));
        }
        let mut select = Select::new(&self.schema).filter(filter)?;
        for field in order {
            select = select.order_by(OrderBy::new(*field, direction))?;
        }
        let sql = select
            .order_by(OrderBy::new(ROWID, direction))?
            .limit(1)
            .build();
        Ok(self.collect(&sql, Some(1))?.into_iter().next())
    }

    fn collect(&self, sql: &str, cap: Option<usize>) -> Result<Vec<Model>> {
        let mut models = Vec::new();
        if cap == Some(0) {
            return Ok(models);
        }

        let mut failure = None;
        self.db.run(sql, &mut |row| {
            match model_from_row(&self.schema, row.clone()) {
                Ok(model) => models.push(model),
                Err(e) => {
                    failure = Some(e);
                    return ControlFlow::Break(());
                }
            }
            if cap.is_some_and(|cap| models.len() >= cap) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        match failure {
            Some(e) => Err(e),
            None => {
                tracing::debug!(table = self.schema.name(), count = models.len(), "Loaded models");
                Ok(models)
            }
        }
    }

    fn check_model(&self, model: &Model) -> Result<()> {
        if model.schema() == &self.schema {
            Ok(())
        } else {
            Err(Error::Custom(format!(
                "a '{}' model cannot be written through the '{}' repository",
                model.name(),
                self.schema.name()
            )))
        }
    }

    fn owned_batch(&self, models: impl IntoIterator<Item = Model>) -> Result<Vec<Model>> {
        let models: Vec<Model> = models.into_iter().collect();
        for model in &models {
            self.check_model(model)?;
        }
        Ok(models)
    }
}
