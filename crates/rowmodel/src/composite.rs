//! Joined reads and writes across several models.

use crate::batch::{BatchReport, run_batch};
use crate::database::Database;
use crate::transaction::Completion;
use rowmodel_core::{Connection, Error, Model, ModelSchema, Result, Value};
use rowmodel_query::{CompositeSelect, UpdateBuilder};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// One joined row: a model per constituent, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeRecord {
    models: Vec<Model>,
}

impl CompositeRecord {
    /// Split `values` into consecutive runs of `field_count` cells, one per
    /// constituent.
    pub fn from_values(constituents: &[Arc<ModelSchema>], values: Vec<Value>) -> Result<Self> {
        let expected: usize = constituents.iter().map(|s| s.field_count()).sum();
        if values.len() != expected {
            return Err(Error::Consistency(format!(
                "joined row has {} cells, expected {}",
                values.len(),
                expected
            )));
        }

        let mut cells = values.into_iter();
        let models = constituents
            .iter()
            .map(|schema| {
                let chunk: Vec<Value> = cells.by_ref().take(schema.field_count()).collect();
                Model::from_values(schema, chunk)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { models })
    }

    /// Constituent models in declaration order.
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn into_models(self) -> Vec<Model> {
        self.models
    }

    /// The constituent model for `table`.
    pub fn model(&self, table: &str) -> Result<&Model> {
        self.models
            .iter()
            .find(|m| m.name() == table)
            .ok_or_else(|| unknown_constituent(table))
    }

    pub fn model_mut(&mut self, table: &str) -> Result<&mut Model> {
        self.models
            .iter_mut()
            .find(|m| m.name() == table)
            .ok_or_else(|| unknown_constituent(table))
    }

    /// Read `field` of the `table` constituent.
    pub fn get(&self, table: &str, field: &str) -> Result<&Value> {
        self.model(table)?.get(field)
    }

    /// Assign `field` of the `table` constituent.
    pub fn set(&mut self, table: &str, field: &str, value: impl Into<Value>) -> Result<()> {
        self.model_mut(table)?.set(field, value)
    }
}

fn unknown_constituent(table: &str) -> Error {
    Error::Custom(format!("'{}' is not part of this composite", table))
}

impl Serialize for CompositeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.models.len()))?;
        for model in &self.models {
            map.serialize_entry(model.name(), model)?;
        }
        map.end()
    }
}

impl fmt::Display for CompositeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// Reads and writes over the inner join of several models.
///
/// Constituents are joined on their foreign keys that point at another
/// constituent; a constituent without such a key is still joined, as a
/// cross product.
pub struct CompositeRepository<C: Connection> {
    db: Arc<Database<C>>,
    constituents: Vec<Arc<ModelSchema>>,
}

impl<C: Connection> fmt::Debug for CompositeRepository<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.constituents.iter().map(|s| s.name()).collect();
        f.debug_struct("CompositeRepository")
            .field("constituents", &names)
            .finish_non_exhaustive()
    }
}

impl<C: Connection + 'static> CompositeRepository<C> {
    /// Fails when `constituents` is empty or names a model twice.
    pub fn new(db: Arc<Database<C>>, constituents: Vec<Arc<ModelSchema>>) -> Result<Self> {
        CompositeSelect::new(&constituents)?;
        Ok(Self { db, constituents })
    }

    pub fn constituents(&self) -> &[Arc<ModelSchema>] {
        &self.constituents
    }

    /// The joined SELECT this repository runs.
    pub fn select_sql(&self) -> Result<String> {
        Ok(CompositeSelect::new(&self.constituents)?.build())
    }

    /// Every joined row.
    pub fn load_all(&self) -> Result<Vec<CompositeRecord>> {
        let sql = self.select_sql()?;

        let mut records = Vec::new();
        let mut failure = None;
        self.db.run(&sql, &mut |row| {
            match CompositeRecord::from_values(&self.constituents, row.values().to_vec()) {
                Ok(record) => {
                    records.push(record);
                    ControlFlow::Continue(())
                }
                Err(e) => {
                    failure = Some(e);
                    ControlFlow::Break(())
                }
            }
        })?;

        if let Some(e) = failure {
            return Err(e);
        }
        tracing::debug!(count = records.len(), "Loaded composite records");
        Ok(records)
    }

    /// Update every constituent of `record` in one transaction.
    pub fn update(&self, record: &CompositeRecord) -> Result<Completion> {
        self.check_record(record)?;
        let record = record.clone();
        self.db.transaction(move |db| update_record(db, &record))
    }

    /// Update each record inside one transaction, reporting per-record
    /// failures.
    pub fn update_all(
        &self,
        records: impl IntoIterator<Item = CompositeRecord>,
    ) -> Result<BatchReport> {
        let records: Vec<_> = records.into_iter().collect();
        for record in &records {
            self.check_record(record)?;
        }
        run_batch(&self.db, records, update_record)
    }

    fn check_record(&self, record: &CompositeRecord) -> Result<()> {
        let matches = record.models.len() == self.constituents.len()
            && record
                .models
                .iter()
                .zip(&self.constituents)
                .all(|(model, schema)| model.schema() == schema);
        if matches {
            Ok(())
        } else {
            Err(Error::Custom(
                "record does not belong to this composite".to_string(),
            ))
        }
    }
}

const RECORD_SAVEPOINT: &str = "rowmodel_record";

/// Write every constituent of `record`, or none of them.
///
/// All statements are built, and so type-checked, before the first one runs.
/// Engine failures part way through roll back to a savepoint taken just
/// before the record, leaving the enclosing transaction usable.
fn update_record<C: Connection + 'static>(db: &Database<C>, record: &CompositeRecord) -> Result<()> {
    let statements = record
        .models()
        .iter()
        .map(|model| UpdateBuilder::new(model).build())
        .collect::<Result<Vec<_>>>()?;

    db.execute(&format!("SAVEPOINT {RECORD_SAVEPOINT}"))?;
    let written = statements
        .iter()
        .flatten()
        .try_for_each(|sql| db.execute(sql).map(drop));

    if let Err(e) = written {
        tracing::debug!(error = %e, "Rolling back composite record");
        db.execute(&format!("ROLLBACK TO SAVEPOINT {RECORD_SAVEPOINT}"))?;
        db.execute(&format!("RELEASE SAVEPOINT {RECORD_SAVEPOINT}"))?;
        return Err(e);
    }
    db.execute(&format!("RELEASE SAVEPOINT {RECORD_SAVEPOINT}"))
        .map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmodel_core::Field;

    fn schemas() -> (Arc<ModelSchema>, Arc<ModelSchema>) {
        let customers = ModelSchema::builder("customers")
            .field(Field::serial("id"))
            .field(Field::text("name").not_null())
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
        (orders, customers)
    }

    #[test]
    fn record_splits_cells_by_field_count() {
        let (orders, customers) = schemas();
        let constituents = vec![orders, customers];
        let record = CompositeRecord::from_values(
            &constituents,
            vec![Value::Int(7), Value::Int(1), Value::Int(1), Value::from("ann")],
        )
        .unwrap();

        assert_eq!(record.get("orders", "id").unwrap(), &Value::Int(7));
        assert_eq!(record.get("customers", "id").unwrap(), &Value::Int(1));
        assert_eq!(record.get("customers", "name").unwrap(), &Value::from("ann"));
        assert!(record.get("invoices", "id").is_err());
        assert_eq!(
            record.to_string(),
            r#"{"orders":{"id":7,"customer_id":1},"customers":{"id":1,"name":"ann"}}"#
        );
    }

    #[test]
    fn record_rejects_wrong_width() {
        let (orders, customers) = schemas();
        let err = CompositeRecord::from_values(&[orders, customers], vec![Value::Int(1)])
            .unwrap_err();
        assert!(matches!(err, Error::Consistency(_)));
    }

    #[test]
    fn repository_requires_distinct_constituents() {
        let (orders, _) = schemas();
        let db = Arc::new(Database::open_memory(&[Arc::clone(&orders)]).unwrap());
        assert!(CompositeRepository::new(Arc::clone(&db), Vec::new()).is_err());
        assert!(CompositeRepository::new(db, vec![Arc::clone(&orders), orders]).is_err());
    }
}
