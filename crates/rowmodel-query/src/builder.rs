//! Statement builders for INSERT, UPDATE and DELETE.
//!
//! Values are checked against their fields before any SQL text is produced,
//! so a type mismatch never reaches the engine.

use crate::clause::{Filter, key_predicate, literal};
use rowmodel_core::{Field, FieldKind, Model, ModelSchema, Result, Value};

/// Columns to write for `model`, in field order.
///
/// A NULL destined for a non-nullable field with a default is left out so the
/// engine applies the default; a NULL serial is left out so the engine
/// assigns it.
fn written_columns(model: &Model) -> Result<Vec<(&Field, &Value)>> {
    let mut out = Vec::with_capacity(model.values().len());
    for (field, value) in model.iter() {
        field.check_write(model.name(), value)?;
        if field.defers_to_default(value) || (value.is_null() && field.kind() == FieldKind::Serial)
        {
            tracing::trace!(table = model.name(), column = field.name(), "Omitting column");
            continue;
        }
        out.push((field, value));
    }
    Ok(out)
}

/// INSERT statement builder.
#[derive(Debug)]
pub struct InsertBuilder<'a> {
    model: &'a Model,
}

impl<'a> InsertBuilder<'a> {
    /// Create a new INSERT builder for the given model instance.
    pub fn new(model: &'a Model) -> Self {
        Self { model }
    }

    /// Build the INSERT SQL.
    ///
    /// Falls back to `DEFAULT VALUES` when every column is left out.
    pub fn build(&self) -> Result<String> {
        let columns = written_columns(self.model)?;
        if columns.is_empty() {
            return Ok(format!("INSERT INTO {} DEFAULT VALUES", self.model.name()));
        }

        let names: Vec<_> = columns.iter().map(|(f, _)| f.name()).collect();
        let values: Vec<_> = columns.iter().map(|(_, v)| literal(v)).collect();

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.model.name(),
            names.join(", "),
            values.join(", ")
        ))
    }
}

/// UPDATE statement builder, keyed by the model's primary keys.
#[derive(Debug)]
pub struct UpdateBuilder<'a> {
    model: &'a Model,
}

impl<'a> UpdateBuilder<'a> {
    /// Create a new UPDATE builder for the given model instance.
    pub fn new(model: &'a Model) -> Self {
        Self { model }
    }

    /// Build the UPDATE SQL.
    ///
    /// Returns `None` when no column would be assigned.
    pub fn build(&self) -> Result<Option<String>> {
        let columns = written_columns(self.model)?;
        let predicate = key_predicate(self.model)?;
        if columns.is_empty() {
            return Ok(None);
        }

        let assignments: Vec<_> = columns
            .iter()
            .map(|(f, v)| format!("{} = {}", f.name(), literal(v)))
            .collect();

        Ok(Some(format!(
            "UPDATE {} SET {} WHERE {}",
            self.model.name(),
            assignments.join(", "),
            predicate
        )))
    }
}

/// DELETE statement builder.
#[derive(Debug)]
pub struct DeleteBuilder {
    table: String,
    predicate: Option<String>,
}

impl DeleteBuilder {
    /// Delete the row identified by `model`'s primary keys.
    pub fn for_model(model: &Model) -> Result<Self> {
        Ok(Self {
            table: model.name().to_string(),
            predicate: Some(key_predicate(model)?),
        })
    }

    /// Delete every row matching `filter`. An empty filter deletes all rows.
    pub fn matching(schema: &ModelSchema, filter: &Filter) -> Result<Self> {
        Ok(Self {
            table: schema.name().to_string(),
            predicate: filter.to_sql(schema)?,
        })
    }

    /// Build the DELETE SQL.
    pub fn build(&self) -> String {
        match &self.predicate {
            Some(p) => format!("DELETE FROM {} WHERE {}", self.table, p),
            None => format!("DELETE FROM {}", self.table),
        }
    }
}
