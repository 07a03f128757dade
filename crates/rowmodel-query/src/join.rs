//! Inner-join SELECT over several models.

use rowmodel_core::{Error, ModelSchema, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// A join predicate derived from a foreign key between two constituents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPredicate {
    pub table: String,
    pub column: String,
    pub target_table: String,
    pub target_column: String,
}

impl JoinPredicate {
    pub fn to_sql(&self) -> String {
        format!(
            "{}.{} = {}.{}",
            self.table, self.column, self.target_table, self.target_column
        )
    }
}

/// SELECT builder joining every constituent model.
///
/// Columns come back as `a.*, b.*, ...` in constituent order, so each row
/// holds exactly `field_count` cells per constituent. Join predicates are
/// taken from foreign keys whose target is also a constituent.
#[derive(Debug, Clone)]
pub struct CompositeSelect<'a> {
    constituents: &'a [Arc<ModelSchema>],
}

impl<'a> CompositeSelect<'a> {
    /// Fails when there are no constituents or one appears twice.
    pub fn new(constituents: &'a [Arc<ModelSchema>]) -> Result<Self> {
        if constituents.is_empty() {
            return Err(Error::Custom(
                "a composite needs at least one model".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for schema in constituents {
            if !seen.insert(schema.name()) {
                return Err(Error::Custom(format!(
                    "model '{}' appears twice in a composite",
                    schema.name()
                )));
            }
        }
        Ok(Self { constituents })
    }

    /// Predicates in constituent, then foreign key, order.
    pub fn predicates(&self) -> Vec<JoinPredicate> {
        let names: HashSet<&str> = self.constituents.iter().map(|s| s.name()).collect();
        self.constituents
            .iter()
            .flat_map(|schema| {
                schema
                    .foreign_keys()
                    .iter()
                    .filter(|fk| names.contains(fk.target().name()))
                    .map(|fk| JoinPredicate {
                        table: schema.name().to_string(),
                        column: fk.field().to_string(),
                        target_table: fk.target().name().to_string(),
                        target_column: fk.target_key().to_string(),
                    })
            })
            .collect()
    }

    /// Build the joined SELECT SQL.
    pub fn build(&self) -> String {
        let columns: Vec<_> = self
            .constituents
            .iter()
            .map(|s| format!("{}.*", s.name()))
            .collect();
        let tables: Vec<_> = self.constituents.iter().map(|s| s.name()).collect();

        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            tables.join(" INNER JOIN ")
        );

        let predicates: Vec<_> = self.predicates().iter().map(JoinPredicate::to_sql).collect();
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }
        sql
    }
}
