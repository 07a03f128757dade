//! SELECT and COUNT builders over a single model.

use crate::clause::{Filter, OrderBy};
use rowmodel_core::{ModelSchema, Result};

/// Engine row id pseudo-column, always valid for ordering.
pub const ROWID: &str = "ROWID";

/// SELECT query builder.
///
/// ```
/// use rowmodel_core::{Field, ModelSchema};
/// use rowmodel_query::{Filter, OrderBy, Select};
///
/// let users = ModelSchema::builder("users")
///     .field(Field::serial("id"))
///     .field(Field::text("name").not_null())
///     .primary_key(["id"])
///     .build()
///     .unwrap();
///
/// let sql = Select::new(&users)
///     .filter(&Filter::new().eq("name", "bo"))
///     .unwrap()
///     .order_by(OrderBy::desc("id"))
///     .unwrap()
///     .limit(1)
///     .build();
/// assert_eq!(
///     sql,
///     "SELECT * FROM users WHERE (name LIKE '%bo%') ORDER BY id DESC LIMIT 1"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Select<'a> {
    schema: &'a ModelSchema,
    where_clause: Option<String>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    suffix: Option<String>,
}

impl<'a> Select<'a> {
    /// Select every column of `schema`.
    pub fn new(schema: &'a ModelSchema) -> Self {
        Self {
            schema,
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            suffix: None,
        }
    }

    /// Restrict to rows matching `filter`. Fields are checked against the schema.
    pub fn filter(mut self, filter: &Filter) -> Result<Self> {
        self.where_clause = filter.to_sql(self.schema)?;
        Ok(self)
    }

    /// Restrict to the row with engine row id `id`.
    pub fn rowid(mut self, id: i64) -> Self {
        self.where_clause = Some(format!("{} = {}", ROWID, id));
        self
    }

    /// Add an ordering column. The column must be a field or `ROWID`.
    pub fn order_by(mut self, order: OrderBy) -> Result<Self> {
        if order.column() != ROWID {
            self.schema.field(order.column())?;
        }
        self.order_by.push(order);
        Ok(self)
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Raw SQL appended after the table name, replacing any other clause.
    pub fn suffix(mut self, sql: impl Into<String>) -> Self {
        self.suffix = Some(sql.into());
        self
    }

    /// Build the SELECT SQL.
    pub fn build(&self) -> String {
        let mut sql = format!("SELECT * FROM {}", self.schema.name());

        if let Some(suffix) = self.suffix.as_deref().map(str::trim) {
            if !suffix.is_empty() {
                sql.push(' ');
                sql.push_str(suffix);
            }
            return sql;
        }

        if let Some(w) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(w);
        }

        if !self.order_by.is_empty() {
            let parts: Vec<_> = self.order_by.iter().map(OrderBy::to_sql).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }

        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        sql
    }
}

/// `SELECT COUNT(*)` builder.
#[derive(Debug, Clone)]
pub struct Count<'a> {
    schema: &'a ModelSchema,
    where_clause: Option<String>,
}

impl<'a> Count<'a> {
    pub fn new(schema: &'a ModelSchema) -> Self {
        Self {
            schema,
            where_clause: None,
        }
    }

    pub fn filter(mut self, filter: &Filter) -> Result<Self> {
        self.where_clause = filter.to_sql(self.schema)?;
        Ok(self)
    }

    pub fn build(&self) -> String {
        match &self.where_clause {
            Some(w) => format!("SELECT COUNT(*) FROM {} WHERE {}", self.schema.name(), w),
            None => format!("SELECT COUNT(*) FROM {}", self.schema.name()),
        }
    }
}
