//! SQL clause pieces: literals, WHERE predicates and ORDER BY.

use rowmodel_core::{Error, Model, ModelSchema, Result, SchemaErrorKind, Value, quote_literal};

/// Render a value as an inline SQL literal.
///
/// Booleans render as `1`/`0` and non-finite reals as `NULL`.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Int(n) => n.to_string(),
        // Debug keeps a decimal point or exponent so the engine reads a REAL.
        Value::Double(d) if d.is_finite() => format!("{:?}", d),
        Value::Double(_) => "NULL".to_string(),
        Value::Text(s) => quote_literal(s),
    }
}

/// One predicate term.
///
/// Text matches as a substring (`LIKE '%v%'`); every other value is an
/// equality test and NULL is `IS NULL`.
pub fn term(column: &str, value: &Value) -> String {
    match value {
        Value::Null => format!("({} IS NULL)", column),
        Value::Text(s) => format!("({} LIKE {})", column, quote_literal(&format!("%{}%", s))),
        other => format!("({} = {})", column, literal(other)),
    }
}

/// An ordered list of (field, value) conditions joined with `AND`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    terms: Vec<(String, Value)>,
}

impl Filter {
    /// An empty filter, matching every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition on `field`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.terms.iter().map(|(f, v)| (f.as_str(), v))
    }

    /// Render the predicate, checking each field against `schema`.
    ///
    /// Returns `None` for an empty filter.
    pub fn to_sql(&self, schema: &ModelSchema) -> Result<Option<String>> {
        if self.terms.is_empty() {
            return Ok(None);
        }
        let mut parts = Vec::with_capacity(self.terms.len());
        for (field, value) in &self.terms {
            schema.field(field)?;
            parts.push(term(field, value));
        }
        Ok(Some(parts.join(" AND ")))
    }
}

impl<F: Into<String>, V: Into<Value>> FromIterator<(F, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (F, V)>>(iter: I) -> Self {
        Self {
            terms: iter
                .into_iter()
                .map(|(f, v)| (f.into(), v.into()))
                .collect(),
        }
    }
}

/// Predicate identifying `model` by its primary key values.
pub fn key_predicate(model: &Model) -> Result<String> {
    let schema = model.schema();
    if schema.primary_keys().is_empty() {
        return Err(Error::schema(
            SchemaErrorKind::InvalidKey,
            format!("'{}' has no primary key", schema.name()),
        ));
    }
    let mut sql = String::new();
    for (i, key) in schema.primary_keys().iter().enumerate() {
        if i > 0 {
            sql.push_str(" AND ");
        }
        sql.push_str(&term(key, model.get(key)?));
    }
    Ok(sql)
}

/// ORDER BY clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    column: String,
    direction: OrderDirection,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    pub fn new(column: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Create an ascending order by clause.
    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, OrderDirection::Asc)
    }

    /// Create a descending order by clause.
    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, OrderDirection::Desc)
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Generate SQL for this ORDER BY clause.
    pub fn to_sql(&self) -> String {
        let dir = match self.direction {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        };
        format!("{} {}", self.column, dir)
    }
}
