//! Field (column) descriptors and the kind/value compatibility table.

use crate::error::TypeError;
use crate::identifiers::quote_literal;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Declared kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Auto-increment integer primary key
    Serial,
    Bool,
    Int,
    /// Floating point, stored as REAL
    Decimal,
    Text,
    /// Stored as integer or text, e.g. `datetime('now')`
    Timestamp,
}

impl FieldKind {
    /// Column type used in generated DDL.
    #[must_use]
    pub const fn sql_name(&self) -> &'static str {
        match self {
            FieldKind::Serial => "INTEGER PRIMARY KEY AUTOINCREMENT",
            FieldKind::Bool => "BOOLEAN",
            FieldKind::Int => "INTEGER",
            FieldKind::Decimal => "REAL",
            FieldKind::Text => "TEXT",
            FieldKind::Timestamp => "TIMESTAMP",
        }
    }

    /// Whether a non-null runtime value may be written to a field of this kind.
    ///
    /// | value  | accepted by                      |
    /// |--------|----------------------------------|
    /// | bool   | Bool, Int                        |
    /// | int    | Int, Serial, Timestamp, Bool     |
    /// | real   | Decimal                          |
    /// | text   | Text, Timestamp                  |
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(_) => matches!(self, FieldKind::Bool | FieldKind::Int),
            Value::Int(_) => matches!(
                self,
                FieldKind::Int | FieldKind::Serial | FieldKind::Timestamp | FieldKind::Bool
            ),
            Value::Double(v) => matches!(self, FieldKind::Decimal) && v.is_finite(),
            Value::Text(_) => matches!(self, FieldKind::Text | FieldKind::Timestamp),
        }
    }

    fn label(self) -> &'static str {
        match self {
            FieldKind::Serial => "SERIAL",
            FieldKind::Bool => "BOOLEAN",
            FieldKind::Int => "INTEGER",
            FieldKind::Decimal => "DECIMAL",
            FieldKind::Text => "TEXT",
            FieldKind::Timestamp => "TIMESTAMP",
        }
    }
}

/// A named, typed column descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    kind: FieldKind,
    nullable: bool,
    default: Option<String>,
}

impl Field {
    /// Create a field. Fields are nullable unless marked otherwise.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            default: None,
        }
    }

    /// Non-nullable serial primary key field.
    pub fn serial(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Serial).not_null()
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Int)
    }

    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Decimal)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Timestamp)
    }

    /// Mark the field NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the nullability explicitly.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Raw SQL default expression, emitted verbatim after `DEFAULT`.
    ///
    /// Only non-nullable fields may carry a default; this is checked when the
    /// owning schema is built.
    pub fn default_sql(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Quoted text default.
    pub fn default_text(self, text: &str) -> Self {
        self.default_sql(quote_literal(text))
    }

    /// Local current-time default.
    pub fn default_now(self) -> Self {
        self.default_sql("(datetime('now', 'localtime'))")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// True when writing `value` should leave the column to its declared default.
    pub fn defers_to_default(&self, value: &Value) -> bool {
        value.is_null() && !self.nullable && self.default.is_some()
    }

    /// Validate a value about to be written to this field of `model`.
    ///
    /// NULL is accepted for nullable fields, for serial fields (the engine
    /// assigns them) and for fields with a default (the engine applies it).
    pub fn check_write(&self, model: &str, value: &Value) -> Result<(), TypeError> {
        let ok = match value {
            Value::Null => self.nullable || self.kind == FieldKind::Serial || self.default.is_some(),
            other => self.kind.accepts(other),
        };

        if ok {
            Ok(())
        } else {
            let expected = if value.is_null() {
                format!("non-null {}", self.kind.label())
            } else {
                self.kind.label().to_string()
            };
            Err(TypeError {
                model: Some(model.to_string()),
                column: Some(self.name.clone()),
                expected,
                actual: value.type_name().to_string(),
            })
        }
    }
}
