//! Model schemas and model instances.
//!
//! A [`ModelSchema`] describes one table: its ordered fields, its primary key
//! set and its foreign key references. Schemas are validated once, when
//! built, and shared through `Arc` afterwards. A [`Model`] is one row's worth
//! of values laid out parallel to the schema's fields.

use crate::error::{Error, Result, SchemaErrorKind};
use crate::field::{Field, FieldKind};
use crate::identifiers::check_identifier;
use crate::value::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A reference from a local field to the single primary key of another model.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    field: String,
    target: Arc<ModelSchema>,
}

impl ForeignKey {
    /// Local field holding the reference.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Referenced model.
    pub fn target(&self) -> &Arc<ModelSchema> {
        &self.target
    }

    /// Referenced column: the target's sole primary key.
    pub fn target_key(&self) -> &str {
        // Enforced when the owning schema is built.
        &self.target.primary_keys[0]
    }
}

/// Validated description of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    name: String,
    fields: Vec<Field>,
    primary_keys: Vec<String>,
    foreign_keys: Vec<ForeignKey>,
}

impl ModelSchema {
    /// Start describing a model named `name`.
    pub fn builder(name: impl Into<String>) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            primary_keys: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Primary key field names, in declaration order.
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Position of a field, by exact (case-sensitive) name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    /// Look up a field, failing with "field not found".
    pub fn field(&self, name: &str) -> Result<&Field> {
        self.field_index(name)
            .map(|i| &self.fields[i])
            .ok_or_else(|| Error::field_not_found(&self.name, name))
    }

    /// The serial field, if the model has one.
    pub fn serial_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.kind() == FieldKind::Serial)
    }

    /// Derive a schema with the same name and keys and additional fields.
    ///
    /// The result is validated like any freshly built schema.
    pub fn extend(&self, fields: impl IntoIterator<Item = Field>) -> Result<Arc<ModelSchema>> {
        let mut builder = ModelSchema::builder(self.name.clone());
        builder.fields = self.fields.clone();
        builder.fields.extend(fields);
        builder.primary_keys = self.primary_keys.clone();
        builder.foreign_keys = self
            .foreign_keys
            .iter()
            .map(|fk| (fk.field.clone(), Arc::clone(&fk.target)))
            .collect();
        builder.build()
    }
}

/// Collects field and key declarations; [`build`](Self::build) validates them.
#[derive(Debug)]
#[must_use]
pub struct ModelSchemaBuilder {
    name: String,
    fields: Vec<Field>,
    primary_keys: Vec<String>,
    foreign_keys: Vec<(String, Arc<ModelSchema>)>,
}

impl ModelSchemaBuilder {
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Declare the primary key set. Order is significant for key lookups.
    pub fn primary_key<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = names.into_iter().map(Into::into).collect();
        self
    }

    /// Declare that `field` references the primary key of `target`.
    pub fn foreign_key(mut self, field: impl Into<String>, target: &Arc<ModelSchema>) -> Self {
        self.foreign_keys.push((field.into(), Arc::clone(target)));
        self
    }

    /// Validate the declarations and produce a shareable schema.
    pub fn build(self) -> Result<Arc<ModelSchema>> {
        let name = self.name;
        check_identifier("model", &name)?;

        let mut seen = HashSet::new();
        for field in &self.fields {
            check_identifier("field", field.name())?;
            if !seen.insert(field.name()) {
                return Err(Error::schema(
                    SchemaErrorKind::DuplicateField,
                    format!("duplicate field '{}' in '{}'", field.name(), name),
                ));
            }
            if field.is_nullable() && field.default().is_some() {
                return Err(Error::schema(
                    SchemaErrorKind::InvalidDefault,
                    format!(
                        "field '{}' in '{}' is nullable and cannot have a default",
                        field.name(),
                        name
                    ),
                ));
            }
        }

        let field = |key: &str| self.fields.iter().find(|f| f.name() == key);

        let mut keys = HashSet::new();
        for key in &self.primary_keys {
            if !keys.insert(key.as_str()) {
                return Err(Error::schema(
                    SchemaErrorKind::DuplicateKey,
                    format!("duplicate primary key '{}' in '{}'", key, name),
                ));
            }
            match field(key) {
                None => {
                    return Err(Error::schema(
                        SchemaErrorKind::UnknownKey,
                        format!("primary key '{}' is not a field of '{}'", key, name),
                    ));
                }
                Some(f) if f.is_nullable() => {
                    return Err(Error::schema(
                        SchemaErrorKind::InvalidKey,
                        format!("primary key '{}' in '{}' must not be nullable", key, name),
                    ));
                }
                Some(_) => {}
            }
        }

        for serial in self.fields.iter().filter(|f| f.kind() == FieldKind::Serial) {
            if self.primary_keys.len() != 1 || self.primary_keys[0] != serial.name() {
                return Err(Error::schema(
                    SchemaErrorKind::InvalidKey,
                    format!(
                        "serial field '{}' in '{}' must be the sole primary key",
                        serial.name(),
                        name
                    ),
                ));
            }
        }

        let mut locals = HashSet::new();
        let mut foreign_keys = Vec::with_capacity(self.foreign_keys.len());
        for (local, target) in self.foreign_keys {
            if !locals.insert(local.clone()) {
                return Err(Error::schema(
                    SchemaErrorKind::InvalidForeignKey,
                    format!("duplicate foreign key '{}' in '{}'", local, name),
                ));
            }
            if field(&local).is_none() {
                return Err(Error::schema(
                    SchemaErrorKind::InvalidForeignKey,
                    format!("foreign key '{}' is not a field of '{}'", local, name),
                ));
            }
            if target.primary_keys.len() != 1 {
                return Err(Error::schema(
                    SchemaErrorKind::InvalidForeignKey,
                    format!(
                        "foreign key '{}' in '{}' targets '{}', which has {} primary keys",
                        local,
                        name,
                        target.name,
                        target.primary_keys.len()
                    ),
                ));
            }
            foreign_keys.push(ForeignKey {
                field: local,
                target,
            });
        }

        Ok(Arc::new(ModelSchema {
            name,
            fields: self.fields,
            primary_keys: self.primary_keys,
            foreign_keys,
        }))
    }
}

/// One row of a model: values parallel to the schema's fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    schema: Arc<ModelSchema>,
    values: Vec<Value>,
}

impl Model {
    /// A fresh instance with every field NULL.
    pub fn new(schema: &Arc<ModelSchema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            values: vec![Value::Null; schema.field_count()],
        }
    }

    /// Build an instance from cells in field order.
    pub fn from_values(schema: &Arc<ModelSchema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.field_count() {
            return Err(Error::Custom(format!(
                "'{}' has {} fields but {} values were supplied",
                schema.name(),
                schema.field_count(),
                values.len()
            )));
        }
        Ok(Self {
            schema: Arc::clone(schema),
            values,
        })
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// Table name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Read a cell by field name.
    pub fn get(&self, field: &str) -> Result<&Value> {
        self.schema
            .field_index(field)
            .map(|i| &self.values[i])
            .ok_or_else(|| Error::field_not_found(self.schema.name(), field))
    }

    /// Assign a cell by field name. `None` stores NULL.
    ///
    /// Values are checked against the field kind when written to the
    /// engine, not here.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let i = self
            .schema
            .field_index(field)
            .ok_or_else(|| Error::field_not_found(self.schema.name(), field))?;
        self.values[i] = value.into();
        Ok(())
    }

    /// Chainable [`set`](Self::set).
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(field, value)?;
        Ok(self)
    }

    /// Cells in field order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// (field, value) pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.schema.fields().iter().zip(self.values.iter())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(f, v)| (f.name().to_string(), v.to_json()))
                .collect(),
        )
    }
}

/// Serializes as a map in field order.
impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.name(), &value.to_json())?;
        }
        map.end()
    }
}

/// Renders as a JSON object in field order.
impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
