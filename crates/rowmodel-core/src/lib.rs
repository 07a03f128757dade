//! Core types and traits for rowmodel.
//!
//! This crate provides the foundational abstractions shared by every other
//! rowmodel crate:
//!
//! - [`Value`] cells and the [`Field`]/[`FieldKind`] descriptors they are checked against
//! - [`ModelSchema`] table descriptions and [`Model`] row instances
//! - [`Row`] results streamed out of the engine
//! - the [`Connection`] trait implemented by engine drivers
//! - the [`Error`] taxonomy

pub mod connection;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod model;
pub mod row;
pub mod value;

pub use connection::Connection;
pub use error::{
    ConnectionError, Error, QueryError, QueryErrorKind, Result, SchemaError, SchemaErrorKind,
    TransactionError, TransactionErrorKind, TypeError,
};
pub use field::{Field, FieldKind};
pub use identifiers::{check_identifier, is_identifier, quote_literal};
pub use model::{ForeignKey, Model, ModelSchema, ModelSchemaBuilder};
pub use row::{ColumnInfo, Row};
pub use value::Value;
