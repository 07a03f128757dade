//! SQL text generation for rowmodel.
//!
//! `rowmodel-query` is the **statement construction layer**. It turns
//! `ModelSchema` metadata, `Model` instances and `Filter`s into literal SQL
//! text for the engine.
//!
//! # Role In The Architecture
//!
//! - **Clauses**: value literals, key and filter predicates, ORDER BY.
//! - **Builders**: INSERT, UPDATE and DELETE with per-field value checks.
//! - **Selects**: single-model SELECT/COUNT and the composite inner join.
//!
//! Nothing here talks to the engine; the `rowmodel` facade executes the
//! resulting text through a `Connection`.

pub mod builder;
pub mod clause;
pub mod join;
pub mod select;

pub use builder::{DeleteBuilder, InsertBuilder, UpdateBuilder};
pub use clause::{Filter, OrderBy, OrderDirection, key_predicate, literal, term};
pub use join::{CompositeSelect, JoinPredicate};
pub use select::{Count, ROWID, Select};
