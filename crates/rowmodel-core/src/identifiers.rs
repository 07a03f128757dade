//! SQL identifier checks and literal quoting.
//!
//! Model and field names are spliced into generated SQL unquoted, so they are
//! restricted to plain identifiers when a schema is built. Text values are
//! always emitted as single-quoted literals.

use crate::error::{Error, Result, SchemaErrorKind};
use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Returns true for names usable unquoted as table or column names.
///
/// # Examples
///
/// ```
/// use rowmodel_core::is_identifier;
///
/// assert!(is_identifier("customer_id"));
/// assert!(!is_identifier("user;DROP TABLE"));
/// assert!(!is_identifier("1st"));
/// ```
#[inline]
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Fail with an `InvalidIdentifier` schema error unless `name` is a plain identifier.
pub fn check_identifier(what: &str, name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(Error::schema(
            SchemaErrorKind::InvalidIdentifier,
            format!("invalid {} name '{}'", what, name),
        ))
    }
}

/// Quote text as a SQL string literal.
///
/// Embedded single quotes are escaped by doubling them (`'` → `''`).
///
/// # Examples
///
/// ```
/// use rowmodel_core::quote_literal;
///
/// assert_eq!(quote_literal("bob"), "'bob'");
/// assert_eq!(quote_literal("o'brien"), "'o''brien'");
/// ```
#[inline]
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
