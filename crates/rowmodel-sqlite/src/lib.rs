//! SQLite engine for rowmodel.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! This crate wraps libsqlite3 (bundled through `libsqlite3-sys`) behind the
//! synchronous `Connection` trait from rowmodel-core. Statements are complete
//! SQL text; results are decoded per cell from the storage class SQLite reports.
//!
//! # Example
//!
//! ```
//! use rowmodel_core::{Connection, Value};
//! use rowmodel_sqlite::SqliteConnection;
//!
//! let conn = SqliteConnection::open_memory().unwrap();
//! conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
//! conn.execute("INSERT INTO users (name) VALUES ('Alice')").unwrap();
//!
//! let row = conn.query_one("SELECT name FROM users").unwrap().unwrap();
//! assert_eq!(row.get(0), Some(&Value::from("Alice")));
//! ```
//!
//! # Type Mapping
//!
//! | SQLite storage class | `Value` |
//! |----------------------|---------|
//! | INTEGER | `Int` |
//! | REAL | `Double` |
//! | TEXT | `Text` |
//! | NULL | `Null` |
//! | BLOB | unsupported, reported as an error |

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};

/// Get the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Get the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
