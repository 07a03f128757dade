//! Decoding SQLite cells into rowmodel values.
//!
//! SQLite has a simple type system with 5 storage classes:
//! - INTEGER: Signed integer (1, 2, 3, 4, 6, or 8 bytes)
//! - REAL: 8-byte IEEE floating point
//! - TEXT: UTF-8 or UTF-16 string
//! - BLOB: Binary data
//! - NULL: The NULL value
//!
//! The first four map onto `Value`; BLOB has no counterpart and is reported as
//! a type error.

use crate::ffi;
use rowmodel_core::{Error, TypeError, Value};
use std::ffi::{CStr, c_int};

/// Name of a storage class, for error messages.
pub fn storage_class_name(code: c_int) -> &'static str {
    match code {
        ffi::SQLITE_INTEGER => "INTEGER",
        ffi::SQLITE_FLOAT => "REAL",
        ffi::SQLITE_TEXT => "TEXT",
        ffi::SQLITE_BLOB => "BLOB",
        ffi::SQLITE_NULL => "NULL",
        _ => "UNKNOWN",
    }
}

/// Read a column value from a result row.
///
/// # Safety
/// - `stmt` must be a valid prepared statement that has just returned SQLITE_ROW
/// - `index` must be a valid 0-based column index
pub unsafe fn read_column(
    stmt: *mut ffi::sqlite3_stmt,
    index: c_int,
    column: &str,
) -> Result<Value, Error> {
    // SAFETY: guaranteed by the caller
    let col_type = unsafe { ffi::sqlite3_column_type(stmt, index) };

    match col_type {
        ffi::SQLITE_NULL => Ok(Value::Null),

        // SAFETY: guaranteed by the caller
        ffi::SQLITE_INTEGER => Ok(Value::Int(unsafe { ffi::sqlite3_column_int64(stmt, index) })),

        // SAFETY: guaranteed by the caller
        ffi::SQLITE_FLOAT => Ok(Value::Double(unsafe {
            ffi::sqlite3_column_double(stmt, index)
        })),

        ffi::SQLITE_TEXT => {
            // SAFETY: text pointer stays valid until the next step/finalize;
            // it is copied out immediately.
            unsafe {
                let ptr = ffi::sqlite3_column_text(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() {
                    Ok(Value::Null)
                } else {
                    let slice = std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize);
                    Ok(Value::Text(String::from_utf8_lossy(slice).into_owned()))
                }
            }
        }

        other => Err(Error::Type(TypeError {
            model: None,
            column: Some(column.to_string()),
            expected: "INTEGER, REAL, TEXT or NULL".to_string(),
            actual: storage_class_name(other).to_string(),
        })),
    }
}

/// Get the column name from a result.
///
/// # Safety
/// - `stmt` must be a valid prepared statement
/// - `index` must be a valid 0-based column index
pub unsafe fn column_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    // SAFETY: guaranteed by the caller
    let ptr = unsafe { ffi::sqlite3_column_name(stmt, index) };
    if ptr.is_null() {
        None
    } else {
        // SAFETY: non-null names are NUL-terminated and owned by the statement
        unsafe { CStr::from_ptr(ptr) }.to_str().ok().map(String::from)
    }
}
