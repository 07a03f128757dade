//! `Connection` over a single SQLite handle.
//!
//! Every statement is prepared, stepped and finalized while the handle's
//! mutex is held, so one `SqliteConnection` can be shared across threads.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::borrow_as_ptr)]

use crate::ffi;
use crate::types;
use rowmodel_core::{
    ColumnInfo, Connection, ConnectionError, Error, QueryError, QueryErrorKind, Row,
    TransactionError, TransactionErrorKind,
};
use std::ffi::{CStr, CString, c_int};
use std::ops::ControlFlow;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Where and how to open a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// File path, or `:memory:`.
    pub path: String,
    pub flags: OpenFlags,
    /// How long a statement waits on a locked database. Zero disables waiting.
    pub busy_timeout_ms: u32,
}

/// Access mode for the database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    /// Refuse every write.
    pub read_only: bool,
    /// Create the file when it is missing. Ignored when `read_only` is set.
    pub create: bool,
}

impl OpenFlags {
    /// Read-only access to an existing database.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            create: false,
        }
    }

    /// Read-write access to an existing database.
    pub fn read_write() -> Self {
        Self {
            read_only: false,
            create: false,
        }
    }

    /// Read-write access, creating the database if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_only: false,
            create: true,
        }
    }

    fn bits(self) -> c_int {
        if self.read_only {
            return ffi::SQLITE_OPEN_READONLY;
        }
        if self.create {
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE
        } else {
            ffi::SQLITE_OPEN_READWRITE
        }
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::create_read_write()
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::default(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// A database stored at `path`.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// A private in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// Raw handle, only touched while the connection mutex is held.
struct SqliteInner {
    db: *mut ffi::sqlite3,
}

// SAFETY: the handle is only used behind the connection's Mutex.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
///
/// This is a thread-safe wrapper around a SQLite database handle. Each
/// statement holds the internal lock from prepare to finalize.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

// SqliteConnection is Send + Sync because all access goes through the Mutex
unsafe impl Send for SqliteConnection {}
unsafe impl Sync for SqliteConnection {}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open a connection as described by `config`.
    #[tracing::instrument(level = "debug", skip(config), fields(path = %config.path))]
    pub fn open(config: &SqliteConfig) -> Result<Self, Error> {
        let open_failed = |reason: String| {
            Error::Connection(ConnectionError {
                message: format!("cannot open database '{}': {reason}", config.path),
                source: None,
            })
        };
        let c_path = CString::new(config.path.as_str())
            .map_err(|_| open_failed("path contains a null byte".to_string()))?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: both pointers are valid for the call
        let rc = unsafe {
            ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, config.flags.bits(), ptr::null())
        };
        if rc != ffi::SQLITE_OK {
            if db.is_null() {
                return Err(open_failed(ffi::error_string(rc).to_string()));
            }
            // SAFETY: sqlite hands back a handle even on failure; it must be closed
            let reason = unsafe {
                let reason = errmsg(db);
                ffi::sqlite3_close(db);
                reason
            };
            return Err(open_failed(reason));
        }

        if config.busy_timeout_ms > 0 {
            let ms = config.busy_timeout_ms.min(i32::MAX as u32) as c_int;
            // SAFETY: db is open
            unsafe {
                ffi::sqlite3_busy_timeout(db, ms);
            }
        }
        tracing::debug!(read_only = config.flags.read_only, "Opened SQLite database");

        Ok(Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, Error> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self, Error> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        // The handle stays consistent even if a row callback panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute one or more `;`-separated statements, discarding rows.
    pub fn execute_raw(&self, sql: &str) -> Result<(), Error> {
        let inner = self.lock();
        exec(inner.db, sql)
    }

    /// Get the number of rows changed by the last statement.
    pub fn changes(&self) -> u64 {
        let inner = self.lock();
        // SAFETY: db is valid
        let n = unsafe { ffi::sqlite3_changes(inner.db) };
        n.max(0) as u64
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !inner.db.is_null() {
            // SAFETY: db is valid and every statement is finalized inside `run`
            unsafe {
                ffi::sqlite3_close(inner.db);
            }
            inner.db = ptr::null_mut();
        }
    }
}

impl Connection for SqliteConnection {
    fn run(&self, sql: &str, on_row: &mut dyn FnMut(&Row) -> ControlFlow<()>) -> Result<u64, Error> {
        tracing::debug!(sql = %sql, "Executing statement");

        let inner = self.lock();
        let stmt = prepare_stmt(inner.db, sql)?;
        let statement = Statement(stmt);

        // SAFETY: stmt is valid
        let read_only = unsafe { ffi::sqlite3_stmt_readonly(stmt) } != 0;
        let col_count = unsafe { ffi::sqlite3_column_count(stmt) };

        let mut col_names = Vec::with_capacity(col_count as usize);
        for i in 0..col_count {
            // SAFETY: stmt is valid, i is in range
            let name = unsafe { types::column_name(stmt, i) }.unwrap_or_else(|| format!("col{}", i));
            col_names.push(name);
        }
        let columns = Arc::new(ColumnInfo::new(col_names));

        loop {
            // SAFETY: stmt is valid
            let rc = unsafe { ffi::sqlite3_step(stmt) };
            match rc {
                ffi::SQLITE_ROW => {
                    let mut values = Vec::with_capacity(col_count as usize);
                    for (i, name) in (0..col_count).zip(columns.names()) {
                        // SAFETY: stmt is valid, we just got SQLITE_ROW
                        let value = unsafe { types::read_column(stmt, i, name) }.map_err(|e| {
                            Error::Query(QueryError {
                                kind: QueryErrorKind::Database,
                                sql: Some(sql.to_string()),
                                message: format!("unsupported column type: {}", e),
                            })
                        })?;
                        values.push(value);
                    }
                    let row = Row::with_columns(Arc::clone(&columns), values);
                    if on_row(&row).is_break() {
                        break;
                    }
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(step_error(inner.db, sql)),
            }
        }
        drop(statement);

        if read_only {
            Ok(0)
        } else {
            // SAFETY: db is valid
            let n = unsafe { ffi::sqlite3_changes(inner.db) };
            Ok(n.max(0) as u64)
        }
    }

    fn last_insert_id(&self) -> i64 {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(inner.db) }
    }

    fn begin(&self) -> Result<(), Error> {
        let inner = self.lock();
        if !autocommit(inner.db) {
            return Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::AlreadyActive,
                message: "Already in a transaction".to_string(),
            }));
        }
        exec(inner.db, "BEGIN IMMEDIATE")
    }

    fn commit(&self) -> Result<(), Error> {
        let inner = self.lock();
        if autocommit(inner.db) {
            return Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NotActive,
                message: "Not in a transaction".to_string(),
            }));
        }
        exec(inner.db, "COMMIT")
    }

    fn rollback(&self) -> Result<(), Error> {
        let inner = self.lock();
        if autocommit(inner.db) {
            return Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NotActive,
                message: "Not in a transaction".to_string(),
            }));
        }
        exec(inner.db, "ROLLBACK")
    }

    fn in_transaction(&self) -> bool {
        let inner = self.lock();
        !autocommit(inner.db)
    }
}

/// Finalizes the wrapped statement on drop, including early returns.
struct Statement(*mut ffi::sqlite3_stmt);

impl Drop for Statement {
    fn drop(&mut self) {
        // SAFETY: the statement was prepared successfully and is finalized once
        unsafe {
            ffi::sqlite3_finalize(self.0);
        }
    }
}

// Helper functions

fn autocommit(db: *mut ffi::sqlite3) -> bool {
    // SAFETY: db is valid
    unsafe { ffi::sqlite3_get_autocommit(db) != 0 }
}

/// # Safety
/// `db` must be a valid handle with a pending error.
unsafe fn errmsg(db: *mut ffi::sqlite3) -> String {
    // SAFETY: errmsg returns a NUL-terminated string owned by the handle
    unsafe {
        let ptr = ffi::sqlite3_errmsg(db);
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

fn null_byte_error(sql: &str) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::Syntax,
        sql: Some(sql.to_string()),
        message: "SQL contains null byte".to_string(),
    })
}

fn exec(db: *mut ffi::sqlite3, sql: &str) -> Result<(), Error> {
    tracing::debug!(sql = %sql, "Executing script");
    let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;
    let mut err: *mut std::ffi::c_char = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut err) };

    if rc != ffi::SQLITE_OK {
        let msg = if !err.is_null() {
            // SAFETY: err was allocated by sqlite3_exec and is freed once
            unsafe {
                let msg = CStr::from_ptr(err).to_string_lossy().into_owned();
                ffi::sqlite3_free(err.cast());
                msg
            }
        } else {
            ffi::error_string(rc).to_string()
        };

        return Err(Error::Query(QueryError {
            kind: error_code_to_kind(rc),
            sql: Some(sql.to_string()),
            message: msg,
        }));
    }

    Ok(())
}

fn prepare_stmt(db: *mut ffi::sqlite3, sql: &str) -> Result<*mut ffi::sqlite3_stmt, Error> {
    let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;
    let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe {
        ffi::sqlite3_prepare_v2(
            db,
            c_sql.as_ptr(),
            c_sql.as_bytes().len() as c_int,
            &mut stmt,
            ptr::null_mut(),
        )
    };

    if rc != ffi::SQLITE_OK {
        return Err(step_error(db, sql));
    }
    if stmt.is_null() {
        // Blank input or a lone comment compiles to nothing.
        return Err(Error::Query(QueryError {
            kind: QueryErrorKind::Syntax,
            sql: Some(sql.to_string()),
            message: "empty statement".to_string(),
        }));
    }

    Ok(stmt)
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let msg = unsafe { errmsg(db) };
    let code = unsafe { ffi::sqlite3_errcode(db) };

    Error::Query(QueryError {
        kind: error_code_to_kind(code),
        sql: Some(sql.to_string()),
        message: msg,
    })
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH => QueryErrorKind::Permission,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_INTERRUPT | ffi::SQLITE_ABORT => QueryErrorKind::Cancelled,
        ffi::SQLITE_ERROR => QueryErrorKind::Syntax,
        _ => QueryErrorKind::Database,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmodel_core::Value;

    fn memory() -> SqliteConnection {
        SqliteConnection::open_memory().unwrap()
    }

    #[test]
    fn test_open_memory() {
        let conn = memory();
        assert_eq!(conn.path(), ":memory:");
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_storage_class_inference() {
        let conn = memory();
        let row = conn
            .query_one("SELECT 1, 2.5, 'x', NULL")
            .unwrap()
            .unwrap();
        assert_eq!(
            row.values(),
            &[Value::Int(1), Value::Double(2.5), Value::from("x"), Value::Null]
        );
    }

    #[test]
    fn test_blob_is_unsupported() {
        let conn = memory();
        let err = conn.query("SELECT x'00ff'").unwrap_err();
        assert_eq!(err.sql(), Some("SELECT x'00ff'"));
        assert!(err.to_string().contains("BLOB"));
    }

    #[test]
    fn test_changes_and_last_insert_id() {
        let conn = memory();
        conn.execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)")
            .unwrap();
        assert_eq!(conn.execute("INSERT INTO t (v) VALUES ('a')").unwrap(), 1);
        assert_eq!(conn.execute("INSERT INTO t (v) VALUES ('b')").unwrap(), 1);
        assert_eq!(conn.last_insert_id(), 2);
        assert_eq!(conn.execute("UPDATE t SET v = 'c'").unwrap(), 2);
        // reads never report the previous write's change count
        assert_eq!(conn.execute("SELECT * FROM t").unwrap(), 0);
    }

    #[test]
    fn test_break_stops_early() {
        let conn = memory();
        conn.execute_raw(
            "CREATE TABLE n (v INTEGER); INSERT INTO n VALUES (1); INSERT INTO n VALUES (2); \
             INSERT INTO n VALUES (3);",
        )
        .unwrap();
        let mut seen = Vec::new();
        conn.run("SELECT v FROM n ORDER BY v", &mut |row| {
            seen.push(row.get(0).cloned().unwrap());
            ControlFlow::Break(())
        })
        .unwrap();
        assert_eq!(seen, vec![Value::Int(1)]);
    }

    #[test]
    fn test_shared_column_info() {
        let conn = memory();
        let rows = conn.query("SELECT 1 AS a UNION ALL SELECT 2").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(Arc::ptr_eq(&rows[0].column_info(), &rows[1].column_info()));
        assert_eq!(rows[1].get_by_name("a"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_syntax_error_carries_sql() {
        let conn = memory();
        let err = conn.execute("SELEC 1").unwrap_err();
        match err {
            Error::Query(q) => {
                assert_eq!(q.kind, QueryErrorKind::Syntax);
                assert_eq!(q.sql.as_deref(), Some("SELEC 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_constraint_error_kind() {
        let conn = memory();
        conn.execute_raw("CREATE TABLE u (id INTEGER PRIMARY KEY, v TEXT NOT NULL)")
            .unwrap();
        let err = conn.execute("INSERT INTO u (id) VALUES (1)").unwrap_err();
        assert!(matches!(
            err,
            Error::Query(QueryError {
                kind: QueryErrorKind::Constraint,
                ..
            })
        ));
    }

    #[test]
    fn test_transaction_state() {
        let conn = memory();
        conn.execute_raw("CREATE TABLE t (v INTEGER)").unwrap();

        conn.begin().unwrap();
        assert!(conn.in_transaction());
        assert!(matches!(
            conn.begin(),
            Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::AlreadyActive,
                ..
            }))
        ));
        conn.execute("INSERT INTO t VALUES (1)").unwrap();
        conn.rollback().unwrap();
        assert!(!conn.in_transaction());
        assert!(conn.commit().is_err());

        let count = conn.query_one("SELECT COUNT(*) FROM t").unwrap().unwrap();
        assert_eq!(count.get(0), Some(&Value::Int(0)));
    }

    #[test]
    fn test_config_builders() {
        let config = SqliteConfig::file("app.db")
            .busy_timeout(250)
            .flags(OpenFlags::read_write());
        assert_eq!(config.path, "app.db");
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.flags, OpenFlags::read_write());
        assert_eq!(SqliteConfig::memory().flags, OpenFlags::create_read_write());
    }

    #[test]
    fn test_open_flag_bits() {
        assert_eq!(OpenFlags::read_only().bits(), ffi::SQLITE_OPEN_READONLY);
        assert_eq!(OpenFlags::read_write().bits(), ffi::SQLITE_OPEN_READWRITE);
        assert_eq!(
            OpenFlags::create_read_write().bits(),
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE
        );
        // Read-only wins over create.
        let flags = OpenFlags {
            read_only: true,
            create: true,
        };
        assert_eq!(flags.bits(), ffi::SQLITE_OPEN_READONLY);
    }

    #[test]
    fn test_open_missing_file_without_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db").to_string_lossy().into_owned();

        let config = SqliteConfig::file(path.clone()).flags(OpenFlags::read_write());
        let err = SqliteConnection::open(&config).unwrap_err();
        assert!(err.to_string().contains("absent.db"), "{err}");

        let created = SqliteConnection::open(&SqliteConfig::file(path)).unwrap();
        created.execute_raw("CREATE TABLE t (v INTEGER)").unwrap();
    }

    #[test]
    fn test_open_missing_file_read_only_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let config =
            SqliteConfig::file(path.to_string_lossy().into_owned()).flags(OpenFlags::read_only());
        let err = SqliteConnection::open(&config).unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
