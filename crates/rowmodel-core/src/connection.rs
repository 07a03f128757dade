//! Engine connection trait.
//!
//! [`Connection`] is the only seam between rowmodel and a storage engine. It
//! executes literal SQL text, streams result rows to a callback and exposes
//! explicit transaction control. Nesting and coalescing of transactions is
//! handled one level up by the database gateway.

use crate::error::Result;
use crate::row::Row;
use std::ops::ControlFlow;

/// A synchronous connection to an embedded engine.
///
/// Implementations must be `Send + Sync`; callers share one connection behind
/// an `Arc` and the implementation serializes access per statement.
///
/// # Example
///
/// ```rust,ignore
/// let mut names = Vec::new();
/// conn.run("SELECT name FROM users", &mut |row| {
///     names.push(row.get(0).cloned());
///     ControlFlow::Continue(())
/// })?;
/// ```
pub trait Connection: Send + Sync {
    /// Execute one statement.
    ///
    /// Each result row is handed to `on_row`; returning `Break` stops
    /// iteration early without error. Returns the number of rows changed by
    /// a write statement, 0 for reads.
    ///
    /// The callback must not issue statements on the same connection.
    fn run(&self, sql: &str, on_row: &mut dyn FnMut(&Row) -> ControlFlow<()>) -> Result<u64>;

    /// Execute a statement, discarding any rows.
    fn execute(&self, sql: &str) -> Result<u64> {
        self.run(sql, &mut |_| ControlFlow::Continue(()))
    }

    /// Execute a statement and collect every row.
    fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        self.run(sql, &mut |row| {
            rows.push(row.clone());
            ControlFlow::Continue(())
        })?;
        Ok(rows)
    }

    /// Execute a statement and return its first row, if any.
    fn query_one(&self, sql: &str) -> Result<Option<Row>> {
        let mut first = None;
        self.run(sql, &mut |row| {
            first = Some(row.clone());
            ControlFlow::Break(())
        })?;
        Ok(first)
    }

    /// Row id generated by the most recent successful insert.
    fn last_insert_id(&self) -> i64;

    /// Open an engine transaction.
    fn begin(&self) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the open transaction.
    fn rollback(&self) -> Result<()>;

    /// Whether an engine transaction is currently open.
    fn in_transaction(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::sync::Mutex;

    /// Replays a fixed result set for every statement.
    struct Canned {
        rows: Vec<Row>,
        seen: Mutex<Vec<String>>,
    }

    impl Connection for Canned {
        fn run(&self, sql: &str, on_row: &mut dyn FnMut(&Row) -> ControlFlow<()>) -> Result<u64> {
            self.seen.lock().unwrap().push(sql.to_string());
            for row in &self.rows {
                if on_row(row).is_break() {
                    break;
                }
            }
            Ok(0)
        }

        fn last_insert_id(&self) -> i64 {
            0
        }

        fn begin(&self) -> Result<()> {
            Ok(())
        }

        fn commit(&self) -> Result<()> {
            Ok(())
        }

        fn rollback(&self) -> Result<()> {
            Ok(())
        }

        fn in_transaction(&self) -> bool {
            false
        }
    }

    fn canned() -> Canned {
        Canned {
            rows: (1..=3)
                .map(|i| Row::new(vec!["n".into()], vec![Value::Int(i)]))
                .collect(),
            seen: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn query_collects_all_rows() {
        let conn = canned();
        let rows = conn.query("SELECT n FROM t").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(conn.seen.lock().unwrap().as_slice(), ["SELECT n FROM t"]);
    }

    #[test]
    fn query_one_stops_after_first() {
        let conn = canned();
        let row = conn.query_one("SELECT n FROM t").unwrap().unwrap();
        assert_eq!(row.get(0), Some(&Value::Int(1)));
    }

    #[test]
    fn break_stops_iteration() {
        let conn = canned();
        let mut seen = 0;
        conn.run("SELECT n FROM t", &mut |_| {
            seen += 1;
            if seen == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
        assert_eq!(seen, 2);
    }
}
