//! Bulk writes with per-item error reporting.

use crate::database::Database;
use crate::transaction::Completion;
use parking_lot::Mutex;
use rowmodel_core::{Connection, Error, Result};
use std::sync::Arc;

/// Outcome of a bulk write.
///
/// Every item is attempted inside one outer transaction; an item that fails
/// is recorded here by its position instead of aborting the batch.
///
/// When the batch itself was deferred into an enclosing transaction the items
/// have not run yet, so no failures can be reported.
#[derive(Debug)]
pub struct BatchReport {
    completion: Completion,
    total: usize,
    failures: Vec<(usize, Error)>,
}

impl BatchReport {
    pub fn completion(&self) -> Completion {
        self.completion
    }

    /// Number of items submitted.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Items that failed, as (position, error), in submission order.
    pub fn failures(&self) -> &[(usize, Error)] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<(usize, Error)> {
        self.failures
    }

    /// Number of items that did not fail.
    pub fn succeeded(&self) -> usize {
        self.total - self.failures.len()
    }

    /// Committed with no failed item.
    pub fn is_clean(&self) -> bool {
        self.completion.is_committed() && self.failures.is_empty()
    }
}

/// Apply `op` to each item as its own transaction request nested inside one
/// outer transaction.
pub(crate) fn run_batch<C, T>(
    db: &Database<C>,
    items: Vec<T>,
    op: fn(&Database<C>, &T) -> Result<()>,
) -> Result<BatchReport>
where
    C: Connection + 'static,
    T: Send + 'static,
{
    let total = items.len();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);

    let completion = db.transaction(move |db| {
        for (index, item) in items.into_iter().enumerate() {
            let sink = Arc::clone(&sink);
            db.transaction(move |db| {
                if let Err(e) = op(db, &item) {
                    tracing::warn!(index = index, error = %e, "Batch item failed");
                    sink.lock().push((index, e));
                }
                Ok(())
            })?;
        }
        Ok(())
    })?;

    let mut failures = std::mem::take(&mut *failures.lock());
    failures.sort_by_key(|(index, _)| *index);
    tracing::debug!(total = total, failed = failures.len(), "Batch finished");

    Ok(BatchReport {
        completion,
        total,
        failures,
    })
}
