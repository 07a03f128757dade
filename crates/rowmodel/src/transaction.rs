//! Reentrant, coalescing transactions.
//!
//! A database handle runs at most one engine transaction at a time. The first
//! caller becomes the owner: it begins the transaction, runs its action, then
//! drains every action that was requested while it held the transaction, in
//! arrival order, before committing. Requests that arrive while a transaction
//! is in progress on the owning thread are queued instead of nesting a second
//! BEGIN; requests from other threads wait on the recursive lock.
//!
//! Any failure rolls back the whole transaction, including work done by
//! drained actions, and discards the rest of the queue.

use crate::database::Database;
use parking_lot::ReentrantMutex;
use rowmodel_core::{Connection, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// An action deferred into an in-progress transaction.
pub(crate) type DeferredAction<C> = Box<dyn FnOnce(&Database<C>) -> Result<()> + Send>;

/// How a transaction request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The action ran and the engine transaction committed.
    Committed,
    /// A transaction was already in progress; the action was queued and will
    /// run before that transaction commits.
    Deferred,
}

impl Completion {
    pub fn is_committed(self) -> bool {
        self == Completion::Committed
    }

    pub fn is_deferred(self) -> bool {
        self == Completion::Deferred
    }
}

/// Per-handle coordinator state.
pub(crate) struct TransactionState<C: Connection> {
    lock: ReentrantMutex<RefCell<VecDeque<DeferredAction<C>>>>,
    active: AtomicBool,
}

impl<C: Connection + 'static> TransactionState<C> {
    pub(crate) fn new() -> Self {
        Self {
            lock: ReentrantMutex::new(RefCell::new(VecDeque::new())),
            active: AtomicBool::new(false),
        }
    }

    /// Whether a transaction is currently owned by some caller.
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Run `action` in a transaction on `db`, or queue it behind the one in
    /// progress.
    pub(crate) fn run<F>(&self, db: &Database<C>, action: F) -> Result<Completion>
    where
        F: FnOnce(&Database<C>) -> Result<()> + Send + 'static,
    {
        let queue = self.lock.lock();

        if self.active.swap(true, Ordering::Acquire) {
            let mut pending = queue.borrow_mut();
            pending.push_back(Box::new(action));
            tracing::trace!(pending = pending.len(), "Deferred transaction action");
            return Ok(Completion::Deferred);
        }

        let mut scope = OwnedScope {
            conn: db.connection(),
            queue: &*queue,
            active: &self.active,
            begun: false,
        };

        scope.conn.begin()?;
        scope.begun = true;

        action(db)?;

        let mut drained = 0usize;
        loop {
            // The borrow ends before the action runs so it may queue more.
            let next = queue.borrow_mut().pop_front();
            let Some(next) = next else { break };
            next(db)?;
            drained += 1;
        }

        scope.conn.commit()?;
        scope.begun = false;
        tracing::debug!(drained = drained, "Transaction committed");

        Ok(Completion::Committed)
    }
}

/// Cleanup for the owning caller, on every exit path including panics.
///
/// Discards queued actions, rolls back when the engine transaction is still
/// open and releases ownership.
struct OwnedScope<'a, C: Connection> {
    conn: &'a C,
    queue: &'a RefCell<VecDeque<DeferredAction<C>>>,
    active: &'a AtomicBool,
    begun: bool,
}

impl<C: Connection> Drop for OwnedScope<'_, C> {
    fn drop(&mut self) {
        let discarded = match self.queue.try_borrow_mut() {
            Ok(mut pending) => {
                let n = pending.len();
                pending.clear();
                n
            }
            Err(_) => 0,
        };

        if self.begun && self.conn.in_transaction() {
            tracing::warn!(discarded = discarded, "Rolling back transaction");
            if let Err(e) = self.conn.rollback() {
                tracing::warn!(error = %e, "Rollback failed");
            }
        }

        self.active.store(false, Ordering::Release);
    }
}
