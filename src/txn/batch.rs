//! Write-Batch: a scoped acquisition of a single write transaction across
//! several container operations.
//!
//! A nested `write_batch` call on the same thread and environment joins the
//! outer one automatically — see [`crate::txn`]'s module docs for how the
//! thread-local nesting stack makes this transparent.

use super::{RW, Transaction};
use crate::{Environment, MdbxResult};

/// Runs `f` with a single write transaction scoped to the call.
///
/// On success the transaction commits; if `f` returns `Err`, it aborts and
/// every write made during the call (including by containers that opened
/// their own nested transactions inside `f`) is discarded.
pub fn write_batch<F, T>(env: &Environment, f: F) -> MdbxResult<T>
where
    F: FnOnce(&Transaction<RW>) -> MdbxResult<T>,
{
    let txn = Transaction::<RW>::new(env.clone())?;
    match f(&txn) {
        Ok(value) => {
            txn.commit()?;
            Ok(value)
        }
        Err(e) => {
            txn.abort();
            Err(e)
        }
    }
}

/// A scoped write-batch handle, for callers who want to interleave
/// arbitrary other logic rather than supplying a single closure.
///
/// Equivalent to [`write_batch`], but the caller drives commit/abort
/// explicitly. Dropping without calling either aborts.
pub struct WriteBatch<'env> {
    txn: Option<Transaction<RW>>,
    _env: &'env Environment,
}

impl<'env> WriteBatch<'env> {
    /// Opens (or joins, if one is already open on this thread for this
    /// environment) a write transaction scoped to this batch.
    pub fn new(env: &'env Environment) -> MdbxResult<Self> {
        Ok(Self { txn: Some(Transaction::<RW>::new(env.clone())?), _env: env })
    }

    /// The transaction backing this batch.
    pub fn txn(&self) -> &Transaction<RW> {
        self.txn.as_ref().expect("write batch transaction taken")
    }

    /// Commits every write made through this batch's transaction.
    pub fn commit(mut self) -> MdbxResult<()> {
        self.txn.take().expect("write batch transaction taken").commit()
    }

    /// Aborts the batch, discarding its writes (or, if nested, only the
    /// writes made since it was opened).
    pub fn abort(mut self) {
        if let Some(txn) = self.txn.take() {
            txn.abort();
        }
    }
}

impl Drop for WriteBatch<'_> {
    fn drop(&mut self) {
        if let Some(txn) = self.txn.take() {
            txn.abort();
        }
    }
}
