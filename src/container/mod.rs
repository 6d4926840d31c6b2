//! The container layer: ordered byte-mappings and FIFOs built on top of the
//! [`crate::env`]/[`crate::txn`] primitives, and their typed ("cooked")
//! variants layered with a [`crate::transform`] pipeline.

mod cooked_dict;
mod cooked_queue;
mod raw_dict;
mod raw_queue;

pub use cooked_dict::CookedDict;
pub use cooked_queue::CookedQueue;
pub use raw_dict::RawDict;
pub use raw_queue::RawQueue;

use crate::{
    MdbxResult,
    txn::{Cursor, TransactionKind, RO},
};

/// A lazy, forward-or-reverse iterator of `(key, value)` pairs over a single
/// transaction's snapshot.
///
/// Pins a transaction and a cursor inside it for its whole life, so the
/// snapshot it observes is exactly the one in effect when the iterator was
/// created — concurrent writes by other transactions are never visible.
/// Restartable only by constructing a new iterator (spec.md §4.3).
pub struct Iter<K: TransactionKind = RO> {
    cursor: Cursor<K>,
    reverse: bool,
    started: bool,
    done: bool,
}

impl<K: TransactionKind> Iter<K> {
    pub(crate) fn new(cursor: Cursor<K>, reverse: bool) -> Self {
        Self { cursor, reverse, started: false, done: false }
    }

    fn advance(&mut self) -> MdbxResult<Option<(Vec<u8>, Vec<u8>)>> {
        let entry = if !self.started {
            self.started = true;
            if self.reverse { self.cursor.last()? } else { self.cursor.first()? }
        } else if self.reverse {
            self.cursor.prev()?
        } else {
            self.cursor.next()?
        };
        Ok(entry.map(|(k, v)| (k.into_owned(), v.into_owned())))
    }
}

impl<K: TransactionKind> Iterator for Iter<K> {
    type Item = MdbxResult<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
