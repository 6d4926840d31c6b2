//! Cooked Queue: a [`RawQueue`] composed with a value chain. Queue keys are
//! generated internally and never exposed to a transform chain.

use crate::{Environment, MdbxResult, transform::TransformChain};
use serde::{Serialize, de::DeserializeOwned};

use super::RawQueue;

/// A FIFO queue whose values pass through a [`TransformChain`] on the way in
/// and out.
#[derive(Clone)]
pub struct CookedQueue {
    raw: RawQueue,
    value_chain: TransformChain,
}

impl CookedQueue {
    /// Opens (creating if absent) the named database `name` in `env` as a
    /// cooked queue.
    pub fn open(
        env: &Environment,
        name: Option<&str>,
        value_chain: TransformChain,
    ) -> MdbxResult<Self> {
        Ok(Self { raw: RawQueue::open(env, name)?, value_chain })
    }

    /// The underlying raw queue (bypasses the value chain).
    pub fn raw(&self) -> &RawQueue {
        &self.raw
    }

    /// Appends `value` to the back of the queue.
    pub fn push<V: Serialize + 'static>(&self, value: &V) -> MdbxResult<()> {
        let raw_value = self.value_chain.forward(value)?;
        self.raw.push(&raw_value)
    }

    /// Removes and returns the value at the front of the queue, or `None`
    /// if empty.
    pub fn pop_front<V: DeserializeOwned + 'static>(&self) -> MdbxResult<Option<V>> {
        self.raw.pop_front()?.as_deref().map(|raw| self.value_chain.inverse(raw)).transpose()
    }

    /// Returns (without removing) the value at the front of the queue.
    pub fn peek_front<V: DeserializeOwned + 'static>(&self) -> MdbxResult<Option<V>> {
        self.raw.peek_front()?.as_deref().map(|raw| self.value_chain.inverse(raw)).transpose()
    }

    /// Returns (without removing) the value at the back of the queue.
    pub fn peek_back<V: DeserializeOwned + 'static>(&self) -> MdbxResult<Option<V>> {
        self.raw.peek_back()?.as_deref().map(|raw| self.value_chain.inverse(raw)).transpose()
    }

    /// The number of entries currently queued.
    pub fn len(&self) -> MdbxResult<usize> {
        self.raw.len()
    }

    /// Whether the queue has no entries.
    pub fn is_empty(&self) -> MdbxResult<bool> {
        self.raw.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) -> MdbxResult<()> {
        self.raw.clear()
    }

    /// All values currently queued, decoded. Front-to-back (enqueue order)
    /// unless `reverse` is set, in which case back-to-front (LIFO).
    pub fn iter<V: DeserializeOwned + 'static>(&self, reverse: bool) -> MdbxResult<Vec<V>> {
        self.raw.iter(reverse)?.iter().map(|raw| self.value_chain.inverse(raw)).collect()
    }

    /// Runs `f` with a write transaction scoped to this queue's environment.
    pub fn write_batch<F, T>(&self, f: F) -> MdbxResult<T>
    where
        F: FnOnce(&crate::txn::Transaction<crate::txn::RW>) -> MdbxResult<T>,
    {
        self.raw.write_batch(f)
    }
}

impl PartialEq for CookedQueue {
    fn eq(&self, other: &Self) -> bool {
        self.raw.env().path() == other.raw.env().path()
            && self.raw.database() == other.raw.database()
            && self.value_chain == other.value_chain
    }
}

impl Eq for CookedQueue {}
