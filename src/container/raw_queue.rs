//! Raw Queue: a FIFO view over a named database, keyed by monotonically
//! increasing 8-byte big-endian sequence numbers.

use crate::{
    Database, Environment, MdbxResult,
    flags::{DatabaseFlags, WriteFlags},
    txn::{RW, Transaction, write_batch},
};
use byteorder::{BigEndian, ByteOrder};

const SEQ_LEN: usize = 8;

fn encode_seq(seq: u64) -> [u8; SEQ_LEN] {
    let mut buf = [0u8; SEQ_LEN];
    BigEndian::write_u64(&mut buf, seq);
    buf
}

fn decode_seq(bytes: &[u8]) -> u64 {
    BigEndian::read_u64(bytes)
}

/// A FIFO queue of opaque byte values, backed by a named database whose
/// keys are sequence numbers the queue manages itself.
#[derive(Debug, Clone)]
pub struct RawQueue {
    env: Environment,
    db: Database,
}

impl RawQueue {
    /// Opens (creating if absent) the named database `name` in `env` as a
    /// raw queue.
    pub fn open(env: &Environment, name: Option<&str>) -> MdbxResult<Self> {
        let db = env.open_db(name)?;
        Ok(Self { env: env.clone(), db })
    }

    /// The environment backing this queue.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// The database handle backing this queue.
    pub fn database(&self) -> Database {
        self.db
    }

    /// Appends `value` to the back of the queue.
    pub fn push(&self, value: &[u8]) -> MdbxResult<()> {
        write_batch(&self.env, |txn| {
            let next = self.next_seq(txn)?;
            txn.put(self.db, &encode_seq(next), value, WriteFlags::empty())
        })
    }

    fn next_seq(&self, txn: &Transaction<RW>) -> MdbxResult<u64> {
        let mut cursor = txn.cursor(self.db)?;
        match cursor.last()? {
            Some((key, _)) => Ok(decode_seq(&key) + 1),
            None => Ok(0),
        }
    }

    /// Removes and returns the value at the front of the queue, or `None`
    /// if empty.
    pub fn pop_front(&self) -> MdbxResult<Option<Vec<u8>>> {
        write_batch(&self.env, |txn| {
            let front = {
                let mut cursor = txn.cursor(self.db)?;
                cursor.first()?.map(|(k, v)| (k.into_owned(), v.into_owned()))
            };
            let Some((key, value)) = front else {
                return Ok(None);
            };
            txn.del(self.db, &key, None)?;
            Ok(Some(value))
        })
    }

    /// Returns (without removing) the value at the front of the queue.
    pub fn peek_front(&self) -> MdbxResult<Option<Vec<u8>>> {
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.cursor(self.db)?;
        let value = cursor.first()?.map(|(_, v)| v.into_owned());
        drop(cursor);
        txn.abort();
        Ok(value)
    }

    /// Returns (without removing) the value at the back of the queue.
    pub fn peek_back(&self) -> MdbxResult<Option<Vec<u8>>> {
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.cursor(self.db)?;
        let value = cursor.last()?.map(|(_, v)| v.into_owned());
        drop(cursor);
        txn.abort();
        Ok(value)
    }

    /// The number of entries currently queued.
    pub fn len(&self) -> MdbxResult<usize> {
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.cursor(self.db)?;
        let mut count = 0usize;
        let mut entry = cursor.first()?;
        while entry.is_some() {
            count += 1;
            entry = cursor.next()?;
        }
        drop(cursor);
        txn.abort();
        Ok(count)
    }

    /// Whether the queue has no entries.
    pub fn is_empty(&self) -> MdbxResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes every entry.
    pub fn clear(&self) -> MdbxResult<()> {
        write_batch(&self.env, |txn| txn.clear_db(self.db))
    }

    /// All values currently queued. Front-to-back (enqueue order) unless
    /// `reverse` is set, in which case back-to-front (LIFO).
    pub fn iter(&self, reverse: bool) -> MdbxResult<Vec<Vec<u8>>> {
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.cursor(self.db)?;
        let mut out = Vec::new();
        let mut entry = if reverse { cursor.last()? } else { cursor.first()? };
        while let Some((_, v)) = entry {
            out.push(v.into_owned());
            entry = if reverse { cursor.prev()? } else { cursor.next()? };
        }
        drop(cursor);
        txn.abort();
        Ok(out)
    }

    /// Runs `f` with a write transaction scoped to this queue's environment,
    /// joining an already-open batch on this thread if there is one.
    pub fn write_batch<F, T>(&self, f: F) -> MdbxResult<T>
    where
        F: FnOnce(&Transaction<RW>) -> MdbxResult<T>,
    {
        write_batch(&self.env, f)
    }

    pub(crate) fn create_db(
        env: &Environment,
        name: Option<&str>,
        extra_flags: DatabaseFlags,
    ) -> MdbxResult<Self> {
        let txn = env.begin_rw_txn()?;
        let db = txn.create_db(name, extra_flags)?;
        txn.commit()?;
        Ok(Self { env: env.clone(), db })
    }
}
