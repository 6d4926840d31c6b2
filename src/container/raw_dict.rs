//! Raw Dict: a byte-keyed, byte-valued mapping view over a named database.

use crate::container::Iter;
use crate::{
    Database, Environment, MdbxError, MdbxResult,
    flags::{DatabaseFlags, WriteFlags},
    txn::{RO, RW, Transaction, write_batch},
};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Weak};

/// A dictionary whose keys and values are exactly the bytes handed to it —
/// no serialization, signing, or compression.
///
/// Every operation opens its own transaction (nesting transparently inside
/// an enclosing [`crate::txn::WriteBatch`] on the same thread); there is no
/// notion of holding a dict "open" for writing beyond a single call.
#[derive(Debug, Clone)]
pub struct RawDict {
    env: Environment,
    db: Database,
    /// Marks this specific dict handle (and its clones) alive. A bulk job
    /// spawned from this handle holds only [`Weak`] of this, so dropping
    /// every clone the caller holds lets the job observe that at its next
    /// entry boundary and terminate with `Cancelled` instead of running on
    /// with nobody left to see the result.
    alive: Arc<()>,
}

impl RawDict {
    /// Opens (creating if absent) the named database `name` in `env` as a
    /// raw dict. `name = None` addresses the environment's unnamed/default
    /// database.
    pub fn open(env: &Environment, name: Option<&str>) -> MdbxResult<Self> {
        let db = env.open_db(name)?;
        Ok(Self { env: env.clone(), db, alive: Arc::new(()) })
    }

    /// The environment backing this dict.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// The database handle backing this dict.
    pub fn database(&self) -> Database {
        self.db
    }

    /// A weak handle the [`crate::bulk`] executor uses to detect that every
    /// clone of this particular dict the caller held has been dropped.
    pub(crate) fn alive_weak(&self) -> Weak<()> {
        Arc::downgrade(&self.alive)
    }

    fn check_key(key: &[u8]) -> MdbxResult<()> {
        if key.is_empty() { Err(MdbxError::EmptyKey) } else { Ok(()) }
    }

    /// Returns the value at `key`.
    pub fn get(&self, key: &[u8]) -> MdbxResult<Vec<u8>> {
        Self::check_key(key)?;
        let txn = self.env.begin_ro_txn()?;
        let value = txn.get(self.db, key)?.map(|cow| cow.into_owned());
        txn.abort();
        value.ok_or(MdbxError::NotFound)
    }

    /// Returns the value at `key`, or `default` if absent.
    pub fn get_or(&self, key: &[u8], default: Vec<u8>) -> MdbxResult<Vec<u8>> {
        match self.get(key) {
            Ok(value) => Ok(value),
            Err(MdbxError::NotFound) => Ok(default),
            Err(e) => Err(e),
        }
    }

    /// Stores `value` at `key`, overwriting any existing value.
    pub fn put(&self, key: &[u8], value: &[u8]) -> MdbxResult<()> {
        Self::check_key(key)?;
        self.with_write(|txn| txn.put(self.db, key, value, WriteFlags::empty()))
    }

    /// Stores `value` at `key` only if `key` is not already present,
    /// returning the value now stored at `key` (the new value if it was
    /// absent, the existing one otherwise).
    pub fn setdefault(&self, key: &[u8], value: &[u8]) -> MdbxResult<Vec<u8>> {
        Self::check_key(key)?;
        self.with_write(|txn| {
            if let Some(existing) = txn.get(self.db, key)? {
                return Ok(existing.into_owned());
            }
            txn.put(self.db, key, value, WriteFlags::empty())?;
            Ok(value.to_vec())
        })
    }

    /// Removes `key`.
    pub fn remove(&self, key: &[u8]) -> MdbxResult<()> {
        Self::check_key(key)?;
        self.with_write(|txn| match txn.del(self.db, key, None)? {
            true => Ok(()),
            false => Err(MdbxError::NotFound),
        })
    }

    /// Removes `key` and returns its former value.
    pub fn pop(&self, key: &[u8]) -> MdbxResult<Vec<u8>> {
        Self::check_key(key)?;
        self.with_write(|txn| {
            let Some(value) = txn.get(self.db, key)?.map(|cow| cow.into_owned()) else {
                return Err(MdbxError::NotFound);
            };
            txn.del(self.db, key, None)?;
            Ok(value)
        })
    }

    /// Removes and returns the `(key, value)` pair at the current head of
    /// the key ordering (the smallest key).
    pub fn popitem(&self) -> MdbxResult<(Vec<u8>, Vec<u8>)> {
        self.with_write(|txn| {
            let (key, value) = {
                let mut cursor = txn.cursor(self.db)?;
                let Some((k, v)) = cursor.first()? else {
                    return Err(MdbxError::EmptyDatabase);
                };
                (k.into_owned(), v.into_owned())
            };
            txn.del(self.db, &key, None)?;
            Ok((key, value))
        })
    }

    /// Whether `key` is present. An empty key is simply absent, never an
    /// error.
    pub fn contains(&self, key: &[u8]) -> MdbxResult<bool> {
        if key.is_empty() {
            return Ok(false);
        }
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(MdbxError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The number of entries.
    pub fn len(&self) -> MdbxResult<usize> {
        let txn = self.env.begin_ro_txn()?;
        let count = Self::count(&txn, self.db)?;
        txn.abort();
        Ok(count)
    }

    /// Whether the dict has no entries.
    pub fn is_empty(&self) -> MdbxResult<bool> {
        Ok(self.len()? == 0)
    }

    fn count(txn: &Transaction<RO>, db: Database) -> MdbxResult<usize> {
        let mut cursor = txn.cursor(db)?;
        let mut count = 0usize;
        let mut entry = cursor.first()?;
        while entry.is_some() {
            count += 1;
            entry = cursor.next()?;
        }
        Ok(count)
    }

    /// Removes every entry.
    pub fn clear(&self) -> MdbxResult<()> {
        self.with_write(|txn| txn.clear_db(self.db))
    }

    /// Lazily iterates `(key, value)` pairs. Forward order unless
    /// `reverse` is set. The iteration sees a snapshot pinned at the read
    /// transaction opened here; concurrent mutations are invisible to it.
    pub fn items(&self, reverse: bool) -> MdbxResult<Iter<RO>> {
        let txn = self.env.begin_ro_txn()?;
        let cursor = txn.cursor(self.db)?;
        Ok(Iter::new(cursor, reverse))
    }

    /// Lazily iterates keys in the same order as [`Self::items`].
    pub fn keys(&self, reverse: bool) -> MdbxResult<impl Iterator<Item = MdbxResult<Vec<u8>>>> {
        Ok(self.items(reverse)?.map(|entry| entry.map(|(k, _)| k)))
    }

    /// Lazily iterates values in the same order as [`Self::items`].
    pub fn values(&self, reverse: bool) -> MdbxResult<impl Iterator<Item = MdbxResult<Vec<u8>>>> {
        Ok(self.items(reverse)?.map(|entry| entry.map(|(_, v)| v)))
    }

    /// Fully materialized, ascending-key list of keys.
    pub fn noiterkeys(&self) -> MdbxResult<Vec<Vec<u8>>> {
        self.keys(false)?.collect()
    }

    /// Fully materialized, ascending-key list of values.
    pub fn noitervalues(&self) -> MdbxResult<Vec<Vec<u8>>> {
        self.values(false)?.collect()
    }

    /// Fully materialized, ascending-key list of `(key, value)` pairs.
    pub fn noiteritems(&self) -> MdbxResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.items(false)?.collect()
    }

    /// Deletes every key in `[from, to)`. A no-op if `from > to` or no keys
    /// fall in range.
    pub fn erase(&self, from: &[u8], to: &[u8]) -> MdbxResult<()> {
        self.with_write(|txn| {
            let mut doomed = Vec::new();
            {
                let mut cursor = txn.cursor(self.db)?;
                let mut entry = cursor.set_range(from)?;
                while let Some((k, _)) = entry {
                    if k.as_ref() >= to {
                        break;
                    }
                    doomed.push(k.into_owned());
                    entry = cursor.next()?;
                }
            }
            for key in doomed {
                txn.del(self.db, &key, None)?;
            }
            Ok(())
        })
    }

    /// Applies every `(key, value)` pair. On any element's error, the whole
    /// update aborts and no entries from this call are stored.
    pub fn update<I>(&self, pairs: I) -> MdbxResult<()>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        self.with_write(move |txn| {
            for (key, value) in pairs {
                Self::check_key(&key)?;
                txn.put(self.db, &key, &value, WriteFlags::empty())?;
            }
            Ok(())
        })
    }

    /// Removes every entry for which `predicate` returns `true`, returning
    /// the number removed. On a predicate error, nothing from this call is
    /// removed.
    pub fn remove_if(
        &self,
        mut predicate: impl FnMut(&[u8], &[u8]) -> MdbxResult<bool>,
    ) -> MdbxResult<usize> {
        self.with_write(|txn| {
            let mut doomed = Vec::new();
            {
                let mut cursor = txn.cursor(self.db)?;
                let mut entry = cursor.first()?;
                while let Some((k, v)) = entry {
                    if predicate(&k, &v)? {
                        doomed.push(k.into_owned());
                    }
                    entry = cursor.next()?;
                }
            }
            let removed = doomed.len();
            for key in doomed {
                txn.del(self.db, &key, None)?;
            }
            Ok(removed)
        })
    }

    /// Replaces every value `v` with `f(k, v)`. On `f`'s error, the
    /// in-flight transaction aborts and nothing from this call is written.
    pub fn transform_values(
        &self,
        mut f: impl FnMut(&[u8], &[u8]) -> MdbxResult<Vec<u8>>,
    ) -> MdbxResult<()> {
        self.with_write(|txn| {
            let mut updates = Vec::new();
            {
                let mut cursor = txn.cursor(self.db)?;
                let mut entry = cursor.first()?;
                while let Some((k, v)) = entry {
                    let new_value = f(&k, &v)?;
                    if new_value != *v {
                        updates.push((k.into_owned(), new_value));
                    }
                    entry = cursor.next()?;
                }
            }
            for (key, value) in updates {
                txn.put(self.db, &key, &value, WriteFlags::empty())?;
            }
            Ok(())
        })
    }

    /// Removes entries whose value duplicates an earlier (smaller-keyed)
    /// entry's value, fingerprinting values with SHA-256. Keeps the
    /// smallest key for each distinct value.
    pub fn remove_duplicates(&self) -> MdbxResult<usize> {
        self.with_write(|txn| {
            let mut seen: HashSet<[u8; 32]> = HashSet::new();
            let mut doomed = Vec::new();
            {
                let mut cursor = txn.cursor(self.db)?;
                let mut entry = cursor.first()?;
                while let Some((k, v)) = entry {
                    let fingerprint: [u8; 32] = Sha256::digest(&v).into();
                    if !seen.insert(fingerprint) {
                        doomed.push(k.into_owned());
                    }
                    entry = cursor.next()?;
                }
            }
            let removed = doomed.len();
            for key in doomed {
                txn.del(self.db, &key, None)?;
            }
            Ok(removed)
        })
    }

    /// Drains every entry of this dict into `dest`. Atomic (a single write
    /// transaction) when both dicts share an environment; otherwise two
    /// transactions, with this dict cleared only after `dest` accepts the
    /// whole batch. On key collision, `dest`'s existing value is
    /// overwritten.
    pub fn move_to(&self, dest: &RawDict) -> MdbxResult<()> {
        if self.env.env_ptr() == dest.env.env_ptr() {
            return write_batch(&self.env, |txn| {
                let entries = {
                    let mut cursor = txn.cursor(self.db)?;
                    let mut out = Vec::new();
                    let mut entry = cursor.first()?;
                    while let Some((k, v)) = entry {
                        out.push((k.into_owned(), v.into_owned()));
                        entry = cursor.next()?;
                    }
                    out
                };
                for (key, value) in &entries {
                    txn.put(dest.db, key, value, WriteFlags::empty())?;
                }
                for (key, _) in &entries {
                    txn.del(self.db, key, None)?;
                }
                Ok(())
            });
        }

        let entries = self.noiteritems()?;
        dest.update(entries)?;
        self.clear()
    }

    /// Runs `f` with a write transaction scoped to this dict's environment,
    /// joining an already-open batch on this thread if there is one.
    pub fn write_batch<F, T>(&self, f: F) -> MdbxResult<T>
    where
        F: FnOnce(&Transaction<RW>) -> MdbxResult<T>,
    {
        write_batch(&self.env, f)
    }

    fn with_write<F, T>(&self, f: F) -> MdbxResult<T>
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
        Ok(Self { env: env.clone(), db, alive: Arc::new(()) })
    }

    /// Background variant of [`Self::remove_if`], run on the
    /// [`crate::bulk`] worker pool.
    pub fn remove_if_async(
        &self,
        predicate: impl FnMut(&[u8], &[u8]) -> MdbxResult<bool> + Send + 'static,
    ) -> crate::bulk::BulkHandle<usize> {
        crate::bulk::remove_if_async(self, predicate)
    }

    /// Background variant of [`Self::transform_values`], run on the
    /// [`crate::bulk`] worker pool.
    pub fn transform_values_async(
        &self,
        f: impl FnMut(&[u8], &[u8]) -> MdbxResult<Vec<u8>> + Send + 'static,
    ) -> crate::bulk::BulkHandle<()> {
        crate::bulk::transform_values_async(self, f)
    }

    /// Background variant of [`Self::remove_duplicates`], run on the
    /// [`crate::bulk`] worker pool.
    pub fn remove_duplicates_async(&self) -> crate::bulk::BulkHandle<usize> {
        crate::bulk::remove_duplicates_async(self)
    }

    /// Background variant of [`Self::move_to`], run on the [`crate::bulk`]
    /// worker pool.
    pub fn move_to_async(&self, dest: &RawDict) -> crate::bulk::BulkHandle<()> {
        crate::bulk::move_to_async(self, dest)
    }
}
