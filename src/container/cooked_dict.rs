//! Cooked Dict: a [`RawDict`] composed with a key chain and a value chain.

use crate::{
    Environment, MdbxError, MdbxResult,
    transform::TransformChain,
};
use serde::{Serialize, de::DeserializeOwned};
use std::any::Any;

use super::RawDict;

fn is_empty_identity_key<K: 'static>(key: &K) -> bool {
    (key as &dyn Any).downcast_ref::<Vec<u8>>().is_some_and(|v| v.is_empty())
}

/// A dict whose keys and values pass through a [`TransformChain`] on the way
/// in and out.
///
/// When both chains are the identity, behavior is indistinguishable from a
/// [`RawDict`] over `Vec<u8>`. The empty-key rule (spec.md §4.6): an empty
/// input key raises [`MdbxError::EmptyKey`] only when the key chain's
/// serializer and signer are both the identity; a transforming key chain
/// always produces non-empty framing bytes, so an "empty" input key behaves
/// as an ordinary (non-empty, once transformed) key.
#[derive(Clone)]
pub struct CookedDict {
    raw: RawDict,
    name: Option<String>,
    key_chain: TransformChain,
    value_chain: TransformChain,
}

impl CookedDict {
    /// Opens (creating if absent) the named database `name` in `env`,
    /// wrapped with the given key and value transform chains.
    pub fn open(
        env: &Environment,
        name: Option<&str>,
        key_chain: TransformChain,
        value_chain: TransformChain,
    ) -> MdbxResult<Self> {
        let raw = RawDict::open(env, name)?;
        Ok(Self { raw, name: name.map(str::to_owned), key_chain, value_chain })
    }

    /// The underlying raw dict (bypasses both transform chains).
    pub fn raw(&self) -> &RawDict {
        &self.raw
    }

    fn identity_keys(&self) -> bool {
        self.key_chain.is_identity_for_keys()
    }

    fn encode_key<K: Serialize + 'static>(&self, key: &K) -> MdbxResult<Vec<u8>> {
        if self.identity_keys() && is_empty_identity_key(key) {
            return Err(MdbxError::EmptyKey);
        }
        self.key_chain.forward(key)
    }

    fn decode_key<K: DeserializeOwned + 'static>(&self, raw: &[u8]) -> MdbxResult<K> {
        self.key_chain.inverse(raw)
    }

    fn decode_value<V: DeserializeOwned + 'static>(&self, raw: &[u8]) -> MdbxResult<V> {
        self.value_chain.inverse(raw)
    }

    /// Returns the value at `key`.
    pub fn get<K, V>(&self, key: &K) -> MdbxResult<V>
    where
        K: Serialize + 'static,
        V: DeserializeOwned + 'static,
    {
        let raw_key = self.encode_key(key)?;
        let raw_value = self.raw.get(&raw_key)?;
        self.decode_value(&raw_value)
    }

    /// Returns the value at `key`, or `default` if absent.
    pub fn get_or<K, V>(&self, key: &K, default: V) -> MdbxResult<V>
    where
        K: Serialize + 'static,
        V: Serialize + DeserializeOwned + 'static,
    {
        match self.get(key) {
            Ok(value) => Ok(value),
            Err(MdbxError::NotFound) => Ok(default),
            Err(e) => Err(e),
        }
    }

    /// Stores `value` at `key`, overwriting any existing value.
    pub fn put<K, V>(&self, key: &K, value: &V) -> MdbxResult<()>
    where
        K: Serialize + 'static,
        V: Serialize + 'static,
    {
        let raw_key = self.encode_key(key)?;
        let raw_value = self.value_chain.forward(value)?;
        self.raw.put(&raw_key, &raw_value)
    }

    /// Stores `value` at `key` only if `key` is not already present,
    /// returning the value now stored at `key`.
    pub fn setdefault<K, V>(&self, key: &K, value: V) -> MdbxResult<V>
    where
        K: Serialize + 'static,
        V: Serialize + DeserializeOwned + 'static,
    {
        match self.get(key) {
            Ok(existing) => Ok(existing),
            Err(MdbxError::NotFound) => {
                self.put(key, &value)?;
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    /// Removes `key`.
    pub fn remove<K>(&self, key: &K) -> MdbxResult<()>
    where
        K: Serialize + 'static,
    {
        let raw_key = self.encode_key(key)?;
        self.raw.remove(&raw_key)
    }

    /// Removes `key` and returns its former value.
    pub fn pop<K, V>(&self, key: &K) -> MdbxResult<V>
    where
        K: Serialize + 'static,
        V: DeserializeOwned + 'static,
    {
        let raw_key = self.encode_key(key)?;
        let raw_value = self.raw.pop(&raw_key)?;
        self.decode_value(&raw_value)
    }

    /// Removes and returns the `(key, value)` pair at the current head of
    /// the raw key ordering.
    pub fn popitem<K, V>(&self) -> MdbxResult<(K, V)>
    where
        K: DeserializeOwned + 'static,
        V: DeserializeOwned + 'static,
    {
        let (raw_key, raw_value) = self.raw.popitem()?;
        Ok((self.decode_key(&raw_key)?, self.decode_value(&raw_value)?))
    }

    /// Whether `key` is present.
    pub fn contains<K>(&self, key: &K) -> MdbxResult<bool>
    where
        K: Serialize + 'static,
    {
        match self.encode_key(key) {
            Ok(raw_key) => self.raw.contains(&raw_key),
            Err(MdbxError::EmptyKey) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The number of entries.
    pub fn len(&self) -> MdbxResult<usize> {
        self.raw.len()
    }

    /// Whether the dict has no entries.
    pub fn is_empty(&self) -> MdbxResult<bool> {
        self.raw.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) -> MdbxResult<()> {
        self.raw.clear()
    }

    /// Fully materialized, raw-key-ordered list of decoded keys.
    pub fn noiterkeys<K>(&self) -> MdbxResult<Vec<K>>
    where
        K: DeserializeOwned + 'static,
    {
        self.raw.noiterkeys()?.iter().map(|k| self.decode_key(k)).collect()
    }

    /// Fully materialized, raw-key-ordered list of decoded values.
    pub fn noitervalues<V>(&self) -> MdbxResult<Vec<V>>
    where
        V: DeserializeOwned + 'static,
    {
        self.raw.noitervalues()?.iter().map(|v| self.decode_value(v)).collect()
    }

    /// Fully materialized, raw-key-ordered list of decoded `(key, value)`
    /// pairs.
    pub fn noiteritems<K, V>(&self) -> MdbxResult<Vec<(K, V)>>
    where
        K: DeserializeOwned + 'static,
        V: DeserializeOwned + 'static,
    {
        self.raw
            .noiteritems()?
            .iter()
            .map(|(k, v)| Ok((self.decode_key(k)?, self.decode_value(v)?)))
            .collect()
    }

    /// Deletes every key in `[from, to)`. Only defined when the key chain is
    /// fully the identity (serializer, signer and compressor); otherwise
    /// byte-order ranges on transformed keys aren't meaningful.
    pub fn erase(&self, from: &[u8], to: &[u8]) -> MdbxResult<()> {
        if !self.key_chain.is_identity() {
            return Err(MdbxError::Unsupported(
                "erase is only defined when the key chain is fully the identity",
            ));
        }
        self.raw.erase(from, to)
    }

    /// Removes every entry for which `predicate` returns `true` on the
    /// decoded `(key, value)` pair.
    pub fn remove_if<K, V>(
        &self,
        mut predicate: impl FnMut(&K, &V) -> MdbxResult<bool>,
    ) -> MdbxResult<usize>
    where
        K: DeserializeOwned + 'static,
        V: DeserializeOwned + 'static,
    {
        self.raw.remove_if(|raw_key, raw_value| {
            let key: K = self.decode_key(raw_key)?;
            let value: V = self.decode_value(raw_value)?;
            predicate(&key, &value)
        })
    }

    /// Replaces every value `v` with `f(k, v)`, encoding/decoding through
    /// both chains.
    pub fn transform_values<K, V>(
        &self,
        mut f: impl FnMut(&K, &V) -> MdbxResult<V>,
    ) -> MdbxResult<()>
    where
        K: DeserializeOwned + 'static,
        V: Serialize + DeserializeOwned + 'static,
    {
        self.raw.transform_values(|raw_key, raw_value| {
            let key: K = self.decode_key(raw_key)?;
            let value: V = self.decode_value(raw_value)?;
            let new_value = f(&key, &value)?;
            self.value_chain.forward(&new_value)
        })
    }

    /// Removes entries whose raw stored value duplicates an earlier
    /// (smaller-keyed) entry's raw value.
    pub fn remove_duplicates(&self) -> MdbxResult<usize> {
        self.raw.remove_duplicates()
    }

    /// Drains every entry of this dict into `dest`. Both dicts must share
    /// identical chains for the transformed bytes to remain meaningful in
    /// the destination; this is not checked here (callers compose dicts with
    /// matching chains by construction).
    pub fn move_to(&self, dest: &CookedDict) -> MdbxResult<()> {
        self.raw.move_to(&dest.raw)
    }

    /// Runs `f` with a write transaction scoped to this dict's environment.
    pub fn write_batch<F, T>(&self, f: F) -> MdbxResult<T>
    where
        F: FnOnce(&crate::txn::Transaction<crate::txn::RW>) -> MdbxResult<T>,
    {
        self.raw.write_batch(f)
    }
}

impl PartialEq for CookedDict {
    /// Structural equality over (environment path, sub-database name, key
    /// chain, value chain) — not identity (spec.md §4.6).
    fn eq(&self, other: &Self) -> bool {
        self.raw.env().path() == other.raw.env().path()
            && self.name == other.name
            && self.key_chain == other.key_chain
            && self.value_chain == other.value_chain
    }
}

impl Eq for CookedDict {}
