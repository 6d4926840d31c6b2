//! Property-based coverage of the container-layer invariants from spec §8:
//! put/get round-trip, remove-then-absent, and sorted iteration order hold
//! for arbitrary byte keys and values, not just the fixed fixtures in
//! `raw_dict.rs`.

use mdbx_containers::{Environment, RawDict};
use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::tempdir;

fn arb_key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..64)
}

fn arb_value() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// `put(K, V); get(K) = V` for any non-empty key and arbitrary value.
    #[test]
    fn put_then_get_round_trips(key in arb_key(), value in arb_value()) {
        let dir = tempdir().unwrap();
        let env = Environment::builder().open(dir.path()).unwrap();
        let dict = RawDict::open(&env, None).unwrap();

        dict.put(&key, &value).unwrap();
        prop_assert_eq!(dict.get(&key).unwrap(), value);
    }

    /// `put(K, V); remove(K); contains(K) = false`.
    #[test]
    fn put_then_remove_is_absent(key in arb_key(), value in arb_value()) {
        let dir = tempdir().unwrap();
        let env = Environment::builder().open(dir.path()).unwrap();
        let dict = RawDict::open(&env, None).unwrap();

        dict.put(&key, &value).unwrap();
        dict.remove(&key).unwrap();
        prop_assert!(!dict.contains(&key).unwrap());
    }

    /// `noiterkeys()` always comes back byte-lexicographically sorted,
    /// regardless of insertion order, and matches a `BTreeMap` reference.
    #[test]
    fn iteration_order_matches_sorted_keys(
        pairs in prop::collection::vec((arb_key(), arb_value()), 0..32)
    ) {
        let dir = tempdir().unwrap();
        let env = Environment::builder().open(dir.path()).unwrap();
        let dict = RawDict::open(&env, None).unwrap();

        let mut reference = BTreeMap::new();
        for (key, value) in pairs {
            dict.put(&key, &value).unwrap();
            reference.insert(key, value);
        }

        let keys = dict.noiterkeys().unwrap();
        let expected_keys: Vec<_> = reference.keys().cloned().collect();
        prop_assert_eq!(&keys, &expected_keys);

        let reversed: Vec<_> = dict.keys(true).unwrap().map(Result::unwrap).collect();
        let mut expected_reversed = expected_keys.clone();
        expected_reversed.reverse();
        prop_assert_eq!(reversed, expected_reversed);
    }
}
