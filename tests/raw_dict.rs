//! End-to-end coverage of [`RawDict`] over a real temporary environment.

use mdbx_containers::{Environment, MdbxError, RawDict};
use tempfile::TempDir;

/// Returns an `Environment` alongside the `TempDir` guard that backs it; the
/// directory is removed once the guard is dropped, so callers must keep it
/// alive (typically by binding it with `let (env, _dir) = env();`) for as
/// long as the environment is in use.
fn env() -> (Environment, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut builder = Environment::builder();
    builder.set_max_dbs(8);
    let env = builder.open(dir.path()).expect("open environment");
    (env, dir)
}

#[test]
fn put_get_round_trip_survives_reopen() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    dict.put(b"a", b"1").unwrap();
    dict.put(b"b", b"2").unwrap();
    drop(dict);

    let dict = RawDict::open(&env, None).unwrap();
    assert_eq!(dict.get(b"a").unwrap(), b"1");
    assert_eq!(dict.get(b"b").unwrap(), b"2");
}

#[test]
fn get_missing_key_is_not_found() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    assert!(matches!(dict.get(b"missing"), Err(MdbxError::NotFound)));
}

#[test]
fn empty_key_is_rejected() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    assert!(matches!(dict.put(b"", b"x"), Err(MdbxError::EmptyKey)));
    assert!(matches!(dict.get(b""), Err(MdbxError::EmptyKey)));
}

#[test]
fn get_or_falls_back_to_default() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    assert_eq!(dict.get_or(b"missing", b"fallback".to_vec()).unwrap(), b"fallback");
    dict.put(b"present", b"value").unwrap();
    assert_eq!(dict.get_or(b"present", b"fallback".to_vec()).unwrap(), b"value");
}

#[test]
fn setdefault_only_sets_once() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    assert_eq!(dict.setdefault(b"k", b"first").unwrap(), b"first");
    assert_eq!(dict.setdefault(b"k", b"second").unwrap(), b"first");
    assert_eq!(dict.get(b"k").unwrap(), b"first");
}

#[test]
fn pop_removes_and_returns() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    dict.put(b"k", b"v").unwrap();
    assert_eq!(dict.pop(b"k").unwrap(), b"v");
    assert!(matches!(dict.pop(b"k"), Err(MdbxError::NotFound)));
}

#[test]
fn popitem_drains_in_key_order() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    dict.put(b"a", b"1").unwrap();
    dict.put(b"b", b"2").unwrap();
    dict.put(b"c", b"3").unwrap();

    let mut drained = Vec::new();
    while let Ok((k, v)) = dict.popitem() {
        drained.push((k, v));
    }
    assert_eq!(
        drained,
        vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec()), (b"c".to_vec(), b"3".to_vec())]
    );
    assert!(dict.is_empty().unwrap());
}

#[test]
fn erase_range_is_half_open() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    for key in [b"a", b"b", b"c", b"d"] {
        dict.put(key, b"v").unwrap();
    }
    dict.erase(b"b", b"d").unwrap();
    let remaining = dict.noiterkeys().unwrap();
    assert_eq!(remaining, vec![b"a".to_vec(), b"d".to_vec()]);
}

#[test]
fn items_iterator_sees_a_pinned_snapshot() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    dict.put(b"a", b"1").unwrap();
    dict.put(b"b", b"2").unwrap();

    let mut iter = dict.items(false).unwrap();
    let first = iter.next().unwrap().unwrap();
    assert_eq!(first, (b"a".to_vec(), b"1".to_vec()));

    // A write after the iterator was created must not appear in it.
    dict.put(b"c", b"3").unwrap();
    let rest: Vec<_> = iter.map(Result::unwrap).collect();
    assert_eq!(rest, vec![(b"b".to_vec(), b"2".to_vec())]);
}

#[test]
fn items_reverse_order() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    for key in [b"a", b"b", b"c"] {
        dict.put(key, b"v").unwrap();
    }
    let keys: Vec<_> = dict.items(true).unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(keys, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
}

#[test]
fn remove_if_removes_matching_entries_atomically() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    for (key, value) in [(b"a", 1u8), (b"b", 2), (b"c", 3)] {
        dict.put(key, &[value]).unwrap();
    }
    let removed = dict.remove_if(|_, v| Ok(v[0] % 2 == 0)).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(dict.noiterkeys().unwrap(), vec![b"a".to_vec(), b"c".to_vec()]);
}

#[test]
fn remove_if_predicate_error_aborts_the_whole_batch() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    dict.put(b"a", b"1").unwrap();
    dict.put(b"b", b"2").unwrap();

    let result = dict.remove_if(|k, _| {
        if k == b"b" {
            return Err(MdbxError::Unsupported("boom"));
        }
        Ok(true)
    });
    assert!(result.is_err());
    // Nothing was removed: "a" would have matched before the failure.
    assert_eq!(dict.len().unwrap(), 2);
}

#[test]
fn move_to_drains_source_into_destination() {
    let (env, _dir) = env();
    let source = RawDict::open(&env, Some("src")).unwrap();
    let dest = RawDict::open(&env, Some("dst")).unwrap();
    source.put(b"a", b"1").unwrap();
    source.put(b"b", b"2").unwrap();

    source.move_to(&dest).unwrap();
    assert!(source.is_empty().unwrap());
    assert_eq!(dest.get(b"a").unwrap(), b"1");
    assert_eq!(dest.get(b"b").unwrap(), b"2");
}

#[test]
fn remove_duplicates_keeps_the_smallest_key_per_value() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    dict.put(b"a", b"same").unwrap();
    dict.put(b"b", b"same").unwrap();
    dict.put(b"c", b"different").unwrap();

    let removed = dict.remove_duplicates().unwrap();
    assert_eq!(removed, 1);
    assert_eq!(dict.noiterkeys().unwrap(), vec![b"a".to_vec(), b"c".to_vec()]);
}

#[test]
fn write_batch_is_atomic_on_failure() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    dict.put(b"existing", b"v").unwrap();

    let result: Result<(), MdbxError> = dict.write_batch(|txn| {
        txn.put(dict.database(), b"new", b"v", mdbx_containers::WriteFlags::empty())?;
        Err(MdbxError::Unsupported("simulated failure"))
    });
    assert!(result.is_err());
    assert_eq!(dict.len().unwrap(), 1);
    assert!(matches!(dict.get(b"new"), Err(MdbxError::NotFound)));
}
