//! End-to-end coverage of the background bulk executor ([`crate::bulk`]).

use mdbx_containers::{Environment, MdbxError, RawDict};
use std::{thread, time::Duration};
use tempfile::TempDir;

fn env() -> (Environment, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut builder = Environment::builder();
    builder.set_max_dbs(8);
    let env = builder.open(dir.path()).expect("open environment");
    (env, dir)
}

#[test]
fn remove_if_async_runs_in_the_background_and_reports_its_count() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    for (key, value) in [(b"a", 1u8), (b"b", 2), (b"c", 3), (b"d", 4)] {
        dict.put(key, &[value]).unwrap();
    }

    let handle = dict.remove_if_async(|_, v| Ok(v[0] % 2 == 0));
    let removed = handle.wait().unwrap();

    assert_eq!(removed, 2);
    assert_eq!(dict.noiterkeys().unwrap(), vec![b"a".to_vec(), b"c".to_vec()]);
}

#[test]
fn transform_values_async_rewrites_every_value() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    dict.put(b"a", b"1").unwrap();
    dict.put(b"b", b"2").unwrap();

    let handle = dict.transform_values_async(|_, v| {
        let mut v = v.to_vec();
        v.push(b'!');
        Ok(v)
    });
    handle.wait().unwrap();

    assert_eq!(dict.get(b"a").unwrap(), b"1!");
    assert_eq!(dict.get(b"b").unwrap(), b"2!");
}

#[test]
fn move_to_async_drains_into_destination() {
    let (env, _dir) = env();
    let source = RawDict::open(&env, Some("src")).unwrap();
    let dest = RawDict::open(&env, Some("dst")).unwrap();
    source.put(b"a", b"1").unwrap();
    source.put(b"b", b"2").unwrap();

    source.move_to_async(&dest).wait().unwrap();

    assert!(source.is_empty().unwrap());
    assert_eq!(dest.get(b"a").unwrap(), b"1");
}

#[test]
fn cancel_before_completion_is_observable() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    for i in 0u32..1000 {
        dict.put(&i.to_be_bytes(), b"v").unwrap();
    }

    let handle = dict.remove_if_async(|_, _| {
        // Give the test thread a chance to call cancel() before this
        // predicate has visited every entry.
        thread::sleep(Duration::from_micros(50));
        Ok(true)
    });
    handle.cancel();

    match handle.wait() {
        Err(MdbxError::Cancelled) => {}
        // The job may have already finished (or started committing) before
        // cancel() took effect; either outcome is acceptable, a panic is not.
        Ok(_) => {}
        Err(other) => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn result_polls_without_blocking_until_finished() {
    let (env, _dir) = env();
    let dict = RawDict::open(&env, None).unwrap();
    dict.put(b"a", b"1").unwrap();

    let handle = dict.remove_duplicates_async();
    // Poll until the background job finishes; each poll must not block.
    let removed = loop {
        if let Some(result) = handle.result() {
            break result.unwrap();
        }
        thread::sleep(Duration::from_millis(1));
    };
    assert_eq!(removed, 0);
}
