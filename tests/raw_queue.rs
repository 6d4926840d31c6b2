//! End-to-end coverage of [`RawQueue`]'s FIFO ordering.

use mdbx_containers::{Environment, RawQueue};
use tempfile::TempDir;

fn env() -> (Environment, TempDir) {
    let dir = TempDir::new().unwrap();
    let env = Environment::builder().open(dir.path()).expect("open environment");
    (env, dir)
}

#[test]
fn fifo_order_is_preserved() {
    let (env, _dir) = env();
    let queue = RawQueue::open(&env, None).unwrap();
    queue.push(b"first").unwrap();
    queue.push(b"second").unwrap();
    queue.push(b"third").unwrap();

    assert_eq!(queue.pop_front().unwrap(), Some(b"first".to_vec()));
    assert_eq!(queue.pop_front().unwrap(), Some(b"second".to_vec()));
    assert_eq!(queue.pop_front().unwrap(), Some(b"third".to_vec()));
    assert_eq!(queue.pop_front().unwrap(), None);
}

#[test]
fn peek_does_not_remove() {
    let (env, _dir) = env();
    let queue = RawQueue::open(&env, None).unwrap();
    queue.push(b"only").unwrap();

    assert_eq!(queue.peek_front().unwrap(), Some(b"only".to_vec()));
    assert_eq!(queue.peek_back().unwrap(), Some(b"only".to_vec()));
    assert_eq!(queue.len().unwrap(), 1);
}

#[test]
fn survives_reopen() {
    let (env, _dir) = env();
    let queue = RawQueue::open(&env, None).unwrap();
    queue.push(b"a").unwrap();
    queue.push(b"b").unwrap();
    drop(queue);

    let queue = RawQueue::open(&env, None).unwrap();
    assert_eq!(queue.iter(false).unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
    assert_eq!(queue.iter(true).unwrap(), vec![b"b".to_vec(), b"a".to_vec()]);
}

#[test]
fn clear_empties_the_queue() {
    let (env, _dir) = env();
    let queue = RawQueue::open(&env, None).unwrap();
    queue.push(b"a").unwrap();
    queue.push(b"b").unwrap();
    queue.clear().unwrap();
    assert!(queue.is_empty().unwrap());
    assert_eq!(queue.pop_front().unwrap(), None);
}

#[test]
fn write_batch_is_atomic_across_pushes() {
    let (env, _dir) = env();
    let queue = RawQueue::open(&env, None).unwrap();

    let result: Result<(), mdbx_containers::MdbxError> = queue.write_batch(|txn| {
        txn.put(
            queue.database(),
            &0u64.to_be_bytes(),
            b"a",
            mdbx_containers::WriteFlags::empty(),
        )?;
        Err(mdbx_containers::MdbxError::Unsupported("simulated failure"))
    });
    assert!(result.is_err());
    assert!(queue.is_empty().unwrap());
}
