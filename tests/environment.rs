//! Coverage of the environment registry and `make_temp`.

use mdbx_containers::{Environment, MdbxError};
use tempfile::TempDir;

#[test]
fn open_shared_deduplicates_by_canonical_path() {
    let dir = TempDir::new().unwrap();
    let a = Environment::open_shared(dir.path(), Environment::builder()).unwrap();
    let b = Environment::open_shared(dir.path(), Environment::builder()).unwrap();

    // Both handles observe writes made through the other: same underlying
    // environment, not two independent opens of the same files.
    let dict_a = mdbx_containers::RawDict::open(&a, None).unwrap();
    dict_a.put(b"k", b"v").unwrap();
    let dict_b = mdbx_containers::RawDict::open(&b, None).unwrap();
    assert_eq!(dict_b.get(b"k").unwrap(), b"v");
}

#[test]
fn open_shared_strict_rejects_mismatched_options() {
    let dir = TempDir::new().unwrap();
    let _a = Environment::open_shared(dir.path(), Environment::builder()).unwrap();

    let mut mismatched = Environment::builder();
    mismatched.set_max_dbs(64);
    let result = Environment::open_shared_strict(dir.path(), mismatched);
    assert!(matches!(result, Err(MdbxError::AlreadyOpenWithDifferentOptions)));
}

#[test]
fn make_temp_without_destroy_leaves_directory_on_disk() {
    let env = Environment::make_temp(&Environment::builder(), false).unwrap();
    let path = env.path().to_path_buf();
    drop(env);
    assert!(path.exists());
    let _ = std::fs::remove_dir_all(&path);
}

#[test]
fn make_temp_with_destroy_removes_directory_on_drop() {
    let env = Environment::make_temp(&Environment::builder(), true).unwrap();
    let path = env.path().to_path_buf();
    drop(env);
    assert!(!path.exists());
}
