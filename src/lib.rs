#![doc = include_str!("../README.md")]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/paradigmxyz/reth/main/assets/reth-docs.png",
    html_favicon_url = "https://avatars0.githubusercontent.com/u/97369466?s=256",
    issue_tracker_base_url = "https://github.com/init4tech/mdbx-containers/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![allow(missing_docs, clippy::needless_pass_by_ref_mut)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::borrow_as_ptr)]

/// The raw MDBX FFI bindings this crate is built on.
pub extern crate libmdbx_sys as ffi;

mod codec;

pub mod env;
pub use env::{
    AlreadyOpenPolicy, Database, Environment, EnvironmentBuilder, Geometry, Info, PageSize, Stat,
};

mod error;
pub use error::{CallbackError, MdbxError, MdbxResult};

mod flags;
pub use flags::{DatabaseFlags, EnvironmentFlags, Mode, SyncMode, WriteFlags};

pub mod txn;
pub use txn::{Cursor, RO, RW, Transaction, TransactionKind, WriteBatch};

pub mod transform;
pub use transform::{Compressor, Serializer, Signer, TransformChain};

pub mod container;
pub use container::{CookedDict, CookedQueue, Iter, RawDict, RawQueue};

pub mod bulk;
pub use bulk::BulkHandle;

pub mod logger;

mod sys;

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    /// Opening an environment and round-tripping a single key/value through
    /// a raw dict must survive the dict handle being dropped and reopened
    /// against the same environment.
    #[test]
    fn smoke_open_put_get() {
        let dir = tempdir().unwrap();
        let env = {
            let mut builder = Environment::builder();
            builder.set_max_dbs(4);
            builder.open(dir.path()).expect("open mdbx env")
        };

        let dict = RawDict::open(&env, None).expect("open raw dict");
        dict.put(b"height", b"1000").expect("put");
        assert_eq!(dict.get(b"height").unwrap(), b"1000");

        drop(dict);
        let dict = RawDict::open(&env, None).expect("reopen raw dict");
        assert_eq!(dict.get(b"height").unwrap(), b"1000");
    }
}
