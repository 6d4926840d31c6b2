//! Named Database Handle: binds a sub-database name inside an environment
//! and caches its integer descriptor.

use crate::{
    MdbxError, MdbxResult,
    error::mdbx_result,
    flags::DatabaseFlags,
};
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::{
    ffi::{CStr, c_uint},
    hash::{Hash, Hasher},
};

/// A handle to a named database inside an [`crate::Environment`].
///
/// Cheap to copy; the integer descriptor (`dbi`) stays valid for the life of
/// the environment once opened, regardless of which transaction opened it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Database {
    dbi: ffi::MDBX_dbi,
    flags: DatabaseFlags,
}

impl Database {
    pub(crate) const fn new(dbi: ffi::MDBX_dbi, flags: DatabaseFlags) -> Self {
        Self { dbi, flags }
    }

    pub(crate) const fn dbi(&self) -> ffi::MDBX_dbi {
        self.dbi
    }

    /// The flags this database was opened with.
    pub const fn flags(&self) -> DatabaseFlags {
        self.flags
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedDb {
    name_hash: u64,
    db: Database,
}

/// Environment-wide cache of opened database handles, keyed by hash of name.
///
/// Shared across every transaction on the environment rather than kept
/// per-transaction, since a Named Database Handle's lifetime is tied to the
/// environment (spec: "Its lifecycle is tied to the environment"), not to
/// any single transaction.
#[derive(Debug, Default)]
pub(crate) struct DbCache {
    entries: RwLock<SmallVec<[CachedDb; 16]>>,
}

impl DbCache {
    pub(crate) fn get(&self, name_hash: u64) -> Option<Database> {
        self.entries.read().iter().find(|e| e.name_hash == name_hash).map(|e| e.db)
    }

    pub(crate) fn insert(&self, name_hash: u64, db: Database) {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.name_hash == name_hash) {
            return;
        }
        entries.push(CachedDb { name_hash, db });
    }
}

pub(crate) fn hash_name(name: Option<&str>) -> u64 {
    let mut hasher = std::hash::DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

/// Opens (creating if necessary and permitted) the dbi for `name` against a
/// raw transaction pointer, returning its flags as actually applied.
pub(crate) fn open_dbi(
    txn_ptr: *mut ffi::MDBX_txn,
    name: Option<&str>,
    extra_flags: DatabaseFlags,
) -> MdbxResult<Database> {
    let mut c_name_buf = SmallVec::<[u8; 32]>::new();
    let c_name = name.map(|n| {
        c_name_buf.extend_from_slice(n.as_bytes());
        c_name_buf.push(0);
        CStr::from_bytes_with_nul(&c_name_buf).expect("no interior nul")
    });
    let name_ptr = c_name.as_ref().map_or(std::ptr::null(), |s| s.as_ptr());

    let mut dbi: ffi::MDBX_dbi = 0;
    mdbx_result(unsafe { ffi::mdbx_dbi_open(txn_ptr, name_ptr, extra_flags.bits(), &mut dbi) })?;

    let mut actual_flags: c_uint = 0;
    let mut _state: c_uint = 0;
    mdbx_result(unsafe { ffi::mdbx_dbi_flags_ex(txn_ptr, dbi, &mut actual_flags, &mut _state) })?;
    #[cfg_attr(not(windows), allow(clippy::useless_conversion))]
    let flags = DatabaseFlags::from_bits_truncate(
        actual_flags.try_into().map_err(|_| MdbxError::BadDbi)?,
    );
    Ok(Database::new(dbi, flags))
}
