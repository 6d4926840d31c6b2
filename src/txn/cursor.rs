//! Cursor: a positioned iterator inside a transaction over one named
//! database.
//!
//! Owns a clone of its transaction handle (cheap: an `Arc` clone of the
//! same underlying engine transaction, not a new one) rather than
//! borrowing it, so cursors can be carried by value into the container
//! layer's lazy iterator types.

use super::{Transaction, TransactionKind};
use crate::{
    Database, MdbxError, MdbxResult,
    error::mdbx_result_checked,
    flags::WriteFlags,
};
use std::{borrow::Cow, ffi::c_void, ptr};

/// A cursor positioned over a database, scoped to transaction `K`.
pub struct Cursor<K>
where
    K: TransactionKind,
{
    txn: Transaction<K>,
    cursor: *mut ffi::MDBX_cursor,
    db: Database,
}

impl<K> Cursor<K>
where
    K: TransactionKind,
{
    pub(crate) fn new(txn: Transaction<K>, db: Database) -> MdbxResult<Self> {
        let mut cursor: *mut ffi::MDBX_cursor = ptr::null_mut();
        let opened = txn.txn_execute(|txn_ptr| unsafe {
            ffi::mdbx_cursor_open(txn_ptr, db.dbi(), &mut cursor)
        })?;
        mdbx_result_checked(txn.env(), opened)?;
        Ok(Self { txn, cursor, db })
    }

    /// The database this cursor is positioned over.
    pub fn database(&self) -> Database {
        self.db
    }

    fn op(&self, op: ffi::MDBX_cursor_op) -> MdbxResult<Option<(Cow<'_, [u8]>, Cow<'_, [u8]>)>> {
        let mut key_val = ffi::MDBX_val { iov_len: 0, iov_base: ptr::null_mut() };
        let mut data_val = ffi::MDBX_val { iov_len: 0, iov_base: ptr::null_mut() };
        let cursor = self.cursor;
        let code = self
            .txn
            .txn_execute(|_| unsafe { ffi::mdbx_cursor_get(cursor, &mut key_val, &mut data_val, op) })?;
        if !found_or_poison(self.txn.env(), code)? {
            return Ok(None);
        }
        let key = unsafe { crate::codec::decode_val(&self.txn, key_val)? };
        let value = unsafe { crate::codec::decode_val(&self.txn, data_val)? };
        Ok(Some((key, value)))
    }

    /// Positions at the first key in the database.
    pub fn first(&mut self) -> MdbxResult<Option<(Cow<'_, [u8]>, Cow<'_, [u8]>)>> {
        self.op(ffi::MDBX_FIRST)
    }

    /// Positions at the last key in the database.
    pub fn last(&mut self) -> MdbxResult<Option<(Cow<'_, [u8]>, Cow<'_, [u8]>)>> {
        self.op(ffi::MDBX_LAST)
    }

    /// Advances to the next key.
    pub fn next(&mut self) -> MdbxResult<Option<(Cow<'_, [u8]>, Cow<'_, [u8]>)>> {
        self.op(ffi::MDBX_NEXT)
    }

    /// Moves to the previous key.
    pub fn prev(&mut self) -> MdbxResult<Option<(Cow<'_, [u8]>, Cow<'_, [u8]>)>> {
        self.op(ffi::MDBX_PREV)
    }

    /// Returns the item at the current position without moving, or `None`
    /// if the cursor is not positioned on an entry.
    pub fn get_current(&self) -> MdbxResult<Option<(Cow<'_, [u8]>, Cow<'_, [u8]>)>> {
        self.op(ffi::MDBX_GET_CURRENT)
    }

    /// Positions exactly at `key`, returning its value, or `None` if absent.
    pub fn set(&mut self, key: &[u8]) -> MdbxResult<Option<Cow<'_, [u8]>>> {
        let mut key_val =
            ffi::MDBX_val { iov_len: key.len(), iov_base: key.as_ptr() as *mut c_void };
        let mut data_val = ffi::MDBX_val { iov_len: 0, iov_base: ptr::null_mut() };
        let cursor = self.cursor;
        let code = self.txn.txn_execute(|_| unsafe {
            ffi::mdbx_cursor_get(cursor, &mut key_val, &mut data_val, ffi::MDBX_SET_KEY)
        })?;
        if !found_or_poison(self.txn.env(), code)? {
            return Ok(None);
        }
        Ok(Some(unsafe { crate::codec::decode_val(&self.txn, data_val)? }))
    }

    /// Positions at the smallest key greater than or equal to `key`
    /// (`MDBX_SET_RANGE`).
    pub fn set_range(&mut self, key: &[u8]) -> MdbxResult<Option<(Cow<'_, [u8]>, Cow<'_, [u8]>)>> {
        let mut key_val =
            ffi::MDBX_val { iov_len: key.len(), iov_base: key.as_ptr() as *mut c_void };
        let mut data_val = ffi::MDBX_val { iov_len: 0, iov_base: ptr::null_mut() };
        let cursor = self.cursor;
        let code = self.txn.txn_execute(|_| unsafe {
            ffi::mdbx_cursor_get(cursor, &mut key_val, &mut data_val, ffi::MDBX_SET_RANGE)
        })?;
        if !found_or_poison(self.txn.env(), code)? {
            return Ok(None);
        }
        let key = unsafe { crate::codec::decode_val(&self.txn, key_val)? };
        let value = unsafe { crate::codec::decode_val(&self.txn, data_val)? };
        Ok(Some((key, value)))
    }
}

/// `MDBX_SUCCESS` -> found, `MDBX_NOTFOUND` -> absent, anything else ->
/// poison `env` if it is one of the fatal kinds, then propagate.
fn found_or_poison(env: &crate::Environment, code: i32) -> MdbxResult<bool> {
    match code {
        ffi::MDBX_SUCCESS => Ok(true),
        ffi::MDBX_NOTFOUND => Ok(false),
        other => {
            let e = MdbxError::from_err_code(other);
            if e.is_environment_fatal() {
                env.poison();
            }
            Err(e)
        }
    }
}

impl Cursor<super::RW> {
    /// Stores `value` at `key` through this cursor.
    pub fn put(&mut self, key: &[u8], value: &[u8], flags: WriteFlags) -> MdbxResult<()> {
        let key_val =
            ffi::MDBX_val { iov_len: key.len(), iov_base: key.as_ptr() as *mut c_void };
        let mut data_val =
            ffi::MDBX_val { iov_len: value.len(), iov_base: value.as_ptr() as *mut c_void };
        let cursor = self.cursor;
        mdbx_result_checked(self.txn.env(), self.txn.txn_execute(|_| unsafe {
            ffi::mdbx_cursor_put(cursor, &key_val, &mut data_val, flags.bits())
        })?)?;
        Ok(())
    }

    /// Deletes the entry at the current cursor position.
    pub fn del(&mut self) -> MdbxResult<()> {
        let cursor = self.cursor;
        let result = mdbx_result_checked(
            self.txn.env(),
            self.txn.txn_execute(|_| unsafe { ffi::mdbx_cursor_del(cursor, 0) })?,
        );
        match result {
            Ok(_) => Ok(()),
            Err(MdbxError::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl<K> Drop for Cursor<K>
where
    K: TransactionKind,
{
    fn drop(&mut self) {
        if self.txn.txn_execute(|_| ()).is_ok() {
            unsafe {
                ffi::mdbx_cursor_close(self.cursor);
            }
        }
    }
}
