//! Decoding of raw engine values into `Cow<[u8]>`.
//!
//! Read-write transactions may return pointers into pages the writer has
//! already dirtied in this transaction; those must be copied rather than
//! borrowed, since the underlying bytes can be rewritten before the
//! transaction commits. Read-only transactions never dirty pages, so they
//! can always borrow.

use crate::{MdbxResult, Transaction, TransactionKind};
use std::{borrow::Cow, slice};

/// Decode a raw `MDBX_val` into a `Cow<[u8]>`, copying only when the
/// transaction may have dirtied the backing page.
///
/// # Safety
/// `val` must come from a successful engine read against `txn`, and must not
/// be used after `txn` ends.
pub(crate) unsafe fn decode_val<'a, K: TransactionKind>(
    txn: &'a Transaction<K>,
    val: ffi::MDBX_val,
) -> MdbxResult<Cow<'a, [u8]>> {
    let bytes = unsafe { slice::from_raw_parts(val.iov_base as *const u8, val.iov_len) };

    if K::IS_READ_ONLY {
        return Ok(Cow::Borrowed(bytes));
    }

    let is_dirty = unsafe { ffi::mdbx_is_dirty(txn.txn_ptr(), val.iov_base) } == ffi::MDBX_RESULT_TRUE;
    Ok(if is_dirty { Cow::Owned(bytes.to_vec()) } else { Cow::Borrowed(bytes) })
}
