//! Transaction/Cursor Broker: allocates read/write transactions on an
//! environment, enforcing writer exclusion, thread affinity and nesting.
//!
//! Read transactions never block writers and are never blocked by them.
//! Write transactions are serialized per environment by the underlying
//! engine itself: each environment owns one dedicated background thread
//! (see [`crate::sys::txn_manager`]) that performs every write-transaction
//! `begin`/`commit`/`abort` FFI call, so `mdbx_txn_begin_ex` for a new
//! top-level write transaction naturally blocks on that thread until the
//! previous one has committed or aborted — no additional Rust-level lock is
//! needed for that invariant.
//!
//! Nesting is tracked with a thread-local stack of currently open write
//! transactions, keyed by environment identity: `begin_write` on a thread
//! that already holds one for this environment opens a *nested* MDBX
//! transaction with that one as parent, rather than blocking. This is also
//! how [`WriteBatch`] widens a scope across several container operations:
//! each individual operation still calls `begin_write` for itself, but
//! transparently joins the outer batch transaction as a child instead of
//! blocking behind it.

mod batch;
mod cursor;

pub use batch::WriteBatch;
pub use cursor::Cursor;

use crate::{
    Database, Environment, MdbxError, MdbxResult,
    error::{mdbx_result_checked, poison_on_fatal},
    flags::{DatabaseFlags, WriteFlags},
    sys::txn_manager::{Abort, Commit, CommitLatencyPtr, RawTxPtr},
};
use std::{
    cell::RefCell,
    ffi::c_void,
    fmt,
    marker::PhantomData,
    ptr,
    sync::{Arc, atomic::AtomicBool, mpsc::sync_channel},
    thread::ThreadId,
};

mod private {
    pub trait Sealed {}
    impl Sealed for super::RO {}
    impl Sealed for super::RW {}
}

/// Marker trait for transaction kinds. Either [`RO`] or [`RW`].
pub trait TransactionKind: private::Sealed + Send + Sync + fmt::Debug + 'static {
    #[doc(hidden)]
    const OPEN_FLAGS: ffi::MDBX_txn_flags_t;
    #[doc(hidden)]
    const IS_READ_ONLY: bool;
}

/// Marker type for read-only transactions.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct RO;

/// Marker type for read-write transactions.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct RW;

impl TransactionKind for RO {
    const OPEN_FLAGS: ffi::MDBX_txn_flags_t = ffi::MDBX_TXN_RDONLY;
    const IS_READ_ONLY: bool = true;
}

impl TransactionKind for RW {
    const OPEN_FLAGS: ffi::MDBX_txn_flags_t = ffi::MDBX_TXN_READWRITE;
    const IS_READ_ONLY: bool = false;
}

thread_local! {
    /// Stack of (environment identity, raw txn pointer) for write
    /// transactions the *current thread* has open, outermost first. A
    /// `begin_write` call for an environment already on this stack nests
    /// under the top matching entry instead of opening a new top-level
    /// transaction.
    static OPEN_WRITES: RefCell<Vec<(usize, RawTxPtr)>> = const { RefCell::new(Vec::new()) };
}

fn env_key(env: &Environment) -> usize {
    env.env_ptr() as usize
}

/// A transaction against an [`Environment`].
///
/// Bound to the thread that created it for its entire life: every
/// operation checks the calling thread against the creating thread and
/// fails with [`MdbxError::BadTransaction`] on mismatch.
pub struct Transaction<K>
where
    K: TransactionKind,
{
    inner: Arc<TransactionInner<K>>,
}

struct TransactionInner<K>
where
    K: TransactionKind,
{
    env: Environment,
    txn: *mut ffi::MDBX_txn,
    owner: ThreadId,
    committed: AtomicBool,
    /// Whether this transaction nested under an already-open write
    /// transaction on the same thread (`RW` only; always `false` for `RO`).
    nested: bool,
    _marker: PhantomData<fn() -> K>,
}

// SAFETY: every access to `txn` is preceded by a thread-affinity check in
// `txn_execute`; cross-thread `Send` of the handle itself (e.g. moving a
// `Transaction` to another thread without using it there) is harmless.
unsafe impl<K: TransactionKind> Send for TransactionInner<K> {}
unsafe impl<K: TransactionKind> Sync for TransactionInner<K> {}

impl<K> Clone for Transaction<K>
where
    K: TransactionKind,
{
    /// Cheap: clones the `Arc` handle, not the underlying engine transaction.
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K> fmt::Debug for Transaction<K>
where
    K: TransactionKind,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("read_only", &K::IS_READ_ONLY)
            .field("nested", &self.inner.nested)
            .finish_non_exhaustive()
    }
}

impl<K> Transaction<K>
where
    K: TransactionKind,
{
    pub(crate) fn new(env: Environment) -> MdbxResult<Self> {
        if K::IS_READ_ONLY { Self::begin_ro(env) } else { Self::begin_rw(env) }
    }

    fn begin_ro(env: Environment) -> MdbxResult<Self> {
        let span = tracing::debug_span!("mdbx_txn_begin", kind = "ro");
        let _guard = span.enter();
        let txn = match Self::try_begin_ro(&env) {
            Err(e) if e.is_retryable_once() => {
                tracing::warn!(
                    "environment map resized by another process; remapping and retrying once"
                );
                env.remap()?;
                Self::try_begin_ro(&env)?
            }
            other => other?,
        };
        Ok(Self::from_raw(env, txn, false))
    }

    fn try_begin_ro(env: &Environment) -> MdbxResult<*mut ffi::MDBX_txn> {
        let mut txn: *mut ffi::MDBX_txn = ptr::null_mut();
        unsafe {
            mdbx_result_checked(
                env,
                ffi::mdbx_txn_begin_ex(
                    env.env_ptr(),
                    ptr::null_mut(),
                    K::OPEN_FLAGS,
                    &mut txn,
                    ptr::null_mut(),
                ),
            )?;
        }
        Ok(txn)
    }

    fn begin_rw(env: Environment) -> MdbxResult<Self> {
        let key = env_key(&env);
        let parent = OPEN_WRITES.with(|stack| {
            stack.borrow().iter().rev().find(|(k, _)| *k == key).map(|(_, p)| *p)
        });
        let nested = parent.is_some();
        let resolved_parent = parent.unwrap_or(RawTxPtr(ptr::null_mut()));

        let raw = match Self::send_begin_rw(&env, resolved_parent, nested) {
            Err(e) if e.is_retryable_once() => {
                tracing::warn!(
                    "environment map resized by another process; remapping and retrying once"
                );
                env.remap()?;
                Self::send_begin_rw(&env, resolved_parent, nested)?
            }
            other => other?,
        };

        OPEN_WRITES.with(|stack| stack.borrow_mut().push((key, raw)));
        Ok(Self::from_raw(env, raw.0, nested))
    }

    fn send_begin_rw(env: &Environment, parent: RawTxPtr, nested: bool) -> MdbxResult<RawTxPtr> {
        let span = tracing::debug_span!("mdbx_txn_begin", kind = "rw", nested);
        let (tx, rx) = sync_channel(0);
        env.txn_manager().send(crate::sys::txn_manager::Begin {
            parent,
            flags: K::OPEN_FLAGS,
            sender: tx,
            span,
        });
        poison_on_fatal(env, rx.recv().expect("txn manager thread gone"))
    }

    fn from_raw(env: Environment, txn: *mut ffi::MDBX_txn, nested: bool) -> Self {
        let inner = TransactionInner {
            env,
            txn,
            owner: std::thread::current().id(),
            committed: AtomicBool::new(false),
            nested,
            _marker: PhantomData,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Runs `f` with the raw transaction pointer, after checking thread
    /// affinity.
    #[inline]
    pub(crate) fn txn_execute<F, T>(&self, f: F) -> MdbxResult<T>
    where
        F: FnOnce(*mut ffi::MDBX_txn) -> T,
    {
        if std::thread::current().id() != self.inner.owner {
            return Err(MdbxError::BadTransaction);
        }
        Ok(f(self.inner.txn))
    }

    pub(crate) fn txn_ptr(&self) -> *mut ffi::MDBX_txn {
        self.inner.txn
    }

    /// The environment this transaction was begun against.
    pub fn env(&self) -> &Environment {
        &self.inner.env
    }

    /// Whether this is a nested (child) write transaction.
    pub fn is_nested(&self) -> bool {
        self.inner.nested
    }

    /// Opens the given database, creating it if this is a write transaction
    /// and it does not yet exist.
    pub fn open_db(&self, name: Option<&str>) -> MdbxResult<Database> {
        self.env().open_db(name)
    }

    /// Gets the value stored at `key`, or `None` if absent.
    pub fn get<'a>(
        &'a self,
        db: Database,
        key: &[u8],
    ) -> MdbxResult<Option<std::borrow::Cow<'a, [u8]>>> {
        let key_val =
            ffi::MDBX_val { iov_len: key.len(), iov_base: key.as_ptr() as *mut c_void };
        let mut data_val = ffi::MDBX_val { iov_len: 0, iov_base: ptr::null_mut() };
        let code = self
            .txn_execute(|txn| unsafe { ffi::mdbx_get(txn, db.dbi(), &key_val, &mut data_val) })?;
        match code {
            ffi::MDBX_SUCCESS => {
                Ok(Some(unsafe { crate::codec::decode_val(self, data_val)? }))
            }
            ffi::MDBX_NOTFOUND => Ok(None),
            other => {
                let e = MdbxError::from_err_code(other);
                if e.is_environment_fatal() {
                    self.env().poison();
                }
                Err(e)
            }
        }
    }

    /// Opens a cursor over `db` scoped to this transaction.
    ///
    /// The cursor owns a clone of this transaction handle (an `Arc` clone,
    /// not a new engine transaction), so it can be carried by value into a
    /// container's lazy iterator types.
    pub fn cursor(&self, db: Database) -> MdbxResult<Cursor<K>> {
        Cursor::new(self.clone(), db)
    }

    fn finish(self, commit: bool) -> MdbxResult<()> {
        let result = if K::IS_READ_ONLY {
            let env = self.env().clone();
            self.txn_execute(|txn| {
                mdbx_result_checked(&env, unsafe {
                    if commit {
                        ffi::mdbx_txn_commit_ex(txn, ptr::null_mut())
                    } else {
                        ffi::mdbx_txn_abort(txn)
                    }
                })
            })?
            .map(|_| ())
        } else {
            let key = env_key(self.env());
            OPEN_WRITES.with(|stack| {
                let mut stack = stack.borrow_mut();
                if let Some(pos) =
                    stack.iter().rposition(|(k, p)| *k == key && p.0 == self.txn_ptr())
                {
                    stack.remove(pos);
                }
            });

            let (tx, rx) = sync_channel(0);
            let raw = RawTxPtr(self.txn_ptr());
            if commit {
                self.env().txn_manager().send(Commit {
                    tx: raw,
                    latency: CommitLatencyPtr(ptr::null_mut()),
                    sender: tx,
                    span: tracing::debug_span!("mdbx_txn_commit"),
                });
            } else {
                self.env().txn_manager().send(Abort {
                    tx: raw,
                    sender: tx,
                    span: tracing::debug_span!("mdbx_txn_abort"),
                });
            }
            poison_on_fatal(self.env(), rx.recv().expect("txn manager thread gone")).map(|_| ())
        };
        self.inner.committed.store(true, std::sync::atomic::Ordering::SeqCst);
        result
    }

    /// Commits the transaction.
    pub fn commit(self) -> MdbxResult<()> {
        self.finish(true)
    }

    /// Aborts the transaction, discarding its writes (or, for a nested
    /// transaction, only the writes made since it began).
    pub fn abort(self) {
        let _ = self.finish(false);
    }
}

impl Transaction<RW> {
    /// Stores `value` at `key`, subject to `flags`.
    pub fn put(
        &self,
        db: Database,
        key: &[u8],
        value: &[u8],
        flags: WriteFlags,
    ) -> MdbxResult<()> {
        let key_val =
            ffi::MDBX_val { iov_len: key.len(), iov_base: key.as_ptr() as *mut c_void };
        let mut data_val =
            ffi::MDBX_val { iov_len: value.len(), iov_base: value.as_ptr() as *mut c_void };
        mdbx_result_checked(self.env(), self.txn_execute(|txn| unsafe {
            ffi::mdbx_put(txn, db.dbi(), &key_val, &mut data_val, flags.bits())
        })?)?;
        Ok(())
    }

    /// Deletes `key` (and, if given, only the matching `value`). Returns
    /// whether an entry was actually removed.
    pub fn del(&self, db: Database, key: &[u8], value: Option<&[u8]>) -> MdbxResult<bool> {
        let key_val =
            ffi::MDBX_val { iov_len: key.len(), iov_base: key.as_ptr() as *mut c_void };
        let data_val = value.map(|v| ffi::MDBX_val {
            iov_len: v.len(),
            iov_base: v.as_ptr() as *mut c_void,
        });
        let result = mdbx_result_checked(self.env(), self.txn_execute(|txn| unsafe {
            let ptr = data_val.as_ref().map_or(ptr::null(), |d| d as *const ffi::MDBX_val);
            ffi::mdbx_del(txn, db.dbi(), &key_val, ptr)
        })?);
        match result {
            Ok(_) => Ok(true),
            Err(MdbxError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Removes every entry from `db`.
    pub fn clear_db(&self, db: Database) -> MdbxResult<()> {
        mdbx_result_checked(self.env(), self.txn_execute(|txn| unsafe {
            ffi::mdbx_drop(txn, db.dbi(), false)
        })?)?;
        Ok(())
    }

    /// Creates `db` if it does not already exist, applying `extra_flags`.
    pub fn create_db(
        &self,
        name: Option<&str>,
        extra_flags: DatabaseFlags,
    ) -> MdbxResult<Database> {
        let db = self.txn_execute(|txn| {
            crate::env::open_dbi(txn, name, extra_flags | DatabaseFlags::CREATE)
        })?;
        poison_on_fatal(self.env(), db)
    }
}

impl<K> Drop for TransactionInner<K>
where
    K: TransactionKind,
{
    fn drop(&mut self) {
        if self.committed.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        if std::thread::current().id() != self.owner {
            // Cannot safely touch a transaction from a foreign thread; the
            // engine will reclaim it when the environment closes.
            return;
        }
        if K::IS_READ_ONLY {
            unsafe {
                ffi::mdbx_txn_abort(self.txn);
            }
        } else {
            let key = self.env.env_ptr() as usize;
            OPEN_WRITES.with(|stack| {
                let mut stack = stack.borrow_mut();
                if let Some(pos) = stack.iter().rposition(|(k, p)| *k == key && p.0 == self.txn) {
                    stack.remove(pos);
                }
            });
            let (tx, rx) = sync_channel(0);
            self.env.txn_manager().send(Abort {
                tx: RawTxPtr(self.txn),
                sender: tx,
                span: tracing::debug_span!("mdbx_txn_abort_on_drop"),
            });
            let _ = rx.recv();
        }
    }
}
