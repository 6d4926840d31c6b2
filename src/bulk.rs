//! Async Bulk Executor: a background worker pool for the long-running bulk
//! container operations (`remove_if`, `transform_values`,
//! `remove_duplicates`, `move_to`), exposed as cancellable, pollable
//! [`BulkHandle`]s instead of blocking the caller's thread.
//!
//! Each submitted job holds only a [`Weak`] reference to the target dict
//! (via [`RawDict::alive_weak`]), not a clone of the [`RawDict`] itself: it
//! upgrades that weak handle at its next per-entry boundary, and if every
//! clone the caller held has since been dropped, treats that exactly like
//! an explicit [`BulkHandle::cancel`] — the open write transaction is
//! aborted and the job reports [`MdbxError::Cancelled`] instead of running
//! a bulk operation to completion for a container nobody can observe
//! anymore.
//!
//! Each submitted job owns its own write transaction for its entire life
//! (MDBX write transactions must commit/abort from the thread that began
//! them — the same reason [`crate::sys::txn_manager`] dedicates a thread to
//! the job), and checks both the cancellation flag and dict liveness between
//! entries.

use crate::{
    Database, Environment, MdbxError, MdbxResult,
    container::RawDict,
    flags::WriteFlags,
    txn::write_batch,
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::{
    collections::HashSet,
    sync::{
        Arc, OnceLock, Weak,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Pool {
    sender: mpsc::Sender<Job>,
}

static POOL: OnceLock<Pool> = OnceLock::new();

fn pool() -> &'static Pool {
    POOL.get_or_init(|| {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let workers = std::thread::available_parallelism().map_or(4, |n| n.get());
        for i in 0..workers {
            let rx = Arc::clone(&rx);
            std::thread::Builder::new()
                .name(format!("mdbx-bulk-{i}"))
                .spawn(move || {
                    loop {
                        let job = rx.lock().recv();
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    }
                })
                .expect("failed to spawn bulk executor worker");
        }
        Pool { sender: tx }
    })
}

/// Shared cooperative-cancellation flag between a [`BulkHandle`] and its
/// worker. Checked at per-entry boundaries, never preemptively.
#[derive(Clone, Default)]
struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A handle to a bulk operation running on the background pool.
///
/// The result can only be observed once, by either [`BulkHandle::wait`] or a
/// successful [`BulkHandle::result`] poll — whichever consumes it first.
/// [`BulkHandle::cancel`] may be called any number of times and from any
/// thread.
pub struct BulkHandle<T> {
    cancel: CancelFlag,
    rx: Mutex<Option<mpsc::Receiver<MdbxResult<T>>>>,
}

impl<T: Send + 'static> BulkHandle<T> {
    fn spawn(job: impl FnOnce(&CancelFlag) -> MdbxResult<T> + Send + 'static) -> Self {
        let cancel = CancelFlag::default();
        let (tx, rx) = mpsc::channel();
        let cancel_for_job = cancel.clone();
        pool().sender.send(Box::new(move || {
            let _ = tx.send(job(&cancel_for_job));
        })).expect("bulk executor pool gone");
        Self { cancel, rx: Mutex::new(Some(rx)) }
    }

    /// Blocks until the operation finishes, returning its result.
    pub fn wait(&self) -> MdbxResult<T> {
        match self.rx.lock().take() {
            Some(rx) => rx.recv().unwrap_or(Err(MdbxError::Cancelled)),
            None => Err(MdbxError::Cancelled),
        }
    }

    /// Returns the result without blocking, if the operation has already
    /// finished; `None` if it is still running.
    pub fn result(&self) -> Option<MdbxResult<T>> {
        let mut guard = self.rx.lock();
        let rx = guard.as_ref()?;
        match rx.try_recv() {
            Ok(result) => {
                *guard = None;
                Some(result)
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                *guard = None;
                Some(Err(MdbxError::Cancelled))
            }
        }
    }

    /// Requests cancellation. Takes effect at the worker's next per-entry
    /// boundary, aborting its open write transaction.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// One dict's worth of state a bulk job needs, captured without keeping the
/// caller's [`RawDict`] (and thus its `alive` marker) alive itself.
struct Target {
    env: Environment,
    db: Database,
    alive: Weak<()>,
}

impl Target {
    fn new(dict: &RawDict) -> Self {
        Self { env: dict.env().clone(), db: dict.database(), alive: dict.alive_weak() }
    }
}

/// Fails with [`MdbxError::Cancelled`] if either the explicit cancel flag is
/// set, or every clone of the originating dict the caller held has been
/// dropped (its `alive` marker no longer upgrades).
fn check_continue(cancel: &CancelFlag, alive: &Weak<()>) -> MdbxResult<()> {
    if cancel.is_cancelled() || alive.upgrade().is_none() {
        Err(MdbxError::Cancelled)
    } else {
        Ok(())
    }
}

/// Background variant of [`RawDict::remove_if`].
pub fn remove_if_async(
    dict: &RawDict,
    mut predicate: impl FnMut(&[u8], &[u8]) -> MdbxResult<bool> + Send + 'static,
) -> BulkHandle<usize> {
    let target = Target::new(dict);
    BulkHandle::spawn(move |cancel| {
        check_continue(cancel, &target.alive)?;
        write_batch(&target.env, |txn| {
            let mut doomed = Vec::new();
            {
                let mut cursor = txn.cursor(target.db)?;
                let mut entry = cursor.first()?;
                while let Some((k, v)) = entry {
                    check_continue(cancel, &target.alive)?;
                    if predicate(&k, &v)? {
                        doomed.push(k.into_owned());
                    }
                    entry = cursor.next()?;
                }
            }
            for key in &doomed {
                check_continue(cancel, &target.alive)?;
                txn.del(target.db, key, None)?;
            }
            Ok(doomed.len())
        })
    })
}

/// Background variant of [`RawDict::transform_values`].
pub fn transform_values_async(
    dict: &RawDict,
    mut f: impl FnMut(&[u8], &[u8]) -> MdbxResult<Vec<u8>> + Send + 'static,
) -> BulkHandle<()> {
    let target = Target::new(dict);
    BulkHandle::spawn(move |cancel| {
        check_continue(cancel, &target.alive)?;
        write_batch(&target.env, |txn| {
            let mut updates = Vec::new();
            {
                let mut cursor = txn.cursor(target.db)?;
                let mut entry = cursor.first()?;
                while let Some((k, v)) = entry {
                    check_continue(cancel, &target.alive)?;
                    let new_value = f(&k, &v)?;
                    if new_value != *v {
                        updates.push((k.into_owned(), new_value));
                    }
                    entry = cursor.next()?;
                }
            }
            for (key, value) in &updates {
                check_continue(cancel, &target.alive)?;
                txn.put(target.db, key, value, WriteFlags::empty())?;
            }
            Ok(())
        })
    })
}

/// Background variant of [`RawDict::remove_duplicates`].
pub fn remove_duplicates_async(dict: &RawDict) -> BulkHandle<usize> {
    let target = Target::new(dict);
    BulkHandle::spawn(move |cancel| {
        check_continue(cancel, &target.alive)?;
        write_batch(&target.env, |txn| {
            let mut seen: HashSet<[u8; 32]> = HashSet::new();
            let mut doomed = Vec::new();
            {
                let mut cursor = txn.cursor(target.db)?;
                let mut entry = cursor.first()?;
                while let Some((k, v)) = entry {
                    check_continue(cancel, &target.alive)?;
                    let fingerprint: [u8; 32] = Sha256::digest(&v).into();
                    if !seen.insert(fingerprint) {
                        doomed.push(k.into_owned());
                    }
                    entry = cursor.next()?;
                }
            }
            for key in &doomed {
                check_continue(cancel, &target.alive)?;
                txn.del(target.db, key, None)?;
            }
            Ok(doomed.len())
        })
    })
}

/// Background variant of [`RawDict::move_to`].
pub fn move_to_async(source: &RawDict, dest: &RawDict) -> BulkHandle<()> {
    let source_target = Target::new(source);
    let dest_target = Target::new(dest);
    BulkHandle::spawn(move |cancel| {
        check_continue(cancel, &source_target.alive)?;
        if source_target.env.env_ptr() == dest_target.env.env_ptr() {
            return write_batch(&source_target.env, |txn| {
                let entries = {
                    let mut cursor = txn.cursor(source_target.db)?;
                    let mut out = Vec::new();
                    let mut entry = cursor.first()?;
                    while let Some((k, v)) = entry {
                        check_continue(cancel, &source_target.alive)?;
                        out.push((k.into_owned(), v.into_owned()));
                        entry = cursor.next()?;
                    }
                    out
                };
                for (key, value) in &entries {
                    check_continue(cancel, &source_target.alive)?;
                    txn.put(dest_target.db, key, value, WriteFlags::empty())?;
                }
                for (key, _) in &entries {
                    check_continue(cancel, &source_target.alive)?;
                    txn.del(source_target.db, key, None)?;
                }
                Ok(())
            });
        }

        let entries = {
            let txn = source_target.env.begin_ro_txn()?;
            let mut cursor = txn.cursor(source_target.db)?;
            let mut out = Vec::new();
            let mut entry = cursor.first()?;
            while let Some((k, v)) = entry {
                out.push((k.into_owned(), v.into_owned()));
                entry = cursor.next()?;
            }
            drop(cursor);
            txn.abort();
            out
        };
        for (key, value) in &entries {
            check_continue(cancel, &source_target.alive)?;
            write_batch(&dest_target.env, |txn| {
                txn.put(dest_target.db, key, value, WriteFlags::empty())
            })?;
        }
        check_continue(cancel, &source_target.alive)?;
        write_batch(&source_target.env, |txn| txn.clear_db(source_target.db))
    })
}
