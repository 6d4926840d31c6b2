//! Environment: one open instance of the underlying memory-mapped store at
//! a filesystem path.
//!
//! See also [`crate::env::registry`] for the process-wide deduplicating
//! registry layered on top of the plain [`Environment::builder`] API.

mod database;
mod registry;
pub use database::Database;
pub(crate) use database::open_dbi;
pub use registry::AlreadyOpenPolicy;
pub(crate) use registry::REGISTRY;

use crate::{
    MdbxError, MdbxResult,
    error::{mdbx_result, mdbx_result_checked, poison_on_fatal},
    flags::{DatabaseFlags, EnvironmentFlags},
    sys::EnvPtr,
    sys::txn_manager::{LifecycleHandle, RwSyncLifecycle},
};
use database::DbCache;
use std::{
    ffi::CString,
    fs, mem,
    ops::{Bound, RangeBounds},
    path::{Path, PathBuf},
    ptr,
    sync::Arc,
};

/// Database page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    /// Use the smallest page size the engine accepts.
    MinimalAcceptable,
    /// Use an explicit page size in bytes (must be a supported power of two).
    Set(usize),
}

/// Map-size geometry, generic over the range type used for `size` so
/// callers can supply either a bounded (`a..b`) or open-ended (`a..`)
/// range without an extra conversion step.
#[derive(Debug, Clone)]
pub struct Geometry<R = std::ops::Range<u64>> {
    /// Lower/upper bound the map may grow within.
    pub size: Option<R>,
    /// Step size in bytes when growing the map.
    pub growth_step: Option<i64>,
    /// Threshold in bytes below which the map is shrunk back.
    pub shrink_threshold: Option<i64>,
    /// Page size to use; `None` leaves it at the engine default.
    pub page_size: Option<PageSize>,
}

impl<R> Default for Geometry<R> {
    fn default() -> Self {
        Self { size: None, growth_step: None, shrink_threshold: None, page_size: None }
    }
}

fn range_to_isize_bounds<R: RangeBounds<u64>>(r: &R) -> (isize, isize) {
    let lower = match r.start_bound() {
        Bound::Included(v) => *v as isize,
        Bound::Excluded(v) => *v as isize + 1,
        Bound::Unbounded => -1,
    };
    let upper = match r.end_bound() {
        Bound::Included(v) => *v as isize,
        Bound::Excluded(v) => *v as isize,
        Bound::Unbounded => -1,
    };
    (lower, upper)
}

/// Builds an [`Environment`].
#[derive(Debug, Clone)]
pub struct EnvironmentBuilder {
    flags: EnvironmentFlags,
    max_readers: Option<u64>,
    max_dbs: Option<u64>,
    geometry_size: Option<(isize, isize)>,
    geometry_growth_step: Option<i64>,
    geometry_shrink_threshold: Option<i64>,
    geometry_page_size: Option<PageSize>,
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self {
            flags: EnvironmentFlags::default(),
            max_readers: None,
            max_dbs: None,
            geometry_size: None,
            geometry_growth_step: None,
            geometry_shrink_threshold: None,
            geometry_page_size: None,
        }
    }
}

impl EnvironmentBuilder {
    /// Sets the raw environment flags.
    pub fn set_flags(&mut self, flags: EnvironmentFlags) -> &mut Self {
        self.flags = flags;
        self
    }

    /// Sets the maximum number of concurrent reader slots.
    pub fn set_max_readers(&mut self, max_readers: u64) -> &mut Self {
        self.max_readers = Some(max_readers);
        self
    }

    /// Sets the maximum number of named sub-databases.
    pub fn set_max_dbs(&mut self, max_dbs: usize) -> &mut Self {
        self.max_dbs = Some(max_dbs as u64);
        self
    }

    /// Sets the map-size geometry.
    pub fn set_geometry<R: RangeBounds<u64>>(&mut self, geometry: Geometry<R>) -> &mut Self {
        self.geometry_size = geometry.size.as_ref().map(range_to_isize_bounds);
        self.geometry_growth_step = geometry.growth_step;
        self.geometry_shrink_threshold = geometry.shrink_threshold;
        self.geometry_page_size = geometry.page_size;
        self
    }

    /// Opens an environment at `path` directly, bypassing the process-wide
    /// registry (each call produces an independent handle, even for the
    /// same path).
    pub fn open(&self, path: impl AsRef<Path>) -> MdbxResult<Environment> {
        Environment::open_with_builder(path.as_ref(), self)
    }
}

/// One open instance of the underlying memory-mapped store at a filesystem
/// path.
///
/// Cheaply cloneable; clones share the same underlying engine handle and
/// writer-serialization state. The environment is closed when the last
/// clone is dropped.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

pub(crate) struct EnvironmentInner {
    env: EnvPtr,
    path: PathBuf,
    flags: EnvironmentFlags,
    txn_manager: LifecycleHandle,
    /// Set when the engine reports the environment as unusable
    /// (`Corrupted`/`Panic`/`VersionMismatch`); subsequent operations fail
    /// fast rather than re-entering the engine.
    poisoned: std::sync::atomic::AtomicBool,
    /// When set, the directory at `path` is removed once the last handle
    /// drops (see `Environment::make_temp`).
    destroy_on_drop: bool,
    /// Named database handles opened against this environment, cached for
    /// the environment's whole lifetime (spec: Named Database Handle
    /// lifecycle is tied to the environment, not to a transaction).
    db_cache: DbCache,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment").field("path", &self.inner.path).finish_non_exhaustive()
    }
}

impl Environment {
    /// Returns a new builder with engine defaults.
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    fn open_with_builder(path: &Path, builder: &EnvironmentBuilder) -> MdbxResult<Self> {
        Self::open_with_builder_destroy(path, builder, false)
    }

    fn open_with_builder_destroy(
        path: &Path,
        builder: &EnvironmentBuilder,
        destroy_on_drop: bool,
    ) -> MdbxResult<Self> {
        if !builder.flags.no_sub_dir {
            fs::create_dir_all(path)?;
        }
        let c_path = path_to_cstring(path)?;

        let mut env: *mut ffi::MDBX_env = ptr::null_mut();
        let span = tracing::debug_span!("mdbx_env_open", path = %path.display());
        let _guard = span.enter();
        unsafe {
            mdbx_result(ffi::mdbx_env_create(&mut env))?;
        }

        let result: MdbxResult<()> = (|| unsafe {
            if let Some(max_readers) = builder.max_readers {
                mdbx_result(ffi::mdbx_env_set_option(
                    env,
                    ffi::MDBX_opt_max_readers,
                    max_readers,
                ))?;
            }
            if let Some(max_dbs) = builder.max_dbs {
                mdbx_result(ffi::mdbx_env_set_option(env, ffi::MDBX_opt_max_db, max_dbs))?;
            }
            let (size_lower, size_upper) = builder.geometry_size.unwrap_or((-1, -1));
            let growth_step = builder.geometry_growth_step.unwrap_or(-1) as isize;
            let shrink_threshold = builder.geometry_shrink_threshold.unwrap_or(-1) as isize;
            let page_size = match builder.geometry_page_size {
                Some(PageSize::Set(n)) => n as isize,
                Some(PageSize::MinimalAcceptable) => -1,
                None => -1,
            };
            mdbx_result(ffi::mdbx_env_set_geometry(
                env,
                size_lower,
                size_lower.max(0),
                size_upper,
                growth_step,
                shrink_threshold,
                page_size,
            ))?;

            mdbx_result(ffi::mdbx_env_open(
                env,
                c_path.as_ptr(),
                builder.flags.make_flags(),
                0o644,
            ))?;
            Ok(())
        })();

        if let Err(e) = result {
            unsafe {
                ffi::mdbx_env_close_ex(env, false);
            }
            return Err(e);
        }

        let env_ptr = EnvPtr(env);
        let txn_manager = RwSyncLifecycle::spawn(env_ptr);

        Ok(Self {
            inner: Arc::new(EnvironmentInner {
                env: env_ptr,
                path: path.to_path_buf(),
                flags: builder.flags,
                txn_manager,
                poisoned: std::sync::atomic::AtomicBool::new(false),
                destroy_on_drop,
                db_cache: DbCache::default(),
            }),
        })
    }

    /// Opens (or creates) a temporary environment in a fresh temp directory.
    ///
    /// If `destroy` is `true`, the directory is removed when the last
    /// handle to the returned environment drops. Without it the directory
    /// persists after drop. The original implementation's two call sites
    /// disagreed on a default; this crate resolves that by requiring the
    /// caller to state intent explicitly rather than picking one silently.
    pub fn make_temp(builder: &EnvironmentBuilder, destroy: bool) -> MdbxResult<Self> {
        let dir = tempfile::Builder::new().prefix("mdbx-kv-").tempdir()?;
        let path = dir.keep();
        Self::open_with_builder_destroy(&path, builder, destroy)
    }

    /// Opens an environment at `path` through the process-wide registry,
    /// deduplicating by canonical path. See [`crate::env::registry`].
    pub fn open_shared(path: impl AsRef<Path>, builder: EnvironmentBuilder) -> MdbxResult<Self> {
        REGISTRY.acquire(path.as_ref(), builder)
    }

    /// Like [`Environment::open_shared`], but fails with
    /// [`MdbxError::AlreadyOpenWithDifferentOptions`] instead of silently
    /// reusing a live environment whose options differ from `builder`.
    pub fn open_shared_strict(
        path: impl AsRef<Path>,
        builder: EnvironmentBuilder,
    ) -> MdbxResult<Self> {
        REGISTRY.acquire_with_policy(path.as_ref(), builder, AlreadyOpenPolicy::Strict)
    }

    /// The canonical filesystem path this environment was opened at.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub(crate) fn env_ptr(&self) -> *mut ffi::MDBX_env {
        self.inner.env.0
    }

    pub(crate) fn txn_manager(&self) -> &LifecycleHandle {
        &self.inner.txn_manager
    }

    /// Marks the environment unusable after an unrecoverable engine error.
    pub(crate) fn poison(&self) {
        self.inner.poisoned.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Returns an error fast, without touching the engine, if this
    /// environment has been marked unusable.
    pub(crate) fn check_poisoned(&self) -> MdbxResult<()> {
        if self.inner.poisoned.load(std::sync::atomic::Ordering::SeqCst) {
            Err(MdbxError::Panic)
        } else {
            Ok(())
        }
    }

    /// Re-reads the environment's current map geometry from the engine,
    /// picking up a larger map grown by another process. Called before the
    /// single retry of a transaction begin that failed with
    /// [`MdbxError::MapResized`].
    pub(crate) fn remap(&self) -> MdbxResult<()> {
        unsafe {
            mdbx_result(ffi::mdbx_env_set_geometry(self.env_ptr(), -1, -1, -1, -1, -1, -1))?;
        }
        Ok(())
    }

    /// Whether the environment was opened read-only.
    pub fn is_read_only(&self) -> MdbxResult<bool> {
        Ok(matches!(self.inner.flags.mode, crate::Mode::ReadOnly))
    }

    /// Whether the environment was opened read-write.
    pub fn is_read_write(&self) -> MdbxResult<bool> {
        Ok(!matches!(self.inner.flags.mode, crate::Mode::ReadOnly))
    }

    /// Flushes the environment's data buffers to disk.
    ///
    /// `force` flushes regardless of the environment's durability flags.
    pub fn sync(&self, force: bool) -> MdbxResult<()> {
        self.check_poisoned()?;
        unsafe {
            mdbx_result_checked(self, ffi::mdbx_env_sync_ex(self.env_ptr(), force, false))?;
        }
        Ok(())
    }

    /// Retrieves statistics for the default database.
    pub fn stat(&self) -> MdbxResult<Stat> {
        self.check_poisoned()?;
        let mut stat = Stat::zeroed();
        unsafe {
            mdbx_result_checked(
                self,
                ffi::mdbx_env_stat_ex(
                    self.env_ptr(),
                    ptr::null(),
                    stat.as_mut_ptr(),
                    mem::size_of::<ffi::MDBX_stat>(),
                ),
            )?;
        }
        Ok(stat)
    }

    /// Retrieves environment-wide info (geometry, reader count, mode, ...).
    pub fn info(&self) -> MdbxResult<Info> {
        self.check_poisoned()?;
        let mut info = Info::zeroed();
        unsafe {
            mdbx_result_checked(
                self,
                ffi::mdbx_env_info_ex(
                    self.env_ptr(),
                    ptr::null(),
                    info.as_mut_ptr(),
                    mem::size_of::<ffi::MDBX_envinfo>(),
                ),
            )?;
        }
        info.mode = self.inner.flags.mode;
        Ok(info)
    }

    /// Begins a read-only transaction.
    pub fn begin_ro_txn(&self) -> MdbxResult<crate::txn::Transaction<crate::txn::RO>> {
        self.check_poisoned()?;
        crate::txn::Transaction::new(self.clone())
    }

    /// Begins a read-write transaction. Fails immediately if the
    /// environment was opened read-only.
    pub fn begin_rw_txn(&self) -> MdbxResult<crate::txn::Transaction<crate::txn::RW>> {
        self.check_poisoned()?;
        if matches!(self.inner.flags.mode, crate::Mode::ReadOnly) {
            return Err(MdbxError::AccessError);
        }
        crate::txn::Transaction::new(self.clone())
    }

    /// Alias for [`Environment::begin_ro_txn`].
    pub fn begin_ro_sync(&self) -> MdbxResult<crate::txn::Transaction<crate::txn::RO>> {
        self.begin_ro_txn()
    }

    /// Alias for [`Environment::begin_rw_txn`].
    pub fn begin_rw_sync(&self) -> MdbxResult<crate::txn::Transaction<crate::txn::RW>> {
        self.begin_rw_txn()
    }

    /// Opens (creating if necessary) the named database, caching its
    /// descriptor for the life of the environment. The empty name and
    /// `None` both denote the default sub-database.
    ///
    /// Read-only environments fail with [`MdbxError::NotFound`] if the
    /// database does not already exist, since creating one requires a write
    /// transaction.
    pub fn open_db(&self, name: Option<&str>) -> MdbxResult<Database> {
        self.check_poisoned()?;
        let name_hash = database::hash_name(name);
        if let Some(db) = self.inner.db_cache.get(name_hash) {
            return Ok(db);
        }

        let read_only = matches!(self.inner.flags.mode, crate::Mode::ReadOnly);
        let db = if read_only {
            let txn = self.begin_ro_txn()?;
            let db = txn.txn_execute(|ptr| database::open_dbi(ptr, name, DatabaseFlags::empty()))?;
            poison_on_fatal(self, db)?
        } else {
            let txn = self.begin_rw_txn()?;
            let db = txn.txn_execute(|ptr| database::open_dbi(ptr, name, DatabaseFlags::CREATE))?;
            let db = poison_on_fatal(self, db)?;
            txn.commit()?;
            db
        };
        self.inner.db_cache.insert(name_hash, db);
        Ok(db)
    }
}

impl Drop for EnvironmentInner {
    fn drop(&mut self) {
        unsafe {
            ffi::mdbx_env_close_ex(self.env.0, false);
        }
        if self.destroy_on_drop {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

fn path_to_cstring(path: &Path) -> MdbxResult<CString> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        CString::new(path.as_os_str().as_bytes())
            .map_err(|_| MdbxError::Invalid)
    }
    #[cfg(not(unix))]
    {
        CString::new(path.to_string_lossy().as_bytes()).map_err(|_| MdbxError::Invalid)
    }
}

/// Database statistics (page counts, tree depth, entry count).
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct Stat(ffi::MDBX_stat);

impl Stat {
    pub(crate) fn zeroed() -> Self {
        unsafe { Self(mem::zeroed()) }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut ffi::MDBX_stat {
        &mut self.0
    }

    /// B+tree depth.
    pub fn depth(&self) -> u32 {
        self.0.ms_depth as u32
    }

    /// Number of internal (branch) pages.
    pub fn branch_pages(&self) -> usize {
        self.0.ms_branch_pages as usize
    }

    /// Number of leaf pages.
    pub fn leaf_pages(&self) -> usize {
        self.0.ms_leaf_pages as usize
    }

    /// Number of overflow pages.
    pub fn overflow_pages(&self) -> usize {
        self.0.ms_overflow_pages as usize
    }

    /// Number of data entries.
    pub fn entries(&self) -> usize {
        self.0.ms_entries as usize
    }
}

/// Environment-wide info: geometry, reader count, last transaction id/page.
#[derive(Clone, Copy)]
pub struct Info {
    raw: ffi::MDBX_envinfo,
    mode: crate::Mode,
}

impl Info {
    pub(crate) fn zeroed() -> Self {
        unsafe { Self { raw: mem::zeroed(), mode: crate::Mode::default() } }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut ffi::MDBX_envinfo {
        &mut self.raw
    }

    /// Geometry bounds currently in effect.
    pub fn geometry(&self) -> InfoGeometry<'_> {
        InfoGeometry(self)
    }

    /// Number of currently active reader slots.
    pub fn num_readers(&self) -> u32 {
        self.raw.mi_numreaders
    }

    /// The last committed transaction id.
    pub fn last_txnid(&self) -> u64 {
        self.raw.mi_recent_txnid
    }

    /// The last page number allocated in the map.
    pub fn last_pgno(&self) -> u64 {
        self.raw.mi_last_pgno
    }

    /// The access mode this environment was opened with.
    pub fn mode(&self) -> crate::Mode {
        self.mode
    }
}

impl std::fmt::Debug for Info {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Info")
            .field("num_readers", &self.num_readers())
            .field("last_txnid", &self.last_txnid())
            .finish()
    }
}

/// Borrowed view of [`Info`]'s geometry fields.
pub struct InfoGeometry<'a>(&'a Info);

impl InfoGeometry<'_> {
    /// Minimum (current lower bound) map size in bytes.
    pub fn min(&self) -> u64 {
        self.0.raw.mi_geo.lower
    }

    /// Maximum map size in bytes the environment may grow to.
    pub fn max(&self) -> u64 {
        self.0.raw.mi_geo.upper
    }

    /// Current actual map size in bytes.
    pub fn current(&self) -> u64 {
        self.0.raw.mi_geo.current
    }
}
