//! Flag types controlling environment, database and write behavior.

use bitflags::bitflags;

/// Durability/sync posture for a read-write environment.
///
/// A finer-grained alternative to raw engine bits, matching the three
/// durability postures spec.md §6 distinguishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Full durability: fsync data and metadata at every commit.
    #[default]
    Durable,
    /// Skip metadata fsync only; data pages are still synced.
    NoMetaSync,
    /// Skip fsync entirely at commit; fastest, least crash-durable.
    NoSync,
}

/// Whether an environment is opened for reading only or for reading and
/// writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Read-only: write-transaction acquisition always fails.
    ReadOnly,
    /// Read-write, with the given durability posture.
    ReadWrite {
        /// The durability posture for commits.
        sync_mode: SyncMode,
    },
}

impl Default for Mode {
    fn default() -> Self {
        Self::ReadWrite { sync_mode: SyncMode::default() }
    }
}

/// Configuration flags applied when opening an environment.
///
/// Corresponds to spec.md §6's options table. `mode` folds together
/// `read_only`/`no_sync`/`no_meta_sync`/`write_map`/`map_async` into a single
/// coherent choice, since the engine treats them as one durability axis; the
/// remaining fields are independent toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentFlags {
    /// Durability / access mode.
    pub mode: Mode,
    /// Use a writable memory map for faster bulk writes, less crash-safe.
    pub write_map: bool,
    /// Combined with `write_map`, flush asynchronously.
    pub map_async: bool,
    /// The path names a file, not a directory.
    pub no_sub_dir: bool,
    /// Skip the lock file; caller is responsible for exclusion.
    pub no_lock: bool,
    /// Advise the OS against read-ahead.
    pub no_rdahead: bool,
    /// Skip zeroing freshly allocated pages.
    pub no_meminit: bool,
    /// Allow nested write transactions (mapped to `MDBX_ACCEDE`).
    pub accede: bool,
}

impl Default for EnvironmentFlags {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            write_map: false,
            map_async: false,
            no_sub_dir: false,
            no_lock: false,
            no_rdahead: false,
            no_meminit: false,
            accede: true,
        }
    }
}

impl From<Mode> for EnvironmentFlags {
    fn from(mode: Mode) -> Self {
        Self { mode, ..Default::default() }
    }
}

impl EnvironmentFlags {
    /// Render these flags as the raw bitmask `mdbx_env_open` expects.
    pub(crate) fn make_flags(&self) -> ffi::MDBX_env_flags_t {
        let mut flags = 0;
        match self.mode {
            Mode::ReadOnly => flags |= ffi::MDBX_RDONLY,
            Mode::ReadWrite { sync_mode } => match sync_mode {
                SyncMode::Durable => {}
                SyncMode::NoMetaSync => flags |= ffi::MDBX_NOMETASYNC,
                SyncMode::NoSync => flags |= ffi::MDBX_SAFE_NOSYNC,
            },
        }
        if self.write_map {
            flags |= ffi::MDBX_WRITEMAP;
        }
        if self.map_async {
            flags |= ffi::MDBX_WRITEMAP | ffi::MDBX_MAPASYNC;
        }
        if self.no_sub_dir {
            flags |= ffi::MDBX_NOSUBDIR;
        }
        if self.no_lock {
            flags |= ffi::MDBX_EXCLUSIVE;
        }
        if self.no_rdahead {
            flags |= ffi::MDBX_NORDAHEAD;
        }
        if self.no_meminit {
            flags |= ffi::MDBX_NOMEMINIT;
        }
        if self.accede {
            flags |= ffi::MDBX_ACCEDE;
        }
        flags
    }

    pub(crate) fn from_bits(bits: ffi::MDBX_env_flags_t) -> Self {
        let mode = if bits & ffi::MDBX_RDONLY != 0 {
            Mode::ReadOnly
        } else if bits & ffi::MDBX_SAFE_NOSYNC != 0 {
            Mode::ReadWrite { sync_mode: SyncMode::NoSync }
        } else if bits & ffi::MDBX_NOMETASYNC != 0 {
            Mode::ReadWrite { sync_mode: SyncMode::NoMetaSync }
        } else {
            Mode::ReadWrite { sync_mode: SyncMode::Durable }
        };
        Self {
            mode,
            write_map: bits & ffi::MDBX_WRITEMAP != 0,
            map_async: bits & ffi::MDBX_MAPASYNC != 0,
            no_sub_dir: bits & ffi::MDBX_NOSUBDIR != 0,
            no_lock: bits & ffi::MDBX_EXCLUSIVE != 0,
            no_rdahead: bits & ffi::MDBX_NORDAHEAD != 0,
            no_meminit: bits & ffi::MDBX_NOMEMINIT != 0,
            accede: bits & ffi::MDBX_ACCEDE != 0,
        }
    }
}

bitflags! {
    /// Flags controlling how a named database is created/opened.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct DatabaseFlags: u32 {
        /// Create the database if it does not already exist.
        const CREATE = ffi::MDBX_CREATE;
        /// Keys are compared in reverse byte order.
        const REVERSE_KEY = ffi::MDBX_REVERSEKEY;
    }
}

bitflags! {
    /// Flags controlling an individual write.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct WriteFlags: u32 {
        /// Fail rather than overwrite an existing key.
        const NO_OVERWRITE = ffi::MDBX_NOOVERWRITE;
        /// The key must already exist; updates the value in place.
        const CURRENT = ffi::MDBX_CURRENT;
        /// Append at the logical end without a full key comparison
        /// (caller asserts keys are inserted in increasing order).
        const APPEND = ffi::MDBX_APPEND;
    }
}
