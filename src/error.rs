//! Error taxonomy for the environment, transaction, container and transform
//! layers.

use std::fmt;

/// The crate-wide result alias.
pub type MdbxResult<T> = Result<T, MdbxError>;

/// Errors surfaced by this crate.
///
/// The storage-engine-facing variants mirror the underlying engine's error
/// codes; the container-layer variants (`EmptyKey`, `Unsupported`, ...) are
/// raised by this crate itself before or after delegating to the engine.
#[derive(Debug, thiserror::Error)]
pub enum MdbxError {
    /// The environment has not been initialized (opened) yet.
    #[error("environment not initialized")]
    NotInitialized,

    /// Permission denied accessing the environment files.
    #[error("permission denied")]
    AccessError,

    /// Key already exists (engine-level, distinct from `setdefault`).
    #[error("key already exists")]
    KeyExist,

    /// The requested key was not present.
    #[error("key not found")]
    NotFound,

    /// An empty key was supplied where one is not permitted.
    #[error("empty key")]
    EmptyKey,

    /// The database has no entries.
    #[error("database is empty")]
    EmptyDatabase,

    /// Requested page was not found (corruption or stale handle).
    #[error("page not found")]
    PageNotFound,

    /// The environment's data is corrupted.
    #[error("environment corrupted")]
    Corrupted,

    /// The engine reported a fatal, process-wide panic condition.
    #[error("environment panicked")]
    Panic,

    /// The on-disk format version does not match what this build supports.
    #[error("version mismatch")]
    VersionMismatch,

    /// The environment file is not a valid store.
    #[error("invalid environment file")]
    Invalid,

    /// The environment's map size ceiling has been reached.
    #[error("map size limit reached")]
    MapFull,

    /// Too many named sub-databases already open.
    #[error("too many named databases")]
    DbsFull,

    /// No free reader slots remain.
    #[error("reader slots exhausted")]
    ReadersFull,

    /// Thread-local storage for reader slots is exhausted.
    #[error("thread-local storage slots exhausted")]
    TlsFull,

    /// Too many concurrent transactions.
    #[error("too many transactions")]
    TxnFull,

    /// Too many concurrent cursors.
    #[error("too many cursors")]
    CursorFull,

    /// Internal page-full condition (value too large for a single page chain).
    #[error("page full")]
    PageFull,

    /// Another process grew the map; the broker should remap and retry once.
    #[error("map resized by another process")]
    MapResized,

    /// The environment was opened with incompatible flags.
    #[error("incompatible environment flags")]
    Incompatible,

    /// Invalid reader slot handle.
    #[error("bad reader slot")]
    BadReaderSlot,

    /// The transaction handle is invalid, already committed/aborted, or used
    /// from a thread other than the one that created it.
    #[error("bad or misused transaction")]
    BadTransaction,

    /// A key or value exceeded the engine's size limit.
    #[error("key or value too large")]
    BadValSize,

    /// Invalid or stale named-database handle.
    #[error("bad database handle")]
    BadDbi,

    /// A stored value's MAC did not verify against its signer.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// An async bulk operation was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,

    /// The requested operation is not meaningful in this configuration
    /// (e.g. `erase` on a cooked container with a non-identity key chain).
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The caller supplied options incompatible with an already-open
    /// environment at the same canonical path (strict registry mode).
    #[error("environment already open with different options")]
    AlreadyOpenWithDifferentOptions,

    /// A user-supplied predicate, transform, or comparator raised an error.
    ///
    /// The containing transaction is aborted; this error carries the
    /// callback's own error unchanged.
    #[error("callback error: {0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// A serializer, signer, or compressor stage failed.
    #[error("transform chain error at {stage}: {source}")]
    Transform {
        /// Which stage failed (`"serializer"`, `"signer"`, `"compressor"`).
        stage: &'static str,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// Filesystem I/O error (e.g. during `make_temp` cleanup).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error code from the underlying engine that this crate does not
    /// otherwise distinguish.
    #[error("storage engine error (code {0})")]
    Other(i32),
}

impl MdbxError {
    /// Translate a raw engine error code into an [`MdbxError`].
    ///
    /// Unrecognized codes become [`MdbxError::Other`] rather than panicking;
    /// the engine's error space is wider than the taxonomy this crate
    /// distinguishes by name.
    pub(crate) fn from_err_code(code: i32) -> Self {
        match code {
            ffi::MDBX_EACCESS => Self::AccessError,
            ffi::MDBX_KEYEXIST => Self::KeyExist,
            ffi::MDBX_NOTFOUND => Self::NotFound,
            ffi::MDBX_EMPTY => Self::EmptyDatabase,
            ffi::MDBX_PAGE_NOTFOUND => Self::PageNotFound,
            ffi::MDBX_CORRUPTED => Self::Corrupted,
            ffi::MDBX_PANIC => Self::Panic,
            ffi::MDBX_VERSION_MISMATCH => Self::VersionMismatch,
            ffi::MDBX_INVALID => Self::Invalid,
            ffi::MDBX_MAP_FULL => Self::MapFull,
            ffi::MDBX_DBS_FULL => Self::DbsFull,
            ffi::MDBX_READERS_FULL => Self::ReadersFull,
            ffi::MDBX_TLS_FULL => Self::TlsFull,
            ffi::MDBX_TXN_FULL => Self::TxnFull,
            ffi::MDBX_CURSOR_FULL => Self::CursorFull,
            ffi::MDBX_PAGE_FULL => Self::PageFull,
            ffi::MDBX_UNABLE_EXTEND_MAPSIZE => Self::MapResized,
            ffi::MDBX_INCOMPATIBLE => Self::Incompatible,
            ffi::MDBX_BAD_RSLOT => Self::BadReaderSlot,
            ffi::MDBX_BAD_TXN => Self::BadTransaction,
            ffi::MDBX_BAD_VALSIZE => Self::BadValSize,
            ffi::MDBX_BAD_DBI => Self::BadDbi,
            ffi::MDBX_EINVAL => Self::Invalid,
            other => Self::Other(other),
        }
    }

    /// Whether this error indicates the environment has entered an
    /// unusable state and should be treated as poisoned until reopened.
    pub fn is_environment_fatal(&self) -> bool {
        matches!(self, Self::Corrupted | Self::Panic | Self::VersionMismatch)
    }

    /// Whether the broker should transparently remap and retry the
    /// transaction once.
    pub fn is_retryable_once(&self) -> bool {
        matches!(self, Self::MapResized)
    }

    /// Wrap an arbitrary user-callback error (predicate, transform fn).
    pub fn callback<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Callback(Box::new(err))
    }

    /// Wrap a transform-stage error with its stage name.
    pub(crate) fn transform<E>(stage: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transform { stage, source: Box::new(source) }
    }
}

/// Translate a raw MDBX return code into a `Result`.
///
/// MDBX functions return `MDBX_SUCCESS` (0) on success, `MDBX_RESULT_TRUE`
/// (a positive sentinel) for a handful of "succeeded but with a caveat"
/// cases callers check for explicitly, and a negative or other positive
/// value as an error code otherwise.
pub(crate) fn mdbx_result(code: i32) -> MdbxResult<bool> {
    match code {
        ffi::MDBX_SUCCESS => Ok(false),
        ffi::MDBX_RESULT_TRUE => Ok(true),
        other => Err(MdbxError::from_err_code(other)),
    }
}

/// If `result` is one of the environment-fatal kinds (`Corrupted`, `Panic`,
/// `VersionMismatch`), marks `env` poisoned so every later call against it
/// fails fast instead of re-entering the engine. Returns `result` unchanged
/// either way.
pub(crate) fn poison_on_fatal<T>(env: &crate::Environment, result: MdbxResult<T>) -> MdbxResult<T> {
    if let Err(ref e) = result {
        if e.is_environment_fatal() {
            env.poison();
        }
    }
    result
}

/// [`mdbx_result`], then [`poison_on_fatal`] against `env`.
pub(crate) fn mdbx_result_checked(env: &crate::Environment, code: i32) -> MdbxResult<bool> {
    poison_on_fatal(env, mdbx_result(code))
}

/// Opaque wrapper so predicate/transform closures can return arbitrary
/// error types without this crate depending on them.
#[derive(Debug)]
pub struct CallbackError(pub Box<dyn std::error::Error + Send + Sync + 'static>);

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CallbackError {}
