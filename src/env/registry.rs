//! Process-wide registry deduplicating open [`Environment`]s by canonical
//! filesystem path.
//!
//! `acquire` is first-open-wins: the first caller to open an environment at
//! a path determines its options; later callers for the same live path get
//! a cloned handle and (in the default, lenient policy) a `tracing::warn!`
//! if their options differ. The underlying engine itself forbids re-opening
//! an environment with conflicting options from the same process, so there
//! is no way to honor the second caller's options short of closing and
//! reopening — out of scope here.

use super::{Environment, EnvironmentBuilder, EnvironmentInner};
use crate::error::{MdbxError, MdbxResult};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock, Weak},
};

/// Controls what happens when a caller requests an already-open environment
/// with different options than it was originally opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlreadyOpenPolicy {
    /// Log a warning and return the live environment's handle, ignoring the
    /// caller's options (the default).
    #[default]
    Lenient,
    /// Fail with [`MdbxError::AlreadyOpenWithDifferentOptions`] instead.
    Strict,
}

pub(crate) struct Registry {
    entries: Mutex<HashMap<PathBuf, Weak<EnvironmentInner>>>,
}

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

impl Registry {
    fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    pub(crate) fn acquire(
        &self,
        path: &Path,
        builder: EnvironmentBuilder,
    ) -> MdbxResult<Environment> {
        self.acquire_with_policy(path, builder, AlreadyOpenPolicy::default())
    }

    pub(crate) fn acquire_with_policy(
        &self,
        path: &Path,
        builder: EnvironmentBuilder,
        policy: AlreadyOpenPolicy,
    ) -> MdbxResult<Environment> {
        let canonical = canonicalize(path);
        let mut entries = self.entries.lock();

        if let Some(weak) = entries.get(&canonical) {
            if let Some(inner) = weak.upgrade() {
                let differs = inner.flags != builder.flags;
                if policy == AlreadyOpenPolicy::Strict && differs {
                    return Err(MdbxError::AlreadyOpenWithDifferentOptions);
                }
                if differs {
                    tracing::warn!(
                        path = %canonical.display(),
                        "environment already open at this path with different options; \
                         reusing existing handle (first-open-wins)"
                    );
                }
                return Ok(Environment { inner });
            }
            // Weak reference expired; falls through to reopen below.
        }

        let env = Environment::open_with_builder(&canonical, &builder)?;
        entries.insert(canonical, Arc::downgrade(&env.inner));
        Ok(env)
    }
}

fn canonicalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
