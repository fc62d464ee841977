//! Store opening and open-time recovery.
//!
//! A store named `names` occupies three files:
//!
//! ```text
//! names            # key log (source of truth)
//! names.hashToId   # durable index (IndexKind::Durable only)
//! names.lock       # advisory lock, held while open
//! ```

use crate::codec::KeyCodec;
use crate::config::{EnumeratorConfig, IndexKind};
use crate::enumerator::{DurableEnumerator, DurableStringEnumerator, Enumerator};
use crate::error::{CoreError, CoreResult};
use crate::index::{DurableHashMap, InMemoryMultiMap, IntMultiMap};
use crate::log::{AppendLog, DurableLog};
use enumdb_storage::FileBackend;
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const INDEX_SUFFIX: &str = ".hashToId";
const LOCK_SUFFIX: &str = ".lock";

/// File locations of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    /// Key log.
    pub log: PathBuf,
    /// Durable index.
    pub index: PathBuf,
    /// Lock file.
    pub lock: PathBuf,
}

impl StorePaths {
    /// Derives the store files from the log path.
    #[must_use]
    pub fn new(base: &Path) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name = OsString::from(base.as_os_str());
            name.push(suffix);
            PathBuf::from(name)
        };
        Self {
            log: base.to_path_buf(),
            index: with_suffix(INDEX_SUFFIX),
            lock: with_suffix(LOCK_SUFFIX),
        }
    }

    fn ensure_parent(&self) -> CoreResult<()> {
        if let Some(parent) = self.log.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Exclusive advisory lock on a store, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    _file: File,
}

impl StoreLock {
    /// Takes the lock without blocking.
    ///
    /// # Errors
    ///
    /// [`CoreError::StoreLocked`] if another handle holds it.
    pub fn acquire(path: &Path) -> CoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked {
                path: path.display().to_string(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Checks the log's data version, stamping `expected` into a fresh log.
///
/// # Errors
///
/// [`CoreError::VersionMismatch`] if the log carries another non-zero
/// version.
pub fn check_data_version(log: &dyn DurableLog, expected: u32) -> CoreResult<()> {
    if expected == 0 {
        return Err(CoreError::invalid_operation("data version 0 is reserved"));
    }
    match log.data_version() {
        0 => {
            debug!(version = expected, "stamping data version");
            log.set_data_version(expected)
        }
        found if found == expected => Ok(()),
        found => Err(CoreError::VersionMismatch { expected, found }),
    }
}

/// Opens stores according to an [`EnumeratorConfig`].
#[derive(Debug, Clone, Default)]
pub struct EnumeratorFactory {
    config: EnumeratorConfig,
}

impl EnumeratorFactory {
    /// Creates a factory.
    #[must_use]
    pub fn new(config: EnumeratorConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &EnumeratorConfig {
        &self.config
    }

    /// Opens (or creates) the store whose key log lives at `base`.
    ///
    /// The returned enumerator is fully recovered: replay or catch-up
    /// has already run.
    pub fn open<K, C: KeyCodec<K>>(
        &self,
        base: &Path,
        codec: C,
    ) -> CoreResult<DurableEnumerator<K, C>> {
        let paths = StorePaths::new(base);
        let (lock, log) = self.open_log(&paths)?;

        let index: Box<dyn IntMultiMap> = match self.config.index_kind {
            IndexKind::InMemory => Box::new(InMemoryMultiMap::new()),
            IndexKind::Durable => Box::new(DurableHashMap::open_file(
                &paths.index,
                self.config.initial_index_capacity,
            )?),
        };
        if log.is_empty() && !index.is_empty() {
            warn!(
                entries = index.len(),
                "discarding index of an empty key log"
            );
            index.clear()?;
        }

        let enumerator = DurableEnumerator::from_parts(
            Box::new(log),
            index,
            codec,
            self.config.rebuild_if_inconsistent,
        )?;
        enumerator.attach_lock(lock);
        info!(
            path = %paths.log.display(),
            records = enumerator.len(),
            index = ?self.config.index_kind,
            "opened enumerator"
        );
        Ok(enumerator)
    }

    /// Opens (or creates) a string store at `base`.
    ///
    /// The string variant always keeps its index in memory.
    pub fn open_strings(&self, base: &Path) -> CoreResult<DurableStringEnumerator> {
        let paths = StorePaths::new(base);
        let (lock, log) = self.open_log(&paths)?;
        let enumerator = DurableStringEnumerator::with_log(log)?;
        enumerator.attach_lock(lock);
        info!(
            path = %paths.log.display(),
            records = enumerator.len(),
            "opened string enumerator"
        );
        Ok(enumerator)
    }

    /// Creates a store that lives only in memory.
    pub fn open_in_memory<K, C: KeyCodec<K>>(
        &self,
        codec: C,
    ) -> CoreResult<DurableEnumerator<K, C>> {
        let log = AppendLog::in_memory()?;
        check_data_version(&log, self.config.data_version)?;
        let index: Box<dyn IntMultiMap> = match self.config.index_kind {
            IndexKind::InMemory => Box::new(InMemoryMultiMap::new()),
            IndexKind::Durable => {
                Box::new(DurableHashMap::in_memory(self.config.initial_index_capacity)?)
            }
        };
        DurableEnumerator::from_parts(
            Box::new(log),
            index,
            codec,
            self.config.rebuild_if_inconsistent,
        )
    }

    fn open_log(&self, paths: &StorePaths) -> CoreResult<(StoreLock, AppendLog)> {
        if !self.config.create_if_missing && !paths.log.exists() {
            return Err(CoreError::StoreNotFound {
                path: paths.log.display().to_string(),
            });
        }
        paths.ensure_parent()?;
        let lock = StoreLock::acquire(&paths.lock)?;

        let backend = FileBackend::open(&paths.log)?;
        let log = AppendLog::open(Box::new(backend), self.config.sync_on_append)?;
        check_data_version(&log, self.config.data_version)?;
        Ok((lock, log))
    }
}
