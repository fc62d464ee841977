//! Test fixtures and store helpers.

use enumdb_core::{
    DurableEnumerator, DurableStringEnumerator, EnumeratorConfig, EnumeratorFactory, KeyCodec,
    StorePaths, StringCodec,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A store location inside a temporary directory, removed on drop.
pub struct TempStore {
    base: PathBuf,
    _temp_dir: TempDir,
}

impl TempStore {
    /// Creates a fresh, empty store location named `names`.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            base: temp_dir.path().join("names"),
            _temp_dir: temp_dir,
        }
    }

    /// Path of the key log.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// All file locations of the store.
    pub fn paths(&self) -> StorePaths {
        StorePaths::new(&self.base)
    }

    /// Opens the store with the default configuration and string keys.
    pub fn open(&self) -> DurableEnumerator<String, StringCodec> {
        self.open_with(EnumeratorConfig::default())
    }

    /// Opens the store with `config` and string keys.
    pub fn open_with(&self, config: EnumeratorConfig) -> DurableEnumerator<String, StringCodec> {
        self.open_codec(config, StringCodec)
    }

    /// Opens the store with `config` and an arbitrary codec.
    pub fn open_codec<K, C: KeyCodec<K>>(
        &self,
        config: EnumeratorConfig,
        codec: C,
    ) -> DurableEnumerator<K, C> {
        EnumeratorFactory::new(config)
            .open(&self.base, codec)
            .expect("Failed to open store")
    }

    /// Opens the store as a self-contained string enumerator.
    pub fn open_strings(&self) -> DurableStringEnumerator {
        EnumeratorFactory::default()
            .open_strings(&self.base)
            .expect("Failed to open string store")
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `f` against a fresh temporary store.
///
/// # Example
///
/// ```rust,ignore
/// use enumdb_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     let names = store.open();
///     // ...
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&TempStore) -> R,
{
    let store = TempStore::new();
    f(&store)
}

/// Distinct keys `key-0`, `key-1`, ...
pub fn numbered_keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("key-{i}")).collect()
}
