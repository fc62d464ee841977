//! Enumerator configuration.

/// Which multimap backs the hash → id index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Process-lifetime map, replayed from the log on every open.
    InMemory,
    /// On-disk table next to the log (`<name>.hashToId`).
    Durable,
}

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct EnumeratorConfig {
    /// Whether to create the store if the log does not exist.
    pub create_if_missing: bool,

    /// Data format version stamped into fresh logs and checked on open.
    /// Must be non-zero.
    pub data_version: u32,

    /// Index backend.
    pub index_kind: IndexKind,

    /// Replay the log into a durable index found empty while the log is not.
    pub rebuild_if_inconsistent: bool,

    /// Flush the log after every append.
    pub sync_on_append: bool,

    /// Slot count of a freshly created durable index (rounded up to a power
    /// of two).
    pub initial_index_capacity: usize,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            data_version: 1,
            index_kind: IndexKind::Durable,
            rebuild_if_inconsistent: true,
            sync_on_append: false,
            initial_index_capacity: 1024,
        }
    }
}

impl EnumeratorConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create a missing store.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the expected data version.
    #[must_use]
    pub const fn data_version(mut self, version: u32) -> Self {
        self.data_version = version;
        self
    }

    /// Sets the index backend.
    #[must_use]
    pub const fn index_kind(mut self, kind: IndexKind) -> Self {
        self.index_kind = kind;
        self
    }

    /// Sets the rebuild-if-inconsistent recovery policy.
    #[must_use]
    pub const fn rebuild_if_inconsistent(mut self, value: bool) -> Self {
        self.rebuild_if_inconsistent = value;
        self
    }

    /// Sets whether every append is flushed.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Sets the initial durable index capacity.
    #[must_use]
    pub const fn initial_index_capacity(mut self, slots: usize) -> Self {
        self.initial_index_capacity = slots;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EnumeratorConfig::default();
        assert!(config.create_if_missing);
        assert!(config.rebuild_if_inconsistent);
        assert_eq!(config.data_version, 1);
        assert_eq!(config.index_kind, IndexKind::Durable);
    }

    #[test]
    fn builder_pattern() {
        let config = EnumeratorConfig::new()
            .data_version(7)
            .index_kind(IndexKind::InMemory)
            .rebuild_if_inconsistent(false)
            .sync_on_append(true)
            .initial_index_capacity(64);

        assert_eq!(config.data_version, 7);
        assert_eq!(config.index_kind, IndexKind::InMemory);
        assert!(!config.rebuild_if_inconsistent);
        assert!(config.sync_on_append);
        assert_eq!(config.initial_index_capacity, 64);
    }
}
