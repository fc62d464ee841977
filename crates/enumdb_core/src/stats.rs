//! Enumerator statistics.
//!
//! Operation counters are atomics bumped on the hot path; [`EnumeratorStats`]
//! is the plain snapshot handed to callers and tooling.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live operation counters.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    lookups: AtomicU64,
    created: AtomicU64,
    reads: AtomicU64,
}

impl Counters {
    /// Records an `enumerate` / `try_enumerate` call.
    pub(crate) fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a key that was assigned a fresh id.
    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a `value_of` call.
    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    pub(crate) fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub(crate) fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

/// A point-in-time snapshot of an enumerator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnumeratorStats {
    /// Records in the key log (the highest assigned id).
    pub records: u32,
    /// Size of the key log in bytes, header included.
    pub log_bytes: u64,
    /// (hash, id) pairs in the index.
    pub index_entries: usize,
    /// Data version stamped in the log.
    pub data_version: u32,
    /// Whether the index survives a restart.
    pub index_durable: bool,
    /// Lookups since open.
    pub lookups: u64,
    /// Ids assigned since open.
    pub created: u64,
    /// `value_of` calls since open.
    pub reads: u64,
}

impl EnumeratorStats {
    /// Fraction of lookups that found an existing id.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        if self.lookups == 0 {
            return 0.0;
        }
        let hits = self.lookups.saturating_sub(self.created);
        hits as f64 / self.lookups as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let counters = Counters::default();
        counters.record_lookup();
        counters.record_lookup();
        counters.record_created();
        counters.record_read();

        assert_eq!(counters.lookups(), 2);
        assert_eq!(counters.created(), 1);
        assert_eq!(counters.reads(), 1);
    }

    #[test]
    fn hit_ratio() {
        let stats = EnumeratorStats {
            lookups: 4,
            created: 1,
            ..Default::default()
        };
        assert!((stats.hit_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(EnumeratorStats::default().hit_ratio(), 0.0);
    }
}
