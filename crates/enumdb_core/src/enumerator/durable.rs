//! Generic enumerator over a pluggable log, index and codec.

use crate::codec::KeyCodec;
use crate::enumerator::Enumerator;
use crate::error::{CoreError, CoreResult};
use crate::factory::StoreLock;
use crate::index::IntMultiMap;
use crate::log::DurableLog;
use crate::stats::{Counters, EnumeratorStats};
use crate::types::{adjust_hash, Id};
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Enumerator binding a key log to a hash → id index.
///
/// Record *i* of the log holds the key owning id *i*. The index only
/// narrows the search: every candidate is decoded from the log and compared
/// with the codec's equality before it is accepted.
///
/// Thread-safe: find-or-create runs as one critical section inside the
/// index, so racing callers for equal keys agree on a single id.
pub struct DurableEnumerator<K, C> {
    log: Box<dyn DurableLog>,
    index: Box<dyn IntMultiMap>,
    codec: C,
    counters: Counters,
    closed: AtomicBool,
    lock: Mutex<Option<StoreLock>>,
    _marker: PhantomData<fn() -> K>,
}

impl<K, C: KeyCodec<K>> DurableEnumerator<K, C> {
    /// Assembles an enumerator and brings the index up to date with the log.
    ///
    /// An in-memory index is always replayed. A durable index is replayed
    /// when found empty next to a non-empty log, if `rebuild_if_inconsistent`
    /// is set. A non-empty durable index is reconciled in either case:
    /// entries past the end of the log are dropped, and records the index
    /// does not cover (a crash between log append and index insert) are
    /// indexed.
    pub fn from_parts(
        log: Box<dyn DurableLog>,
        index: Box<dyn IntMultiMap>,
        codec: C,
        rebuild_if_inconsistent: bool,
    ) -> CoreResult<Self> {
        let enumerator = Self {
            log,
            index,
            codec,
            counters: Counters::default(),
            closed: AtomicBool::new(false),
            lock: Mutex::new(None),
            _marker: PhantomData,
        };
        enumerator.recover(rebuild_if_inconsistent)?;
        Ok(enumerator)
    }

    pub(crate) fn attach_lock(&self, lock: StoreLock) {
        *self.lock.lock() = Some(lock);
    }

    fn recover(&self, rebuild_if_inconsistent: bool) -> CoreResult<()> {
        let records = self.log.len();
        if records == 0 {
            return Ok(());
        }
        let entries = self.index.len();

        if entries == 0 {
            if self.index.is_durable() && !rebuild_if_inconsistent {
                warn!(records, "index is empty but the log is not; rebuild disabled");
                return Ok(());
            }
            info!(records, "replaying key log into index");
            let replayed = self.replay_all()?;
            debug!(replayed, "replay complete");
        } else {
            self.reconcile(records)?;
        }
        Ok(())
    }

    /// Brings a non-empty index in line with a log of `records` records.
    fn reconcile(&self, records: u32) -> CoreResult<()> {
        // Entries past the end point at appends the log lost in a crash;
        // their ids are about to be handed out again.
        let dropped = self.index.retain(&mut |_, id| id.as_u32() <= records)?;
        if dropped > 0 {
            warn!(dropped, records, "dropped index entries past the end of the key log");
        }
        if self.index.len() >= records as usize {
            return Ok(());
        }

        let mut covered = vec![false; records as usize];
        self.index
            .for_each_entry(&mut |_, id| covered[id.index()] = true)?;
        let missing: Vec<Id> = (1..=records)
            .map(Id::new)
            .filter(|id| !covered[id.index()])
            .collect();

        info!(missing = missing.len(), records, "indexing records missing from the index");
        for id in missing {
            let bytes = self.log.read(id)?;
            self.reindex(id, &bytes)?;
        }
        Ok(())
    }

    fn replay_all(&self) -> CoreResult<u32> {
        let mut replayed = 0u32;
        self.log.for_each_record(&mut |id, bytes| {
            self.reindex(id, bytes)?;
            replayed += 1;
            Ok(true)
        })?;
        Ok(replayed)
    }

    /// Offers record `id` to the index unless its key is already indexed.
    fn reindex(&self, id: Id, bytes: &[u8]) -> CoreResult<()> {
        let key = self.codec.decode(bytes)?;
        let hash = adjust_hash(self.codec.hash_code(&key));
        self.index.lookup_or_insert(
            hash,
            &mut |candidate| self.matches(candidate, &key),
            &mut |_| Ok(id),
        )?;
        Ok(())
    }

    /// Whether the record at `candidate` holds a key equal to `key`.
    fn matches(&self, candidate: Id, key: &K) -> CoreResult<bool> {
        if candidate.as_u32() > self.log.len() {
            return Ok(false);
        }
        let stored = self.codec.decode(&self.log.read(candidate)?)?;
        Ok(self.codec.are_equal(&stored, key))
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Clears the index and replays the whole log into it.
    ///
    /// Returns the number of records replayed.
    pub fn rebuild_index(&self) -> CoreResult<u32> {
        self.ensure_open()?;
        self.index.clear()?;
        let replayed = self.replay_all()?;
        self.index.flush()?;
        info!(replayed, "rebuilt index");
        Ok(replayed)
    }

    /// Iterates `(id, key)` pairs in id order, reading lazily from the log.
    ///
    /// The iteration covers the records present when it was created.
    #[must_use]
    pub fn keys(&self) -> Keys<'_, K, C> {
        Keys {
            enumerator: self,
            next: 1,
            end: u64::from(self.log.len()),
        }
    }

    /// Returns a point-in-time snapshot of the store.
    pub fn stats(&self) -> CoreResult<EnumeratorStats> {
        self.ensure_open()?;
        Ok(EnumeratorStats {
            records: self.log.len(),
            log_bytes: self.log.size_bytes()?,
            index_entries: self.index.len(),
            data_version: self.log.data_version(),
            index_durable: self.index.is_durable(),
            lookups: self.counters.lookups(),
            created: self.counters.created(),
            reads: self.counters.reads(),
        })
    }

    /// The codec in use.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Returns true until [`Enumerator::close`] runs.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}

impl<K, C: KeyCodec<K>> Enumerator<K> for DurableEnumerator<K, C> {
    fn enumerate(&self, key: &K) -> CoreResult<Id> {
        self.ensure_open()?;
        self.counters.record_lookup();
        let hash = adjust_hash(self.codec.hash_code(key));
        self.index.lookup_or_insert(
            hash,
            &mut |candidate| self.matches(candidate, key),
            &mut |_| {
                let id = self.codec.save_to_log(key, self.log.as_ref())?;
                self.counters.record_created();
                Ok(id)
            },
        )
    }

    fn try_enumerate(&self, key: &K) -> CoreResult<Option<Id>> {
        self.ensure_open()?;
        self.counters.record_lookup();
        let hash = adjust_hash(self.codec.hash_code(key));
        self.index
            .lookup(hash, &mut |candidate| self.matches(candidate, key))
    }

    fn value_of(&self, id: Id) -> CoreResult<Option<K>> {
        self.ensure_open()?;
        if id.is_null() {
            return Ok(None);
        }
        self.counters.record_read();
        let bytes = self.log.read(id)?;
        self.codec.decode(&bytes).map(Some)
    }

    fn process_all_data_objects(
        &self,
        visit: &mut dyn FnMut(K) -> CoreResult<bool>,
    ) -> CoreResult<bool> {
        self.ensure_open()?;
        self.log
            .for_each_record(&mut |_, bytes| visit(self.codec.decode(bytes)?))
    }

    fn len(&self) -> u32 {
        self.log.len()
    }

    fn flush(&self) -> CoreResult<()> {
        self.ensure_open()?;
        self.log.flush(true)?;
        self.index.flush()
    }

    fn close(&self) -> CoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let log_result = self.log.close();
        let index_result = self.index.close();
        self.lock.lock().take();
        debug!(records = self.log.len(), "closed enumerator");
        log_result.and(index_result)
    }
}

impl<K, C> Drop for DurableEnumerator<K, C> {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.log.close();
            let _ = self.index.close();
        }
    }
}

impl<K, C: std::fmt::Debug> std::fmt::Debug for DurableEnumerator<K, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableEnumerator")
            .field("records", &self.log.len())
            .field("index_entries", &self.index.len())
            .field("codec", &self.codec)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Lazy iterator over `(id, key)` pairs, see [`DurableEnumerator::keys`].
pub struct Keys<'a, K, C> {
    enumerator: &'a DurableEnumerator<K, C>,
    next: u64,
    end: u64,
}

impl<K, C: KeyCodec<K>> Iterator for Keys<'_, K, C> {
    type Item = CoreResult<(Id, K)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.end {
            return None;
        }
        let id = Id::new(self.next as u32);
        self.next += 1;
        let item = self
            .enumerator
            .ensure_open()
            .and_then(|()| self.enumerator.log.read(id))
            .and_then(|bytes| self.enumerator.codec.decode(&bytes))
            .map(|key| (id, key));
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}
