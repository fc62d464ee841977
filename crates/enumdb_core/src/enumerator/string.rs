//! Self-contained string enumerator.

use crate::config::EnumeratorConfig;
use crate::enumerator::Enumerator;
use crate::error::{CoreError, CoreResult};
use crate::factory::{EnumeratorFactory, StoreLock};
use crate::log::{AppendLog, DurableLog};
use crate::stats::{Counters, EnumeratorStats};
use crate::types::{adjust_hash, polynomial_hash, Id, KeyHash};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, info};

/// String enumerator with its own UTF-8 encoding and in-memory index.
///
/// One mutex guards the whole lookup-or-insert sequence. Candidates are
/// compared on their raw bytes, so no decode happens on the lookup path.
/// The index is rebuilt from the log on every open.
///
/// `value_of` answers `None` for any id outside `1..=max_id`, where
/// `max_id` is the highest id seen so far.
pub struct DurableStringEnumerator {
    log: AppendLog,
    index: Mutex<HashMap<KeyHash, Vec<Id>>>,
    max_id: AtomicU32,
    counters: Counters,
    closed: AtomicBool,
    lock: Mutex<Option<StoreLock>>,
}

impl DurableStringEnumerator {
    /// Opens (or creates) the store at `path`.
    pub fn open(path: &Path, config: EnumeratorConfig) -> CoreResult<Self> {
        EnumeratorFactory::new(config).open_strings(path)
    }

    /// Creates an enumerator that lives only in memory.
    pub fn in_memory() -> CoreResult<Self> {
        Self::with_log(AppendLog::in_memory()?)
    }

    /// Wraps an open log, replaying its records into the index.
    pub fn with_log(log: AppendLog) -> CoreResult<Self> {
        let enumerator = Self {
            log,
            index: Mutex::new(HashMap::new()),
            max_id: AtomicU32::new(0),
            counters: Counters::default(),
            closed: AtomicBool::new(false),
            lock: Mutex::new(None),
        };
        enumerator.replay()?;
        Ok(enumerator)
    }

    pub(crate) fn attach_lock(&self, lock: StoreLock) {
        *self.lock.lock() = Some(lock);
    }

    fn replay(&self) -> CoreResult<()> {
        let records = self.log.len();
        if records == 0 {
            return Ok(());
        }
        info!(records, "replaying string log");

        let mut index = self.index.lock();
        self.log.for_each_record(&mut |id, bytes| {
            let hash = adjust_hash(polynomial_hash(bytes));
            if self.find(&index, hash, bytes)?.is_none() {
                index.entry(hash).or_default().push(id);
            }
            self.max_id.fetch_max(id.as_u32(), Ordering::AcqRel);
            Ok(true)
        })?;
        debug!(buckets = index.len(), "string index rebuilt");
        Ok(())
    }

    fn find(
        &self,
        index: &HashMap<KeyHash, Vec<Id>>,
        hash: KeyHash,
        key: &[u8],
    ) -> CoreResult<Option<Id>> {
        let Some(candidates) = index.get(&hash) else {
            return Ok(None);
        };
        for &candidate in candidates {
            if self.log.read(candidate)? == key {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Returns the id of `key`, assigning the next id on first sight.
    pub fn enumerate_str(&self, key: &str) -> CoreResult<Id> {
        self.ensure_open()?;
        self.counters.record_lookup();
        let bytes = key.as_bytes();
        let hash = adjust_hash(polynomial_hash(bytes));

        let mut index = self.index.lock();
        if let Some(id) = self.find(&index, hash, bytes)? {
            return Ok(id);
        }
        let id = self.log.append(bytes)?;
        index.entry(hash).or_default().push(id);
        self.max_id.fetch_max(id.as_u32(), Ordering::AcqRel);
        self.counters.record_created();
        Ok(id)
    }

    /// Returns the id of `key` without assigning one.
    pub fn try_enumerate_str(&self, key: &str) -> CoreResult<Option<Id>> {
        self.ensure_open()?;
        self.counters.record_lookup();
        let bytes = key.as_bytes();
        let hash = adjust_hash(polynomial_hash(bytes));
        let index = self.index.lock();
        self.find(&index, hash, bytes)
    }

    /// Highest id handed out so far.
    #[must_use]
    pub fn max_id(&self) -> Id {
        Id::new(self.max_id.load(Ordering::Acquire))
    }

    /// Returns a point-in-time snapshot of the store.
    pub fn stats(&self) -> CoreResult<EnumeratorStats> {
        self.ensure_open()?;
        let index_entries = self.index.lock().values().map(Vec::len).sum();
        Ok(EnumeratorStats {
            records: self.log.len(),
            log_bytes: self.log.size_bytes()?,
            index_entries,
            data_version: self.log.data_version(),
            index_durable: false,
            lookups: self.counters.lookups(),
            created: self.counters.created(),
            reads: self.counters.reads(),
        })
    }
}

fn decode(bytes: Vec<u8>) -> CoreResult<String> {
    String::from_utf8(bytes).map_err(|e| CoreError::key_codec(format!("invalid UTF-8 key: {e}")))
}

impl Enumerator<String> for DurableStringEnumerator {
    fn enumerate(&self, key: &String) -> CoreResult<Id> {
        self.enumerate_str(key)
    }

    fn try_enumerate(&self, key: &String) -> CoreResult<Option<Id>> {
        self.try_enumerate_str(key)
    }

    fn value_of(&self, id: Id) -> CoreResult<Option<String>> {
        self.ensure_open()?;
        if id.is_null() || id.as_u32() > self.max_id.load(Ordering::Acquire) {
            return Ok(None);
        }
        self.counters.record_read();
        decode(self.log.read(id)?).map(Some)
    }

    fn process_all_data_objects(
        &self,
        visit: &mut dyn FnMut(String) -> CoreResult<bool>,
    ) -> CoreResult<bool> {
        self.ensure_open()?;
        self.log
            .for_each_record(&mut |_, bytes| visit(decode(bytes.to_vec())?))
    }

    fn len(&self) -> u32 {
        self.log.len()
    }

    fn flush(&self) -> CoreResult<()> {
        self.ensure_open()?;
        self.log.flush(true)
    }

    fn close(&self) -> CoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.log.close();
        self.lock.lock().take();
        result
    }
}

impl Drop for DurableStringEnumerator {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.log.close();
        }
    }
}

impl std::fmt::Debug for DurableStringEnumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStringEnumerator")
            .field("max_id", &self.max_id.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
