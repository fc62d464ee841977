//! Process-lifetime multimap.

use crate::error::{CoreError, CoreResult};
use crate::index::{check_entry, IntMultiMap};
use crate::types::{Id, KeyHash};
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory multimap guarded by a single mutex.
///
/// Nothing is persisted: pair it with a log replay at open.
#[derive(Debug, Default)]
pub struct InMemoryMultiMap {
    inner: Mutex<Buckets>,
}

#[derive(Debug, Default)]
struct Buckets {
    buckets: HashMap<KeyHash, Vec<Id>>,
    count: usize,
}

impl Buckets {
    fn insert(&mut self, hash: KeyHash, id: Id) {
        let ids = self.buckets.entry(hash).or_default();
        if !ids.contains(&id) {
            ids.push(id);
            self.count += 1;
        }
    }

    fn find(
        &self,
        hash: KeyHash,
        accept: &mut dyn FnMut(Id) -> CoreResult<bool>,
    ) -> CoreResult<Option<Id>> {
        let Some(ids) = self.buckets.get(&hash) else {
            return Ok(None);
        };
        for &id in ids {
            if accept(id)? {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}

impl InMemoryMultiMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IntMultiMap for InMemoryMultiMap {
    fn put(&self, hash: KeyHash, id: Id) -> CoreResult<()> {
        check_entry(hash, id)?;
        self.inner.lock().insert(hash, id);
        Ok(())
    }

    fn lookup(
        &self,
        hash: KeyHash,
        accept: &mut dyn FnMut(Id) -> CoreResult<bool>,
    ) -> CoreResult<Option<Id>> {
        self.inner.lock().find(hash, accept)
    }

    fn lookup_or_insert(
        &self,
        hash: KeyHash,
        accept: &mut dyn FnMut(Id) -> CoreResult<bool>,
        create: &mut dyn FnMut(KeyHash) -> CoreResult<Id>,
    ) -> CoreResult<Id> {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.find(hash, accept)? {
            return Ok(id);
        }

        let id = create(hash)?;
        check_entry(hash, id).map_err(|_| {
            CoreError::invalid_operation(format!("create returned {id} for hash {hash}"))
        })?;
        inner.insert(hash, id);
        Ok(id)
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(KeyHash, Id)) -> CoreResult<()> {
        let inner = self.inner.lock();
        for (&hash, ids) in &inner.buckets {
            for &id in ids {
                visit(hash, id);
            }
        }
        Ok(())
    }

    fn retain(&self, keep: &mut dyn FnMut(KeyHash, Id) -> bool) -> CoreResult<usize> {
        let mut inner = self.inner.lock();
        let mut removed = 0;
        inner.buckets.retain(|&hash, ids| {
            let before = ids.len();
            ids.retain(|&id| keep(hash, id));
            removed += before - ids.len();
            !ids.is_empty()
        });
        inner.count -= removed;
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.inner.lock().count
    }

    fn clear(&self) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        inner.buckets.clear();
        inner.count = 0;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn flush(&self) -> CoreResult<()> {
        Ok(())
    }

    fn close(&self) -> CoreResult<()> {
        Ok(())
    }
}
