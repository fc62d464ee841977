//! Hash → candidate-id multimaps.
//!
//! The enumerators only see [`IntMultiMap`]; which implementation sits
//! behind it is chosen at open time:
//!
//! - [`InMemoryMultiMap`]: one mutex over a `HashMap`, rebuilt from the log
//!   on every open
//! - [`DurableHashMap`]: open-addressing table persisted in its own file,
//!   so reopening skips the replay
//!
//! Hashes handed to a map must already be passed through
//! [`crate::adjust_hash`]; the reserved value 0 is rejected.

mod durable;
mod memory;

pub use durable::DurableHashMap;
pub use memory::InMemoryMultiMap;

use crate::error::{CoreError, CoreResult};
use crate::types::{Id, KeyHash};

/// A mapping from a 32-bit key hash to a set of ids.
///
/// Candidates sharing a hash come back in unspecified order; the `accept`
/// callback decides which (if any) really belongs to the queried key.
pub trait IntMultiMap: Send + Sync {
    /// Associates `id` with `hash`. Exact duplicates are ignored.
    fn put(&self, hash: KeyHash, id: Id) -> CoreResult<()>;

    /// Returns the first candidate for `hash` that `accept` approves.
    fn lookup(
        &self,
        hash: KeyHash,
        accept: &mut dyn FnMut(Id) -> CoreResult<bool>,
    ) -> CoreResult<Option<Id>>;

    /// Looks up `hash`; on a miss calls `create` once and stores its id.
    ///
    /// The lookup, the `create` call and the insert form one critical
    /// section: racing callers for equal keys never both create.
    fn lookup_or_insert(
        &self,
        hash: KeyHash,
        accept: &mut dyn FnMut(Id) -> CoreResult<bool>,
        create: &mut dyn FnMut(KeyHash) -> CoreResult<Id>,
    ) -> CoreResult<Id>;

    /// Visits every stored pair, in no particular order.
    fn for_each_entry(&self, visit: &mut dyn FnMut(KeyHash, Id)) -> CoreResult<()>;

    /// Keeps only the pairs `keep` approves. Returns how many were removed.
    fn retain(&self, keep: &mut dyn FnMut(KeyHash, Id) -> bool) -> CoreResult<usize>;

    /// Number of stored (hash, id) pairs.
    fn len(&self) -> usize;

    /// Returns true if no pair is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every pair.
    fn clear(&self) -> CoreResult<()>;

    /// Whether the pairs survive a restart.
    fn is_durable(&self) -> bool;

    /// Makes stored pairs durable. No-op for in-memory maps.
    fn flush(&self) -> CoreResult<()>;

    /// Flushes and releases the map.
    fn close(&self) -> CoreResult<()>;
}

/// Rejects the reserved hash and the null id at the map boundary.
pub(crate) fn check_entry(hash: KeyHash, id: Id) -> CoreResult<()> {
    if hash == 0 {
        return Err(CoreError::invalid_operation(
            "hash 0 is reserved; pass hashes through adjust_hash",
        ));
    }
    if id.is_null() {
        return Err(CoreError::invalid_operation("cannot index the null id"));
    }
    Ok(())
}
