//! Enumerators: the key → id surface callers use.
//!
//! - [`DurableEnumerator`] composes any [`crate::DurableLog`],
//!   [`crate::IntMultiMap`] and [`crate::KeyCodec`]
//! - [`DurableStringEnumerator`] is a self-contained string variant with an
//!   inline in-memory index

mod durable;
mod string;

pub use durable::{DurableEnumerator, Keys};
pub use string::DurableStringEnumerator;

use crate::error::CoreResult;
use crate::types::Id;

/// Assigns every distinct key a stable id.
///
/// # Guarantees
///
/// - Equal keys (by the codec's equality) always get the same id, across
///   reopen and concurrent callers
/// - Distinct keys never share an id
/// - `value_of(enumerate(k))` is equal to `k`
pub trait Enumerator<K>: Send + Sync {
    /// Returns the id of `key`, assigning the next id on first sight.
    fn enumerate(&self, key: &K) -> CoreResult<Id>;

    /// Like [`Enumerator::enumerate`], mapping an absent key to [`Id::NULL`].
    fn enumerate_optional(&self, key: Option<&K>) -> CoreResult<Id> {
        match key {
            Some(key) => self.enumerate(key),
            None => Ok(Id::NULL),
        }
    }

    /// Returns the id of `key` without ever assigning one.
    fn try_enumerate(&self, key: &K) -> CoreResult<Option<Id>>;

    /// Returns the key owning `id`; `None` for [`Id::NULL`].
    fn value_of(&self, id: Id) -> CoreResult<Option<K>>;

    /// Visits every stored key in id order.
    ///
    /// Returns `Ok(false)` if `visit` stopped early, `Ok(true)` otherwise.
    fn process_all_data_objects(
        &self,
        visit: &mut dyn FnMut(K) -> CoreResult<bool>,
    ) -> CoreResult<bool>;

    /// Number of assigned ids.
    fn len(&self) -> u32;

    /// Returns true if no id was ever assigned.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes every assigned id durable.
    fn flush(&self) -> CoreResult<()>;

    /// Flushes and releases the store. Later calls fail with
    /// [`crate::CoreError::Closed`]; closing twice is a no-op.
    fn close(&self) -> CoreResult<()>;
}
