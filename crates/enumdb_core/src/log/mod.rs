//! Append-only key log.
//!
//! The log is the source of truth: the index can always be rebuilt from it.
//!
//! ## File Format
//!
//! ```text
//! | header (16) | frame 1 | frame 2 | ... |
//!
//! header: | magic "EDBL" (4) | format version (2) | reserved (2) | data version (4) | reserved (4) |
//! frame:  | payload_len (4) | crc32 (4) | payload (N) |
//! ```
//!
//! Frame *i* (1-based) holds the serialized key that owns id *i*. Frames are
//! never rewritten.
//!
//! ## Recovery Policy
//!
//! - **Torn tail** (incomplete frame header or payload at the end): the
//!   append never completed, so the bytes are trimmed at open
//! - **Torn header** on an otherwise empty file: rewritten as fresh
//! - **CRC mismatch** on a complete frame, bad magic, unknown format
//!   version: fatal, the store must not be used

mod append;
mod header;
mod record;

pub use append::AppendLog;
pub use header::{LogHeader, LOG_HEADER_LEN};
pub use record::FRAME_HEADER_LEN;

use crate::error::CoreResult;
use crate::types::Id;

/// Durable sequential record store consumed by the enumerators.
///
/// Record ids are dense, start at 1 and follow append order, so they can be
/// re-derived from the log alone.
pub trait DurableLog: Send + Sync {
    /// Appends one record and returns its id.
    fn append(&self, bytes: &[u8]) -> CoreResult<Id>;

    /// Reads the record with the given id.
    ///
    /// # Errors
    ///
    /// [`crate::CoreError::UnknownId`] for ids the log never assigned.
    fn read(&self, id: Id) -> CoreResult<Vec<u8>>;

    /// Visits every record in append order.
    ///
    /// Returns `Ok(false)` if `visit` stopped the walk, `Ok(true)` once the
    /// records are exhausted. Records appended during the walk are not seen.
    fn for_each_record(
        &self,
        visit: &mut dyn FnMut(Id, &[u8]) -> CoreResult<bool>,
    ) -> CoreResult<bool>;

    /// Number of records.
    fn len(&self) -> u32;

    /// Returns true if no record was ever appended.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Data version stamped in the header (0 when never stamped).
    fn data_version(&self) -> u32;

    /// Stamps the data version and makes it durable.
    fn set_data_version(&self, version: u32) -> CoreResult<()>;

    /// Pushes buffered appends to the OS; `force` also syncs to disk.
    fn flush(&self, force: bool) -> CoreResult<()>;

    /// Syncs and releases the log. Later calls fail with `Closed`.
    fn close(&self) -> CoreResult<()>;

    /// Size of the log in bytes, header included.
    fn size_bytes(&self) -> CoreResult<u64>;
}
