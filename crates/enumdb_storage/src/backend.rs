//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store.
///
/// Two access patterns sit on top of it: the append-only key log (which only
/// ever appends, apart from stamping its header) and the hash index (which
/// overwrites fixed-size slots in place).
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes last written at that range
/// - `write_at` never leaves a hole: `offset` must not exceed `size()`
/// - after `sync` returns, everything written so far survives a crash
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range is not fully
    /// inside the store, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Overwrites bytes starting at `offset`.
    ///
    /// The write may run past the current end, in which case the store grows.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::WritePastEnd`] if `offset > size()`.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Appends data to the end of the store and returns its offset.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the OS.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes (the offset of the next append).
    fn size(&self) -> StorageResult<u64>;

    /// Makes data and metadata durable.
    fn sync(&mut self) -> StorageResult<()>;

    /// Drops everything after `new_size`.
    ///
    /// Used to trim a torn record off the log tail and to empty an index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::InvalidTruncate`] if `new_size` is
    /// larger than the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
