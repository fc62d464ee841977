//! Error types for the enumerator.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the log, the index and the enumerators.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] enumdb_storage::StorageError),

    /// I/O error outside a storage backend (lock files, directories).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The log was stamped by an incompatible data format.
    #[error("data version mismatch: store has {found}, expected {expected}")]
    VersionMismatch {
        /// Version the opener expects.
        expected: u32,
        /// Version stamped in the log header.
        found: u32,
    },

    /// The key log cannot be interpreted.
    #[error("log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// The hash index file cannot be interpreted.
    #[error("index corruption: {message}")]
    IndexCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A complete log record failed its checksum.
    #[error("checksum mismatch at offset {offset}: stored {expected:08x}, computed {actual:08x}")]
    ChecksumMismatch {
        /// Byte offset of the record frame.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Recomputed checksum.
        actual: u32,
    },

    /// An id that the log never assigned.
    #[error("unknown id {id}: log holds {len} records")]
    UnknownId {
        /// The requested id.
        id: u32,
        /// Number of records in the log.
        len: u32,
    },

    /// A key could not be encoded or decoded.
    #[error("key codec error: {message}")]
    KeyCodec {
        /// Description of the failure.
        message: String,
    },

    /// The log has run out of 32-bit ids.
    #[error("id space exhausted: {count} records")]
    IdSpaceExhausted {
        /// Number of records already stored.
        count: u64,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation was rejected.
        message: String,
    },

    /// Another enumerator holds the store open.
    #[error("store locked: {path}")]
    StoreLocked {
        /// Path of the lock file.
        path: String,
    },

    /// The store does not exist and creation was disabled.
    #[error("store not found: {path}")]
    StoreNotFound {
        /// Path of the missing log.
        path: String,
    },

    /// The enumerator has been closed.
    #[error("enumerator is closed")]
    Closed,
}

impl CoreError {
    /// Creates a log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates an index corruption error.
    pub fn index_corruption(message: impl Into<String>) -> Self {
        Self::IndexCorruption {
            message: message.into(),
        }
    }

    /// Creates a key codec error.
    pub fn key_codec(message: impl Into<String>) -> Self {
        Self::KeyCodec {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
