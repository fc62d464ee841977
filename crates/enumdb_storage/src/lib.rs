//! # enumdb storage
//!
//! Byte stores underneath the enumdb log and hash index.
//!
//! Backends are **opaque**: they know nothing about log frames, headers or
//! index slots. The enumerator owns every on-disk format; a backend only
//! reads, appends, overwrites in place and makes bytes durable.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - for tests and process-lifetime stores
//! - [`FileBackend`] - OS file, survives restarts
//!
//! ## Example
//!
//! ```rust
//! use enumdb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"alpha").unwrap();
//! backend.write_at(offset, b"A").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"Alpha");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
