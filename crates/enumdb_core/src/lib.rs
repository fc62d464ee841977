//! # enumdb core
//!
//! A durable enumerator assigns every distinct key a stable, dense, non-zero
//! [`Id`] and remembers the mapping across restarts and crashes.
//!
//! Two structures back each store:
//! - an append-only key log ([`AppendLog`]): record *i* holds the key owning
//!   id *i*, and is the source of truth
//! - a hash → candidate-id multimap ([`IntMultiMap`]), either in memory
//!   ([`InMemoryMultiMap`], replayed from the log on every open) or on disk
//!   ([`DurableHashMap`], persisted next to the log as `<name>.hashToId`)
//!
//! ```rust,no_run
//! use enumdb_core::{Enumerator, EnumeratorFactory, StringCodec};
//! use std::path::Path;
//!
//! let factory = EnumeratorFactory::default();
//! let names = factory.open(Path::new("names"), StringCodec).unwrap();
//!
//! let alpha = names.enumerate(&"alpha".to_string()).unwrap();
//! assert_eq!(names.enumerate(&"alpha".to_string()).unwrap(), alpha);
//! assert_eq!(names.value_of(alpha).unwrap().as_deref(), Some("alpha"));
//! names.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod enumerator;
mod error;
mod factory;
mod index;
mod log;
mod stats;
mod types;

pub use codec::{BytesCodec, CborCodec, KeyCodec, StringCodec};
pub use config::{EnumeratorConfig, IndexKind};
pub use enumerator::{DurableEnumerator, DurableStringEnumerator, Enumerator, Keys};
pub use error::{CoreError, CoreResult};
pub use factory::{check_data_version, EnumeratorFactory, StoreLock, StorePaths};
pub use index::{DurableHashMap, InMemoryMultiMap, IntMultiMap};
pub use log::{AppendLog, DurableLog, LogHeader, FRAME_HEADER_LEN, LOG_HEADER_LEN};
pub use stats::EnumeratorStats;
pub use types::{adjust_hash, polynomial_hash, Id, KeyHash, HASH_STAND_IN};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
