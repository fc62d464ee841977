//! # enumdb Testkit
//!
//! Test utilities for enumdb.
//!
//! This crate provides:
//! - Temporary store fixtures
//! - Crash simulation: a storage backend that dies mid-write, and helpers
//!   that damage store files the way an interrupted process would
//! - Concurrency stress helpers
//! - Property-based key generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use enumdb_testkit::prelude::*;
//!
//! #[test]
//! fn survives_reopen() {
//!     let store = TempStore::new();
//!     let names = store.open_strings();
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
