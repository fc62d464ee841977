//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod rebuild_index;
pub mod verify;

use enumdb_core::{
    AppendLog, BytesCodec, DurableEnumerator, DurableHashMap, InMemoryMultiMap, IntMultiMap,
    StoreLock, StorePaths,
};
use enumdb_storage::FileBackend;
use std::path::Path;

/// Result type shared by the commands.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Keys are handled as raw bytes: every bundled codec hashes its encoding
/// the same way, so the tools work on any store.
pub type RawEnumerator = DurableEnumerator<Vec<u8>, BytesCodec>;

/// An open store plus the lock that keeps other writers out.
pub struct Store {
    /// Store file locations.
    pub paths: StorePaths,
    /// Byte-keyed view of the store.
    pub enumerator: RawEnumerator,
    _lock: StoreLock,
}

/// How the index is treated while opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Use the index as found; an absent index file means an in-memory one.
    AsFound,
    /// Use the durable index, creating the file if needed.
    Durable,
}

/// Opens an existing store without stamping or checking its data version.
pub fn open_store(base: &Path, mode: IndexMode, rebuild_if_inconsistent: bool) -> CliResult<Store> {
    let paths = StorePaths::new(base);
    if !paths.log.exists() {
        return Err(format!("No key log found at {}", paths.log.display()).into());
    }
    let lock = StoreLock::acquire(&paths.lock)?;

    let log = AppendLog::open(Box::new(FileBackend::open(&paths.log)?), false)?;
    let durable = mode == IndexMode::Durable || paths.index.exists();
    let index: Box<dyn IntMultiMap> = if durable {
        Box::new(DurableHashMap::open_file(&paths.index, 1024)?)
    } else {
        Box::new(InMemoryMultiMap::new())
    };

    let enumerator =
        DurableEnumerator::from_parts(Box::new(log), index, BytesCodec, rebuild_if_inconsistent)?;
    Ok(Store {
        paths,
        enumerator,
        _lock: lock,
    })
}

/// Renders a key as text when it is printable UTF-8, as hex otherwise.
pub fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(text) if !text.chars().any(char::is_control) => format!("{text:?}"),
        _ => {
            let hex: String = key.iter().map(|b| format!("{b:02x}")).collect();
            format!("0x{hex}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enumdb_core::{Enumerator, EnumeratorConfig, EnumeratorFactory, IndexKind, StringCodec};
    use tempfile::tempdir;

    #[test]
    fn display_key_text_and_binary() {
        assert_eq!(display_key(b"alpha"), "\"alpha\"");
        assert_eq!(display_key(&[0x00, 0xff]), "0x00ff");
        assert_eq!(display_key(b"tab\there"), "0x7461620968657265");
    }

    #[test]
    fn open_store_reads_string_store() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("names");
        {
            let names = EnumeratorFactory::default()
                .open(&base, StringCodec)
                .unwrap();
            names.enumerate(&"alpha".to_string()).unwrap();
            names.close().unwrap();
        }

        let store = open_store(&base, IndexMode::AsFound, false).unwrap();
        assert_eq!(
            store.enumerator.try_enumerate(&b"alpha".to_vec()).unwrap(),
            Some(enumdb_core::Id::new(1))
        );
    }

    #[test]
    fn open_store_without_index_file_uses_memory() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("names");
        {
            let factory =
                EnumeratorFactory::new(EnumeratorConfig::new().index_kind(IndexKind::InMemory));
            let names = factory.open(&base, StringCodec).unwrap();
            names.enumerate(&"alpha".to_string()).unwrap();
            names.close().unwrap();
        }

        let store = open_store(&base, IndexMode::AsFound, false).unwrap();
        assert!(!store.enumerator.stats().unwrap().index_durable);
        assert!(!store.paths.index.exists());
    }

    #[test]
    fn open_store_missing_log() {
        let dir = tempdir().unwrap();
        assert!(open_store(&dir.path().join("absent"), IndexMode::AsFound, false).is_err());
    }
}
