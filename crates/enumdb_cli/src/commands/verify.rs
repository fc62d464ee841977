//! Verify command implementation.

use crate::commands::{display_key, open_store, CliResult, IndexMode, RawEnumerator};
use enumdb_core::Enumerator;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of records checked.
    pub records_checked: u32,
    /// Records whose key resolves to their own id.
    pub resolved: u32,
    /// Records repeating a key stored under an earlier id.
    pub duplicates: u32,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> CliResult<()> {
    println!("Verifying store at {}", path.display());
    println!();

    let store = open_store(path, IndexMode::AsFound, false)?;
    let result = verify(&store.enumerator)?;

    println!("  Records checked: {}", result.records_checked);
    println!("  Resolved:        {}", result.resolved);
    println!("  Duplicates:      {}", result.duplicates);
    for error in result.errors.iter().take(10) {
        println!("  - {error}");
    }
    if result.errors.len() > 10 {
        println!("  ... and {} more errors", result.errors.len() - 10);
    }

    println!();
    if result.is_ok() {
        println!("✓ Store verification passed");
        Ok(())
    } else {
        println!("✗ Store verification failed");
        Err("Verification failed".into())
    }
}

/// Looks every stored key up again and checks where it lands.
pub fn verify(enumerator: &RawEnumerator) -> CliResult<VerifyResult> {
    let mut result = VerifyResult::default();

    for item in enumerator.keys() {
        let (id, key) = match item {
            Ok(pair) => pair,
            Err(e) => {
                result.errors.push(format!("unreadable record: {e}"));
                break;
            }
        };
        result.records_checked += 1;

        match enumerator.try_enumerate(&key)? {
            Some(found) if found == id => result.resolved += 1,
            Some(found) if found < id => result.duplicates += 1,
            Some(found) => result.errors.push(format!(
                "{} {} resolves to later id {found}",
                id,
                display_key(&key)
            )),
            None => result
                .errors
                .push(format!("{} {} is missing from the index", id, display_key(&key))),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use enumdb_core::{AppendLog, BytesCodec, DurableEnumerator, DurableLog, InMemoryMultiMap};
    use enumdb_core::{DurableHashMap, IntMultiMap};

    #[test]
    fn consistent_store_passes() {
        let enumerator = DurableEnumerator::from_parts(
            Box::new(AppendLog::in_memory().unwrap()),
            Box::new(InMemoryMultiMap::new()),
            BytesCodec,
            true,
        )
        .unwrap();
        for key in ["a", "b", "Aa", "BB"] {
            enumerator.enumerate(&key.as_bytes().to_vec()).unwrap();
        }

        let result = verify(&enumerator).unwrap();
        assert_eq!(result.records_checked, 4);
        assert_eq!(result.resolved, 4);
        assert!(result.is_ok());
    }

    #[test]
    fn unindexed_records_reported() {
        let log = AppendLog::in_memory().unwrap();
        log.append(b"alpha").unwrap();
        let index = DurableHashMap::in_memory(16).unwrap();
        index.put(12345, enumdb_core::Id::new(1)).unwrap();

        // The index is non-empty and as large as the log, so no recovery runs.
        let enumerator =
            DurableEnumerator::from_parts(Box::new(log), Box::new(index), BytesCodec, false)
                .unwrap();
        let result = verify(&enumerator).unwrap();
        assert_eq!(result.records_checked, 1);
        assert!(!result.is_ok());
    }
}
