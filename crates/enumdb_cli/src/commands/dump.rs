//! Dump command implementation.

use crate::commands::{display_key, open_store, CliResult, IndexMode, RawEnumerator};
use serde::Serialize;
use std::path::Path;

/// One dumped key.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DumpEntry {
    /// Id owning the key.
    pub id: u32,
    /// Key length in bytes.
    pub len: usize,
    /// Rendered key.
    pub key: String,
}

/// Runs the dump command.
pub fn run(path: &Path, limit: Option<usize>, start: u32, format: &str) -> CliResult<()> {
    let store = open_store(path, IndexMode::AsFound, false)?;
    let entries = collect(&store.enumerator, start, limit)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        _ => {
            for entry in &entries {
                println!("{:>8}  {:>6}B  {}", entry.id, entry.len, entry.key);
            }
            println!();
            println!("{} keys", entries.len());
        }
    }
    Ok(())
}

/// Reads keys from `start` on, at most `limit` of them.
pub fn collect(
    enumerator: &RawEnumerator,
    start: u32,
    limit: Option<usize>,
) -> CliResult<Vec<DumpEntry>> {
    let skip = start.saturating_sub(1) as usize;
    let mut entries = Vec::new();
    for item in enumerator.keys().skip(skip).take(limit.unwrap_or(usize::MAX)) {
        let (id, key) = item?;
        entries.push(DumpEntry {
            id: id.as_u32(),
            len: key.len(),
            key: display_key(&key),
        });
    }
    Ok(entries)
}
