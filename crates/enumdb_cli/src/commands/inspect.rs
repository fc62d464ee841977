//! Inspect command implementation.

use crate::commands::{open_store, CliResult, IndexMode};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Key log path.
    pub path: String,
    /// Key log size in bytes.
    pub log_size: u64,
    /// Index file size in bytes (0 without a durable index).
    pub index_size: u64,
    /// Number of stored keys.
    pub records: u32,
    /// Number of (hash, id) pairs in the index.
    pub index_entries: usize,
    /// Whether the index is persisted.
    pub index_durable: bool,
    /// Data version stamped in the log.
    pub data_version: u32,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let store = open_store(path, IndexMode::AsFound, false)?;
    let stats = store.enumerator.stats()?;
    let index_size = if stats.index_durable {
        std::fs::metadata(&store.paths.index)?.len()
    } else {
        0
    };

    let result = InspectResult {
        path: store.paths.log.display().to_string(),
        log_size: stats.log_bytes,
        index_size,
        records: stats.records,
        index_entries: stats.index_entries,
        index_durable: stats.index_durable,
        data_version: stats.data_version,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("enumdb Store Inspection");
    println!("=======================");
    println!();
    println!("Path: {}", result.path);
    println!("Data version: {}", result.data_version);
    println!();
    println!("Storage:");
    println!("  Log size:    {}", format_size(result.log_size));
    if result.index_durable {
        println!("  Index size:  {}", format_size(result.index_size));
    } else {
        println!("  Index:       in memory");
    }
    println!();
    println!("Keys:");
    println!("  Records:       {}", result.records);
    println!("  Index entries: {}", result.index_entries);
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
