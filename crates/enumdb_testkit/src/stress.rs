//! Stress helpers.
//!
//! These drive an enumerator from many threads and check that every thread
//! saw the same id for the same key.

use enumdb_core::{Enumerator, Id};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct keys.
    pub keys: usize,
    /// Passes each thread makes over the key set.
    pub rounds: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            keys: 500,
            rounds: 3,
        }
    }
}

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total `enumerate` calls.
    pub total_ops: usize,
    /// Calls that returned an error.
    pub failed_ops: usize,
    /// Keys for which two calls returned different ids.
    pub disagreements: usize,
    /// Distinct ids handed out.
    pub distinct_ids: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Returns true when no call failed and all threads agreed.
    pub fn is_consistent(&self) -> bool {
        self.failed_ops == 0 && self.disagreements == 0
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Disagreements: {}", self.disagreements);
        println!("Distinct ids: {}", self.distinct_ids);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Enumerates the same key set from `config.threads` threads at once.
///
/// Each thread walks the keys starting at a different offset, so threads
/// race on first sight of every key.
pub fn concurrent_enumerate<E>(enumerator: Arc<E>, config: &StressConfig) -> StressTestResult
where
    E: Enumerator<String> + 'static,
{
    let keys: Arc<Vec<String>> = Arc::new((0..config.keys).map(|i| format!("stress-{i}")).collect());
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let enumerator = Arc::clone(&enumerator);
            let keys = Arc::clone(&keys);
            let rounds = config.rounds;
            thread::spawn(move || {
                let mut seen: HashMap<usize, Id> = HashMap::new();
                let mut failed = 0;
                let mut disagreements = 0;
                let offset = t * keys.len() / 7 + t;
                for _ in 0..rounds {
                    for i in 0..keys.len() {
                        let k = (i + offset) % keys.len();
                        match enumerator.enumerate(&keys[k]) {
                            Ok(id) => {
                                if *seen.entry(k).or_insert(id) != id {
                                    disagreements += 1;
                                }
                            }
                            Err(_) => failed += 1,
                        }
                    }
                }
                (seen, failed, disagreements)
            })
        })
        .collect();

    let mut merged: HashMap<usize, Id> = HashMap::new();
    let mut failed_ops = 0;
    let mut disagreements = 0;
    for handle in handles {
        let (seen, failed, local) = handle.join().expect("stress thread panicked");
        failed_ops += failed;
        disagreements += local;
        for (k, id) in seen {
            if *merged.entry(k).or_insert(id) != id {
                disagreements += 1;
            }
        }
    }

    let duration = start.elapsed();
    let total_ops = config.threads * config.rounds * config.keys;
    let mut ids: Vec<Id> = merged.values().copied().collect();
    ids.sort_unstable();
    ids.dedup();

    StressTestResult {
        total_ops,
        failed_ops,
        disagreements,
        distinct_ids: ids.len(),
        duration,
        ops_per_second: if duration.as_secs_f64() > 0.0 {
            total_ops as f64 / duration.as_secs_f64()
        } else {
            0.0
        },
    }
}
