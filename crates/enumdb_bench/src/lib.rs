//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate `count` random alphanumeric keys of `len` characters.
///
/// Seeded, so every run benchmarks the same keys.
pub fn random_keys(count: usize, len: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    (0..count)
        .map(|_| {
            (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect()
        })
        .collect()
}

/// Generate `count` random non-zero hashes.
pub fn random_hashes(count: usize) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(0x4a54);
    (0..count)
        .map(|_| loop {
            let hash: i32 = rng.gen();
            if hash != 0 {
                break hash;
            }
        })
        .collect()
}
