//! Property-based test generators using proptest.

use proptest::prelude::*;

/// Strategy for short printable keys, the empty string included.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_./-]{0,24}").expect("Invalid regex")
}

/// Strategy for arbitrary UTF-8 keys.
pub fn unicode_key_strategy() -> impl Strategy<Value = String> {
    any::<String>().prop_map(|s| s.chars().take(32).collect())
}

/// Strategy for a sequence of keys with repeats.
///
/// Keys are drawn from a small pool so that the same key shows up several
/// times in one sequence.
pub fn key_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(key_strategy(), 1..16).prop_flat_map(move |pool| {
        let pool_len = pool.len();
        prop::collection::vec(0..pool_len, 0..max_len)
            .prop_map(move |picks| picks.into_iter().map(|i| pool[i].clone()).collect())
    })
}

/// Strategy for arbitrary byte keys.
pub fn byte_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Distinct strings sharing one polynomial hash.
///
/// `"Aa"` and `"BB"` hash alike, so every string built from `blocks` of
/// them does too.
pub fn colliding_keys(blocks: u32) -> Vec<String> {
    (0..1u32 << blocks)
        .map(|mask| {
            (0..blocks)
                .map(|bit| if mask & (1 << bit) == 0 { "Aa" } else { "BB" })
                .collect()
        })
        .collect()
}

/// Strategy for a set of colliding keys (2 to 32 of them).
pub fn colliding_keys_strategy() -> impl Strategy<Value = Vec<String>> {
    (1u32..=5).prop_map(colliding_keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use enumdb_core::polynomial_hash;

    #[test]
    fn colliding_keys_share_a_hash() {
        let keys = colliding_keys(3);
        assert_eq!(keys.len(), 8);
        let hash = polynomial_hash(keys[0].as_bytes());
        assert!(keys.iter().all(|k| polynomial_hash(k.as_bytes()) == hash));

        let mut unique = keys.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), keys.len());
    }

    proptest! {
        #[test]
        fn key_sequences_stay_in_bounds(keys in key_sequence_strategy(50)) {
            prop_assert!(keys.len() < 50);
        }
    }
}
