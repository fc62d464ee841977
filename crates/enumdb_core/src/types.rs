//! Ids, hashes and the sentinel-avoidance remap.

use std::fmt;

/// A key's enumerated identifier.
///
/// Ids are dense and start at 1: id *i* is the *i*-th record of the key log.
/// [`Id::NULL`] (0) means "no key" and is never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Id(u32);

impl Id {
    /// The "no key" sentinel.
    pub const NULL: Self = Self(0);

    /// Creates an id from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns true for [`Id::NULL`].
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Zero-based position of the record in the log.
    ///
    /// Only meaningful for non-null ids.
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 32-bit key hash as stored in the index.
pub type KeyHash = i32;

/// Stand-in used for keys whose natural hash is the reserved value 0.
pub const HASH_STAND_IN: KeyHash = -1;

/// Remaps the reserved hash 0 to [`HASH_STAND_IN`].
///
/// The durable index marks empty slots with hash 0. Keys hashing to 0 share
/// a bucket with keys hashing to -1; the equality check behind every lookup
/// keeps that a collision rather than a wrong answer.
#[must_use]
pub const fn adjust_hash(hash: KeyHash) -> KeyHash {
    if hash == 0 {
        HASH_STAND_IN
    } else {
        hash
    }
}

/// Stable 31-multiplier polynomial hash over bytes.
///
/// Hashes end up on disk, so they must not depend on process-randomized
/// hashers.
#[must_use]
pub fn polynomial_hash(bytes: &[u8]) -> KeyHash {
    bytes
        .iter()
        .fold(0i32, |h, &b| h.wrapping_mul(31).wrapping_add(i32::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_id() {
        assert!(Id::NULL.is_null());
        assert!(!Id::new(1).is_null());
        assert_eq!(Id::default(), Id::NULL);
        assert_eq!(Id::new(3).index(), 2);
        assert_eq!(Id::new(7).to_string(), "#7");
    }

    #[test]
    fn adjust_only_touches_zero() {
        assert_eq!(adjust_hash(0), HASH_STAND_IN);
        assert_eq!(adjust_hash(5), 5);
        assert_eq!(adjust_hash(-1), -1);
        assert_eq!(adjust_hash(i32::MIN), i32::MIN);
    }

    #[test]
    fn polynomial_hash_values() {
        assert_eq!(polynomial_hash(b""), 0);
        assert_eq!(polynomial_hash(b"a"), 97);
        assert_eq!(polynomial_hash(b"ab"), 97 * 31 + 98);
        // Classic collision pair.
        assert_eq!(polynomial_hash(b"Aa"), polynomial_hash(b"BB"));
    }
}
