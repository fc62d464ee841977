//! Key codecs: how a key is serialized, hashed and compared.

use crate::error::{CoreError, CoreResult};
use crate::log::DurableLog;
use crate::types::{polynomial_hash, Id, KeyHash};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Strategy supplied per enumerator for its key type.
///
/// # Contract
///
/// - `hash_code` must be stable across processes when a durable index is
///   used, and equal keys must hash equally
/// - `decode(encode(k))` must be equal to `k` under `are_equal`
///
/// All bundled codecs hash the encoded bytes with [`polynomial_hash`], which
/// lets tooling verify an index without knowing the key type.
pub trait KeyCodec<K>: Send + Sync {
    /// Serializes a key.
    fn encode(&self, key: &K) -> CoreResult<Vec<u8>>;

    /// Deserializes a key.
    fn decode(&self, bytes: &[u8]) -> CoreResult<K>;

    /// Hash of a key, before the sentinel remap.
    fn hash_code(&self, key: &K) -> KeyHash;

    /// Equality relation used to resolve hash collisions.
    fn are_equal(&self, a: &K, b: &K) -> bool;

    /// Serializes `key` and appends it to `log`, returning the new record id.
    fn save_to_log(&self, key: &K, log: &dyn DurableLog) -> CoreResult<Id> {
        let bytes = self.encode(key)?;
        log.append(&bytes)
    }
}

/// UTF-8 codec for `String` keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl KeyCodec<String> for StringCodec {
    fn encode(&self, key: &String) -> CoreResult<Vec<u8>> {
        Ok(key.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CoreError::key_codec(format!("invalid UTF-8 key: {e}")))
    }

    fn hash_code(&self, key: &String) -> KeyHash {
        polynomial_hash(key.as_bytes())
    }

    fn are_equal(&self, a: &String, b: &String) -> bool {
        a == b
    }

    fn save_to_log(&self, key: &String, log: &dyn DurableLog) -> CoreResult<Id> {
        log.append(key.as_bytes())
    }
}

/// Identity codec for raw byte keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl KeyCodec<Vec<u8>> for BytesCodec {
    fn encode(&self, key: &Vec<u8>) -> CoreResult<Vec<u8>> {
        Ok(key.clone())
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn hash_code(&self, key: &Vec<u8>) -> KeyHash {
        polynomial_hash(key)
    }

    fn are_equal(&self, a: &Vec<u8>, b: &Vec<u8>) -> bool {
        a == b
    }

    fn save_to_log(&self, key: &Vec<u8>, log: &dyn DurableLog) -> CoreResult<Id> {
        log.append(key)
    }
}

/// CBOR codec for small structured records.
///
/// The hash is taken over the encoding, so `T` must serialize
/// deterministically: structs, enums, tuples and `BTreeMap` do, `HashMap`
/// does not.
pub struct CborCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> CborCodec<T> {
    /// Creates a codec.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for CborCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CborCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for CborCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CborCodec")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> KeyCodec<T> for CborCodec<T>
where
    T: Serialize + DeserializeOwned + PartialEq,
{
    fn encode(&self, key: &T) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(key, &mut buf)
            .map_err(|e| CoreError::key_codec(format!("CBOR encode failed: {e}")))?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<T> {
        ciborium::from_reader(bytes)
            .map_err(|e| CoreError::key_codec(format!("CBOR decode failed: {e}")))
    }

    fn hash_code(&self, key: &T) -> KeyHash {
        // An unencodable key can never have been stored, so any hash works;
        // `save_to_log` reports the encode failure.
        self.encode(key).map(|bytes| polynomial_hash(&bytes)).unwrap_or(0)
    }

    fn are_equal(&self, a: &T, b: &T) -> bool {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Symbol {
        module: String,
        name: String,
        arity: u8,
    }

    #[test]
    fn string_codec_roundtrip_and_hash() {
        let codec = StringCodec;
        let key = "héllo".to_string();
        let bytes = codec.encode(&key).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), key);
        assert_eq!(codec.hash_code(&key), polynomial_hash(key.as_bytes()));
    }

    #[test]
    fn string_codec_rejects_invalid_utf8() {
        let result = StringCodec.decode(&[0xFF, 0xFE]);
        assert!(matches!(result, Err(CoreError::KeyCodec { .. })));
    }

    #[test]
    fn bytes_and_string_hash_agree() {
        let text = "shared".to_string();
        assert_eq!(
            StringCodec.hash_code(&text),
            BytesCodec.hash_code(&text.clone().into_bytes())
        );
    }

    #[test]
    fn cbor_codec_structured_key() {
        let codec = CborCodec::<Symbol>::new();
        let key = Symbol {
            module: "core".into(),
            name: "map".into(),
            arity: 2,
        };

        let bytes = codec.encode(&key).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), key);
        assert_eq!(codec.hash_code(&key), polynomial_hash(&bytes));
        assert!(codec.are_equal(&key, &key.clone()));
    }

    #[test]
    fn cbor_codec_rejects_garbage() {
        let codec = CborCodec::<Symbol>::new();
        assert!(codec.decode(&[0xFF]).is_err());
    }
}
