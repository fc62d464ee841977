//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// A store that lives only as long as the process.
///
/// Useful for tests, and for simulating crashes: [`InMemoryBackend::with_data`]
/// lets a test hand a damaged byte image straight to the log or index.
///
/// ```rust
/// use enumdb_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// assert_eq!(backend.append(b"alpha").unwrap(), 0);
/// assert_eq!(backend.size().unwrap(), 5);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> StorageResult<()> {
        let data = self.data.get_mut();
        let size = data.len() as u64;
        if offset > size {
            return Err(StorageError::WritePastEnd {
                offset,
                len: bytes.len(),
                size,
            });
        }

        let start = offset as usize;
        let end = start + bytes.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let data = self.data.get_mut();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let data = self.data.get_mut();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(backend.data().is_empty());
    }

    #[test]
    fn append_returns_offsets() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"alpha").unwrap(), 0);
        assert_eq!(backend.append(b"beta").unwrap(), 5);
        assert_eq!(backend.read_at(5, 4).unwrap(), b"beta");
    }

    #[test]
    fn read_extending_past_end_fails() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"alpha").unwrap();
        assert!(matches!(
            backend.read_at(3, 10),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn write_at_in_place() {
        let mut backend = InMemoryBackend::with_data(vec![0; 4]);
        backend.write_at(1, &[9, 9]).unwrap();
        assert_eq!(backend.data(), vec![0, 9, 9, 0]);

        backend.write_at(4, &[5]).unwrap();
        assert_eq!(backend.size().unwrap(), 5);

        assert!(backend.write_at(7, &[1]).is_err());
    }

    #[test]
    fn truncate_behaviour() {
        let mut backend = InMemoryBackend::with_data(b"alphabeta".to_vec());
        backend.truncate(5).unwrap();
        assert_eq!(backend.data(), b"alpha");
        assert!(backend.truncate(50).is_err());
    }

    proptest! {
        #[test]
        fn appended_chunks_read_back(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..16)) {
            let mut backend = InMemoryBackend::new();
            let offsets: Vec<u64> = chunks.iter().map(|c| backend.append(c).unwrap()).collect();
            for (chunk, offset) in chunks.iter().zip(offsets) {
                prop_assert_eq!(&backend.read_at(offset, chunk.len()).unwrap(), chunk);
            }
        }
    }
}
