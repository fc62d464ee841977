//! Append-only log over a storage backend.

use crate::error::{CoreError, CoreResult};
use crate::log::header::{LogHeader, DATA_VERSION_OFFSET, LOG_HEADER_LEN, LOG_MAGIC};
use crate::log::record::{decode_frame_header, encode_frame, frame_checksum, FRAME_HEADER_LEN};
use crate::log::DurableLog;
use crate::types::Id;
use enumdb_storage::{InMemoryBackend, StorageBackend};
use parking_lot::RwLock;
use tracing::{debug, warn};

/// Read chunk used while scanning frames at open.
const SCAN_CHUNK_SIZE: usize = 64 * 1024;

/// The key log: framed records behind a versioned header.
///
/// Appends take the write lock, reads share the read lock, so concurrent
/// `append` and `read` never observe a half-written frame. The id → offset
/// table is rebuilt by scanning the frames at open.
///
/// A failed append is rolled back to the previous end of the log, so the
/// offset table and the file never disagree on which record owns an id. If
/// the rollback fails too, the log refuses further appends until reopened.
pub struct AppendLog {
    state: RwLock<LogState>,
    sync_on_append: bool,
}

struct LogState {
    backend: Box<dyn StorageBackend>,
    header: LogHeader,
    /// `offsets[i]` is the frame offset of id `i + 1`.
    offsets: Vec<u64>,
    /// Set when a failed append could not be rolled back.
    poisoned: bool,
    closed: bool,
}

impl AppendLog {
    /// Opens a log over `backend`, creating the header if the store is empty.
    ///
    /// A torn tail is trimmed; any other damage fails the open.
    pub fn open(mut backend: Box<dyn StorageBackend>, sync_on_append: bool) -> CoreResult<Self> {
        let size = backend.size()?;

        let header = if size < LOG_HEADER_LEN as u64 {
            if size > 0 {
                let present = backend.read_at(0, size as usize)?;
                let check = present.len().min(LOG_MAGIC.len());
                if present[..check] != LOG_MAGIC[..check] {
                    return Err(CoreError::log_corruption("not a key log: bad magic"));
                }
                warn!(size, "discarding torn log header");
                backend.truncate(0)?;
            }
            let header = LogHeader::fresh();
            backend.append(&header.encode())?;
            backend.sync()?;
            header
        } else {
            LogHeader::decode(&backend.read_at(0, LOG_HEADER_LEN)?)?
        };

        let offsets = scan_frames(backend.as_mut())?;
        debug!(
            records = offsets.len(),
            data_version = header.data_version,
            "opened key log"
        );

        Ok(Self {
            state: RwLock::new(LogState {
                backend,
                header,
                offsets,
                poisoned: false,
                closed: false,
            }),
            sync_on_append,
        })
    }

    /// Opens a fresh log that lives only in memory.
    pub fn in_memory() -> CoreResult<Self> {
        Self::open(Box::new(InMemoryBackend::new()), false)
    }

    /// Byte offset of the frame holding `id`.
    #[must_use]
    pub fn record_offset(&self, id: Id) -> Option<u64> {
        if id.is_null() {
            return None;
        }
        self.state.read().offsets.get(id.index()).copied()
    }

    /// Returns true once [`DurableLog::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }
}

/// Walks the frames after the header and returns their offsets.
fn scan_frames(backend: &mut dyn StorageBackend) -> CoreResult<Vec<u64>> {
    let size = backend.size()?;
    let mut offsets = Vec::new();
    let mut offset = LOG_HEADER_LEN as u64;

    {
        let mut reader = ChunkReader::new(&*backend);
        while offset < size {
            if offset + FRAME_HEADER_LEN as u64 > size {
                break;
            }
            let (len, expected) = decode_frame_header(reader.bytes(offset, FRAME_HEADER_LEN)?);
            let payload_at = offset + FRAME_HEADER_LEN as u64;
            if payload_at + u64::from(len) > size {
                break;
            }

            let actual = frame_checksum(len, reader.bytes(payload_at, len as usize)?);
            if actual != expected {
                // Files extended but never written read back as zeros.
                if zero_filled(&*backend, offset, size)? {
                    break;
                }
                return Err(CoreError::ChecksumMismatch {
                    offset,
                    expected,
                    actual,
                });
            }
            if offsets.len() >= u32::MAX as usize {
                return Err(CoreError::IdSpaceExhausted {
                    count: offsets.len() as u64,
                });
            }

            offsets.push(offset);
            offset = payload_at + u64::from(len);
        }
    }

    if offset < size {
        warn!(
            valid_end = offset,
            torn_bytes = size - offset,
            "trimming torn record from log tail"
        );
        backend.truncate(offset)?;
        backend.sync()?;
    }

    Ok(offsets)
}

/// Returns true if every byte in `from..to` is zero.
fn zero_filled(backend: &dyn StorageBackend, from: u64, to: u64) -> CoreResult<bool> {
    let mut at = from;
    while at < to {
        let len = (to - at).min(SCAN_CHUNK_SIZE as u64) as usize;
        if backend.read_at(at, len)?.iter().any(|&b| b != 0) {
            return Ok(false);
        }
        at += len as u64;
    }
    Ok(true)
}

/// Buffered sequential reader used by the open-time scan.
struct ChunkReader<'a> {
    backend: &'a dyn StorageBackend,
    buffer: Vec<u8>,
    buffer_start: u64,
}

impl<'a> ChunkReader<'a> {
    fn new(backend: &'a dyn StorageBackend) -> Self {
        Self {
            backend,
            buffer: Vec::new(),
            buffer_start: 0,
        }
    }

    /// Returns `len` bytes at `offset`; the caller has checked the range.
    fn bytes(&mut self, offset: u64, len: usize) -> CoreResult<&[u8]> {
        let buffer_end = self.buffer_start + self.buffer.len() as u64;
        if offset < self.buffer_start || offset + len as u64 > buffer_end {
            let available = self.backend.size()?.saturating_sub(offset);
            let want = (len.max(SCAN_CHUNK_SIZE) as u64).min(available) as usize;
            self.buffer = self.backend.read_at(offset, want)?;
            self.buffer_start = offset;
        }
        let start = (offset - self.buffer_start) as usize;
        Ok(&self.buffer[start..start + len])
    }
}

impl DurableLog for AppendLog {
    fn append(&self, bytes: &[u8]) -> CoreResult<Id> {
        let mut state = self.state.write();
        if state.closed {
            return Err(CoreError::Closed);
        }
        if state.offsets.len() >= u32::MAX as usize {
            return Err(CoreError::IdSpaceExhausted {
                count: state.offsets.len() as u64,
            });
        }

        if state.poisoned {
            return Err(CoreError::invalid_operation(
                "key log append failed and could not be rolled back; reopen the store",
            ));
        }

        let end = state.backend.size()?;
        let mut written = state.backend.append(&encode_frame(bytes));
        if written.is_ok() && self.sync_on_append {
            written = state.backend.sync().map(|()| end);
        }
        match written {
            Ok(offset) => {
                state.offsets.push(offset);
                Ok(Id::new(state.offsets.len() as u32))
            }
            Err(err) => {
                if let Err(undo) = state.backend.truncate(end) {
                    warn!(end, error = %undo, "could not roll back failed append");
                    state.poisoned = true;
                } else {
                    debug!(end, error = %err, "rolled back failed append");
                }
                Err(err.into())
            }
        }
    }

    fn read(&self, id: Id) -> CoreResult<Vec<u8>> {
        let state = self.state.read();
        if state.closed {
            return Err(CoreError::Closed);
        }
        let len = state.offsets.len() as u32;
        if id.is_null() || id.as_u32() > len {
            return Err(CoreError::UnknownId {
                id: id.as_u32(),
                len,
            });
        }

        let offset = state.offsets[id.index()];
        let (payload_len, expected) =
            decode_frame_header(&state.backend.read_at(offset, FRAME_HEADER_LEN)?);
        let payload = state
            .backend
            .read_at(offset + FRAME_HEADER_LEN as u64, payload_len as usize)?;

        let actual = frame_checksum(payload_len, &payload);
        if actual != expected {
            return Err(CoreError::ChecksumMismatch {
                offset,
                expected,
                actual,
            });
        }
        Ok(payload)
    }

    fn for_each_record(
        &self,
        visit: &mut dyn FnMut(Id, &[u8]) -> CoreResult<bool>,
    ) -> CoreResult<bool> {
        // Snapshot the count and read record by record, so `visit` may call
        // back into the log without deadlocking on the state lock.
        let count = self.len();
        for raw in 1..=count {
            let id = Id::new(raw);
            let bytes = self.read(id)?;
            if !visit(id, &bytes)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn len(&self) -> u32 {
        self.state.read().offsets.len() as u32
    }

    fn data_version(&self) -> u32 {
        self.state.read().header.data_version
    }

    fn set_data_version(&self, version: u32) -> CoreResult<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(CoreError::Closed);
        }
        state
            .backend
            .write_at(DATA_VERSION_OFFSET, &version.to_le_bytes())?;
        state.backend.sync()?;
        state.header.data_version = version;
        Ok(())
    }

    fn flush(&self, force: bool) -> CoreResult<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(CoreError::Closed);
        }
        if force {
            state.backend.sync()?;
        } else {
            state.backend.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> CoreResult<()> {
        let mut state = self.state.write();
        if state.closed {
            return Ok(());
        }
        state.backend.sync()?;
        state.closed = true;
        Ok(())
    }

    fn size_bytes(&self) -> CoreResult<u64> {
        Ok(self.state.read().backend.size()?)
    }
}

impl std::fmt::Debug for AppendLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("AppendLog")
            .field("records", &state.offsets.len())
            .field("data_version", &state.header.data_version)
            .field("sync_on_append", &self.sync_on_append)
            .field("poisoned", &state.poisoned)
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}
