//! Crash simulation.
//!
//! Two tools:
//!
//! 1. [`CrashableBackend`] wraps a storage backend and fails every write
//!    once a byte budget runs out, leaving the crossing write partially
//!    applied, as a killed process would. It can also inject one-off I/O
//!    errors ([`CrashSwitch::fail_next_write`], [`CrashSwitch::fail_next_sync`])
//!    after which the backend keeps working
//! 2. File helpers that damage a closed store the way an interrupted
//!    process or a lost page would: emptying or deleting the index,
//!    tearing the log tail, flipping a byte
//!
//! ## Usage
//!
//! ```rust,ignore
//! use enumdb_testkit::crash::{CrashSwitch, CrashableBackend};
//!
//! let switch = CrashSwitch::new();
//! let backend = CrashableBackend::new(Box::new(file_backend), switch.clone());
//! // ... hand the backend to a log or index, then:
//! switch.crash_after(40);
//! ```

use enumdb_core::StorePaths;
use enumdb_storage::{StorageBackend, StorageError, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct SwitchState {
    budget: AtomicUsize,
    written: AtomicUsize,
    crashed: AtomicBool,
    write_faults: AtomicUsize,
    sync_faults: AtomicUsize,
}

/// Shared trigger for a [`CrashableBackend`].
///
/// The backend is usually owned by a log or index by the time the test
/// wants to arm it, so the trigger lives behind a cloneable handle.
#[derive(Debug, Clone)]
pub struct CrashSwitch {
    state: Arc<SwitchState>,
}

impl CrashSwitch {
    /// Creates a disarmed switch.
    pub fn new() -> Self {
        Self {
            state: Arc::new(SwitchState {
                budget: AtomicUsize::new(usize::MAX),
                written: AtomicUsize::new(0),
                crashed: AtomicBool::new(false),
                write_faults: AtomicUsize::new(0),
                sync_faults: AtomicUsize::new(0),
            }),
        }
    }

    /// Lets `bytes` more bytes through, then crashes.
    pub fn crash_after(&self, bytes: usize) {
        self.state.written.store(0, Ordering::SeqCst);
        self.state.budget.store(bytes, Ordering::SeqCst);
    }

    /// Fails the next write with half of it applied; later writes succeed.
    pub fn fail_next_write(&self) {
        self.state.write_faults.fetch_add(1, Ordering::SeqCst);
    }

    /// Fails the next sync; later syncs succeed.
    pub fn fail_next_sync(&self) {
        self.state.sync_faults.fetch_add(1, Ordering::SeqCst);
    }

    /// Disarms the switch and clears the crashed flag.
    pub fn reset(&self) {
        self.state.budget.store(usize::MAX, Ordering::SeqCst);
        self.state.written.store(0, Ordering::SeqCst);
        self.state.crashed.store(false, Ordering::SeqCst);
        self.state.write_faults.store(0, Ordering::SeqCst);
        self.state.sync_faults.store(0, Ordering::SeqCst);
    }

    /// Consumes a pending one-off sync failure.
    fn take_sync_fault(&self) -> bool {
        take_one(&self.state.sync_faults)
    }

    /// Returns whether the crash has happened.
    pub fn has_crashed(&self) -> bool {
        self.state.crashed.load(Ordering::SeqCst)
    }

    /// Charges a write of `len` bytes. Returns how many bytes may land.
    fn charge(&self, len: usize) -> Option<usize> {
        if self.has_crashed() {
            return Some(0);
        }
        if take_one(&self.state.write_faults) {
            return Some(len / 2);
        }
        let budget = self.state.budget.load(Ordering::SeqCst);
        let before = self.state.written.fetch_add(len, Ordering::SeqCst);
        if before.saturating_add(len) <= budget {
            return None;
        }
        self.state.crashed.store(true, Ordering::SeqCst);
        Some(budget.saturating_sub(before))
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl Default for CrashSwitch {
    fn default() -> Self {
        Self::new()
    }
}

fn simulated_crash(context: &str) -> StorageError {
    StorageError::Io(io::Error::new(
        io::ErrorKind::Other,
        format!("simulated crash during {context}"),
    ))
}

/// A storage backend wrapper that can simulate crashes.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    switch: CrashSwitch,
}

impl CrashableBackend {
    /// Wraps `inner`, crashing when `switch` says so.
    pub fn new(inner: Box<dyn StorageBackend>, switch: CrashSwitch) -> Self {
        Self { inner, switch }
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        match self.switch.charge(data.len()) {
            None => self.inner.write_at(offset, data),
            Some(partial) => {
                if partial > 0 {
                    let _ = self.inner.write_at(offset, &data[..partial]);
                }
                Err(simulated_crash("write"))
            }
        }
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        match self.switch.charge(data.len()) {
            None => self.inner.append(data),
            Some(partial) => {
                if partial > 0 {
                    let _ = self.inner.append(&data[..partial]);
                }
                Err(simulated_crash("append"))
            }
        }
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.switch.has_crashed() {
            return Err(simulated_crash("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.switch.has_crashed() || self.switch.take_sync_fault() {
            return Err(simulated_crash("sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.switch.has_crashed() {
            return Err(simulated_crash("truncate"));
        }
        self.inner.truncate(new_size)
    }
}

/// Truncates the index file to zero bytes.
pub fn empty_index(paths: &StorePaths) -> io::Result<()> {
    File::create(&paths.index).map(|_| ())
}

/// Deletes the index file.
pub fn remove_index(paths: &StorePaths) -> io::Result<()> {
    fs::remove_file(&paths.index)
}

/// Cuts `bytes` bytes off the end of `path`.
pub fn tear_tail(path: &Path, bytes: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    file.set_len(len.saturating_sub(bytes))?;
    file.sync_all()
}

/// Appends `bytes` of garbage to `path`, as a half-written frame would.
pub fn append_garbage(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Inverts the byte at `offset` in `path`.
pub fn flip_byte(path: &Path, offset: u64) -> io::Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut byte)?;
    byte[0] = !byte[0];
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&byte)?;
    file.sync_all()
}

/// Size of `path` in bytes.
pub fn file_len(path: &Path) -> io::Result<u64> {
    Ok(fs::metadata(path)?.len())
}
