//! Page-backed open-addressing hash → id table.
//!
//! ## File Format
//!
//! ```text
//! | header (32) | ... | slot table (slot_count * 8) |
//!
//! header: | magic "EDBH" (4) | version (2) | reserved (2) |
//!         | table_offset (8) | slot_count (8) | entry_count (8) |
//! slot:   | hash i32 (4) | id u32 (4) |      hash 0 = empty
//! ```
//!
//! Inserts write one slot in place. Growth (and [`IntMultiMap::retain`],
//! which has to re-pack the collision runs) appends a new table after the
//! current one, syncs it, then flips `table_offset` in the header, so a
//! crash mid-rewrite leaves the old table in charge. Superseded tables stay
//! behind as dead space until [`IntMultiMap::clear`].
//!
//! A table more than half full is rejected at open: a lookup stops at the
//! first empty slot it meets.
//!
//! `entry_count` is advisory: the count is recomputed from the slots at
//! open.

use crate::error::{CoreError, CoreResult};
use crate::index::{check_entry, IntMultiMap};
use crate::types::{Id, KeyHash};
use enumdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};

const INDEX_MAGIC: [u8; 4] = *b"EDBH";
const INDEX_VERSION: u16 = 1;
const HEADER_LEN: u64 = 32;
const SLOT_LEN: usize = 8;
const MIN_SLOTS: usize = 16;
const ENTRY_COUNT_OFFSET: u64 = 24;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Slot {
    hash: KeyHash,
    id: u32,
}

impl Slot {
    const fn is_empty(self) -> bool {
        self.hash == 0
    }

    fn encode(self) -> [u8; SLOT_LEN] {
        let mut buf = [0u8; SLOT_LEN];
        buf[0..4].copy_from_slice(&self.hash.to_le_bytes());
        buf[4..8].copy_from_slice(&self.id.to_le_bytes());
        buf
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            hash: i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            id: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

/// Durable multimap persisted in its own file (`<name>.hashToId`).
///
/// All operations run under one mutex; slots are mirrored in memory, so a
/// lookup costs no I/O beyond what `accept` does.
pub struct DurableHashMap {
    table: Mutex<Table>,
}

struct Table {
    backend: Box<dyn StorageBackend>,
    table_offset: u64,
    slots: Vec<Slot>,
    entries: usize,
    initial_slots: usize,
    closed: bool,
}

impl DurableHashMap {
    /// Opens a table over `backend`, creating it when the store is empty.
    pub fn open(mut backend: Box<dyn StorageBackend>, initial_slots: usize) -> CoreResult<Self> {
        let initial_slots = initial_slots.max(MIN_SLOTS).next_power_of_two();
        let size = backend.size()?;

        let table = if size == 0 {
            let slots = vec![Slot::default(); initial_slots];
            write_fresh(backend.as_mut(), &slots)?;
            Table {
                backend,
                table_offset: HEADER_LEN,
                slots,
                entries: 0,
                initial_slots,
                closed: false,
            }
        } else {
            load(backend, size, initial_slots)?
        };

        debug!(
            slots = table.slots.len(),
            entries = table.entries,
            "opened hash index"
        );
        Ok(Self {
            table: Mutex::new(table),
        })
    }

    /// Opens or creates the table file at `path`.
    pub fn open_file(path: &Path, initial_slots: usize) -> CoreResult<Self> {
        Self::open(
            Box::new(FileBackend::open_with_create_dirs(path)?),
            initial_slots,
        )
    }

    /// Creates a table that lives only in memory.
    pub fn in_memory(initial_slots: usize) -> CoreResult<Self> {
        Self::open(Box::new(InMemoryBackend::new()), initial_slots)
    }

    /// Current slot count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.table.lock().slots.len()
    }
}

fn write_header(
    backend: &mut dyn StorageBackend,
    table_offset: u64,
    slot_count: usize,
    entries: usize,
) -> CoreResult<()> {
    let mut buf = [0u8; HEADER_LEN as usize];
    buf[0..4].copy_from_slice(&INDEX_MAGIC);
    buf[4..6].copy_from_slice(&INDEX_VERSION.to_le_bytes());
    buf[8..16].copy_from_slice(&table_offset.to_le_bytes());
    buf[16..24].copy_from_slice(&(slot_count as u64).to_le_bytes());
    buf[24..32].copy_from_slice(&(entries as u64).to_le_bytes());
    backend.write_at(0, &buf)?;
    Ok(())
}

fn encode_slots(slots: &[Slot]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(slots.len() * SLOT_LEN);
    for slot in slots {
        buf.extend_from_slice(&slot.encode());
    }
    buf
}

fn write_fresh(backend: &mut dyn StorageBackend, slots: &[Slot]) -> CoreResult<()> {
    write_header(backend, HEADER_LEN, slots.len(), 0)?;
    backend.append(&encode_slots(slots))?;
    backend.sync()?;
    Ok(())
}

fn load(
    mut backend: Box<dyn StorageBackend>,
    size: u64,
    initial_slots: usize,
) -> CoreResult<Table> {
    if size < HEADER_LEN {
        return Err(CoreError::index_corruption(format!(
            "index header truncated to {size} bytes"
        )));
    }
    let header = backend.read_at(0, HEADER_LEN as usize)?;
    if header[0..4] != INDEX_MAGIC {
        return Err(CoreError::index_corruption("invalid index magic"));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != INDEX_VERSION {
        return Err(CoreError::index_corruption(format!(
            "unsupported index version: {version}"
        )));
    }

    let read_u64 = |at: usize| {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&header[at..at + 8]);
        u64::from_le_bytes(raw)
    };
    let table_offset = read_u64(8);
    let slot_count = read_u64(16);
    let recorded_entries = read_u64(24);

    if slot_count < MIN_SLOTS as u64 || !slot_count.is_power_of_two() {
        return Err(CoreError::index_corruption(format!(
            "invalid slot count: {slot_count}"
        )));
    }
    let table_len = slot_count
        .checked_mul(SLOT_LEN as u64)
        .ok_or_else(|| CoreError::index_corruption("slot table too large"))?;
    if table_offset < HEADER_LEN || table_offset.saturating_add(table_len) > size {
        return Err(CoreError::index_corruption(format!(
            "slot table at {table_offset}+{table_len} exceeds file size {size}"
        )));
    }

    let raw = backend.read_at(table_offset, table_len as usize)?;
    let slots: Vec<Slot> = raw.chunks_exact(SLOT_LEN).map(Slot::decode).collect();
    if slots.iter().any(|s| !s.is_empty() && s.id == 0) {
        return Err(CoreError::index_corruption("slot with null id"));
    }
    let entries = slots.iter().filter(|s| !s.is_empty()).count();
    if entries * 2 > slots.len() {
        return Err(CoreError::index_corruption(format!(
            "{entries} entries overfill {} slots",
            slots.len()
        )));
    }

    if entries as u64 != recorded_entries {
        debug!(
            recorded = recorded_entries,
            counted = entries,
            "correcting index entry count"
        );
        write_header(backend.as_mut(), table_offset, slots.len(), entries)?;
    }

    Ok(Table {
        backend,
        table_offset,
        slots,
        entries,
        initial_slots,
        closed: false,
    })
}

/// Home slot of a hash in a table of `len` (power of two) slots.
fn home(hash: KeyHash, len: usize) -> usize {
    let bits = len.trailing_zeros();
    let mixed = u64::from(hash as u32).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    (mixed >> (64 - bits)) as usize
}

impl Table {
    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed {
            Err(CoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn find(
        &self,
        hash: KeyHash,
        accept: &mut dyn FnMut(Id) -> CoreResult<bool>,
    ) -> CoreResult<Option<Id>> {
        let mask = self.slots.len() - 1;
        let mut at = home(hash, self.slots.len());
        for _ in 0..self.slots.len() {
            let slot = self.slots[at];
            if slot.is_empty() {
                break;
            }
            if slot.hash == hash && accept(Id::new(slot.id))? {
                return Ok(Some(Id::new(slot.id)));
            }
            at = (at + 1) & mask;
        }
        Ok(None)
    }

    fn insert(&mut self, hash: KeyHash, id: Id) -> CoreResult<()> {
        let wanted = Slot {
            hash,
            id: id.as_u32(),
        };
        if self.find(hash, &mut |candidate| Ok(candidate == id))?.is_some() {
            return Ok(());
        }
        if (self.entries + 1) * 2 > self.slots.len() {
            self.grow()?;
        }

        let at = free_slot(&self.slots, hash)
            .ok_or_else(|| CoreError::index_corruption("no free slot below the load limit"))?;

        let offset = self.table_offset + (at * SLOT_LEN) as u64;
        self.backend.write_at(offset, &wanted.encode())?;
        self.slots[at] = wanted;
        self.entries += 1;
        self.backend
            .write_at(ENTRY_COUNT_OFFSET, &(self.entries as u64).to_le_bytes())?;
        Ok(())
    }

    fn grow(&mut self) -> CoreResult<()> {
        let from = self.slots.len();
        let kept: Vec<Slot> = self.slots.iter().copied().filter(|s| !s.is_empty()).collect();
        self.relocate(from * 2, &kept)?;
        info!(from, to = from * 2, entries = self.entries, "grew hash index");
        Ok(())
    }

    /// Writes `kept` into a fresh table of `len` slots and switches to it.
    fn relocate(&mut self, len: usize, kept: &[Slot]) -> CoreResult<()> {
        let mut slots = vec![Slot::default(); len];
        for &slot in kept {
            let at = free_slot(&slots, slot.hash)
                .ok_or_else(|| CoreError::index_corruption("relocated table overflowed"))?;
            slots[at] = slot;
        }

        let table_offset = self.backend.append(&encode_slots(&slots))?;
        self.backend.sync()?;
        write_header(self.backend.as_mut(), table_offset, len, kept.len())?;
        // The header now points at the new table; adopt it even if the
        // final sync fails.
        self.slots = slots;
        self.table_offset = table_offset;
        self.entries = kept.len();
        self.backend.sync()?;
        Ok(())
    }
}

/// First empty slot on the collision run of `hash`.
fn free_slot(slots: &[Slot], hash: KeyHash) -> Option<usize> {
    let mask = slots.len() - 1;
    let mut at = home(hash, slots.len());
    for _ in 0..slots.len() {
        if slots[at].is_empty() {
            return Some(at);
        }
        at = (at + 1) & mask;
    }
    None
}

impl IntMultiMap for DurableHashMap {
    fn put(&self, hash: KeyHash, id: Id) -> CoreResult<()> {
        check_entry(hash, id)?;
        let mut table = self.table.lock();
        table.ensure_open()?;
        table.insert(hash, id)
    }

    fn lookup(
        &self,
        hash: KeyHash,
        accept: &mut dyn FnMut(Id) -> CoreResult<bool>,
    ) -> CoreResult<Option<Id>> {
        let table = self.table.lock();
        table.ensure_open()?;
        table.find(hash, accept)
    }

    fn lookup_or_insert(
        &self,
        hash: KeyHash,
        accept: &mut dyn FnMut(Id) -> CoreResult<bool>,
        create: &mut dyn FnMut(KeyHash) -> CoreResult<Id>,
    ) -> CoreResult<Id> {
        check_entry(hash, Id::new(1))?;
        let mut table = self.table.lock();
        table.ensure_open()?;
        if let Some(id) = table.find(hash, accept)? {
            return Ok(id);
        }

        let id = create(hash)?;
        if id.is_null() {
            return Err(CoreError::invalid_operation(format!(
                "create returned the null id for hash {hash}"
            )));
        }
        table.insert(hash, id)?;
        Ok(id)
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(KeyHash, Id)) -> CoreResult<()> {
        let table = self.table.lock();
        table.ensure_open()?;
        for slot in table.slots.iter().filter(|s| !s.is_empty()) {
            visit(slot.hash, Id::new(slot.id));
        }
        Ok(())
    }

    fn retain(&self, keep: &mut dyn FnMut(KeyHash, Id) -> bool) -> CoreResult<usize> {
        let mut table = self.table.lock();
        table.ensure_open()?;
        let kept: Vec<Slot> = table
            .slots
            .iter()
            .copied()
            .filter(|s| !s.is_empty() && keep(s.hash, Id::new(s.id)))
            .collect();
        let removed = table.entries - kept.len();
        if removed > 0 {
            let len = table.slots.len();
            table.relocate(len, &kept)?;
            debug!(removed, entries = kept.len(), "dropped index entries");
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.table.lock().entries
    }

    fn clear(&self) -> CoreResult<()> {
        let mut table = self.table.lock();
        table.ensure_open()?;
        let slots = vec![Slot::default(); table.initial_slots];
        table.backend.truncate(0)?;
        write_fresh(table.backend.as_mut(), &slots)?;
        table.slots = slots;
        table.table_offset = HEADER_LEN;
        table.entries = 0;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn flush(&self) -> CoreResult<()> {
        let mut table = self.table.lock();
        table.ensure_open()?;
        table.backend.sync()?;
        Ok(())
    }

    fn close(&self) -> CoreResult<()> {
        let mut table = self.table.lock();
        if table.closed {
            return Ok(());
        }
        table.backend.sync()?;
        table.closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for DurableHashMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.lock();
        f.debug_struct("DurableHashMap")
            .field("slots", &table.slots.len())
            .field("entries", &table.entries)
            .field("table_offset", &table.table_offset)
            .finish_non_exhaustive()
    }
}
