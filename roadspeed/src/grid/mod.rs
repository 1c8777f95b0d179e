//! In-memory speed grid.
//!
//! The grid maps quantized cells to fixed-size records of eight direction
//! slots. It is the single piece of shared state that the writer, the reader
//! and the snapshot codec operate on.
//!
//! # Invariants
//!
//! - Every [`CellRecord`] holds exactly [`BUCKET_COUNT`] slots.
//! - A slot's value and timestamp are present together or absent together;
//!   this is enforced by storing them as one optional [`SlotEntry`].
//! - Cells are created on first write and only removed by [`SpeedGrid::clear`].

use std::collections::HashMap;

use crate::geo::{Bucket, CellCoord, BUCKET_COUNT};

/// A stored speed observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotEntry {
    /// Signed speed in m/s, rounded to one decimal.
    ///
    /// Positive values are cruise-speed hints, negative values are
    /// deceleration hints.
    pub value: f64,
    /// Epoch seconds of the write that established this entry.
    pub timestamp: i64,
}

impl SlotEntry {
    /// Create a new entry.
    pub fn new(value: f64, timestamp: i64) -> Self {
        Self { value, timestamp }
    }

    /// Seconds elapsed between the entry's timestamp and `now`.
    #[inline]
    pub fn age_secs(&self, now: i64) -> i64 {
        now - self.timestamp
    }

    /// Whether the entry has existed for at least `threshold_secs`.
    #[inline]
    pub fn is_old(&self, now: i64, threshold_secs: i64) -> bool {
        self.age_secs(now) >= threshold_secs
    }
}

/// Storage unit addressed by `(cell, bucket)`. `None` means never written (or cleared).
pub type Slot = Option<SlotEntry>;

/// The eight direction slots of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CellRecord {
    slots: [Slot; BUCKET_COUNT],
}

impl CellRecord {
    /// Create a record with every slot empty.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a record from a full set of slots.
    pub fn from_slots(slots: [Slot; BUCKET_COUNT]) -> Self {
        Self { slots }
    }

    /// Slot for the given bucket.
    #[inline]
    pub fn get(&self, bucket: Bucket) -> Slot {
        self.slots[bucket.index()]
    }

    /// Replace the slot for the given bucket.
    #[inline]
    pub fn set(&mut self, bucket: Bucket, slot: Slot) {
        self.slots[bucket.index()] = slot;
    }

    /// All slots in bucket order.
    pub fn slots(&self) -> &[Slot; BUCKET_COUNT] {
        &self.slots
    }

    /// Number of slots holding a value.
    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True when no slot holds a value.
    pub fn is_empty(&self) -> bool {
        self.populated() == 0
    }
}

/// Mapping of cell coordinates to cell records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeedGrid {
    cells: HashMap<CellCoord, CellRecord>,
}

impl SpeedGrid {
    /// Create an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for a cell, if the cell has ever been written.
    #[inline]
    pub fn get(&self, cell: &CellCoord) -> Option<&CellRecord> {
        self.cells.get(cell)
    }

    /// Mutable record for an existing cell.
    #[inline]
    pub fn get_mut(&mut self, cell: &CellCoord) -> Option<&mut CellRecord> {
        self.cells.get_mut(cell)
    }

    /// Record for a cell, creating an all-empty record on first access.
    pub fn entry(&mut self, cell: CellCoord) -> &mut CellRecord {
        self.cells.entry(cell).or_default()
    }

    /// Insert or replace a whole cell record.
    pub fn insert(&mut self, cell: CellCoord, record: CellRecord) {
        self.cells.insert(cell, record);
    }

    /// Slot at `(cell, bucket)`; `None` when either the cell or the slot is empty.
    pub fn slot(&self, cell: &CellCoord, bucket: Bucket) -> Slot {
        self.cells.get(cell).and_then(|record| record.get(bucket))
    }

    /// Number of cells in the grid (including cells whose slots were all cleared).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when the grid holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over all cells in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&CellCoord, &CellRecord)> {
        self.cells.iter()
    }

    /// Remove every cell. Only used for a full store reset.
    pub fn clear(&mut self) {
        self.cells.clear();
    }
}
