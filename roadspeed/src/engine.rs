//! The speed cache engine.
//!
//! [`SpeedCache`] owns the in-memory grid and composes the writer, the reader
//! and the snapshot codec around it. One mutex guards the grid together with
//! its scheduling state (dirty flag, last save time) and the last-hit marker;
//! every public operation takes it once for its whole body.
//!
//! # Lifecycle
//!
//! ```text
//! open()  ── restore snapshot (or start empty, purging foreign/corrupt data)
//!   │
//!   ├── add_sample() / query_target*() / invalidate_last_hit()
//!   ├── maybe_save()   polled by the caller, e.g. once per control loop
//!   │
//! close() ── final best-effort save if dirty
//! ```
//!
//! No background threads are started by the engine. Persistence is driven
//! by the caller through [`SpeedCache::maybe_save`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use roadspeed::clock::ManualClock;
//! use roadspeed::config::SpeedCacheConfig;
//! use roadspeed::engine::SpeedCache;
//! use roadspeed::store::MemoryStore;
//!
//! let clock = Arc::new(ManualClock::new(1_700_000_000));
//! let cache = SpeedCache::open(
//!     SpeedCacheConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     clock.clone(),
//! );
//!
//! cache.add_sample(37.5, 127.0, 90.0, 15.0);
//! clock.advance(121);
//! assert_eq!(cache.query_target_by_distance(37.5, 127.0, 90.0, 0.0, true), 15.0);
//! cache.close();
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::codec::{self, Decoded, Incompatibility};
use crate::config::SpeedCacheConfig;
use crate::error::SpeedCacheError;
use crate::geo::{bucket_of, quantize, Bucket, CellCoord};
use crate::grid::{Slot, SlotEntry, SpeedGrid};
use crate::query::{self, QueryHit, SearchParams};
use crate::sample;
use crate::store::SnapshotStore;

/// What to do with the slot behind the last query hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateAction {
    /// Erase the slot entirely.
    Clear,
    /// Keep the value but restamp it with the current time, so the old-only
    /// gate hides it again until it ages past the threshold.
    AgeBump,
}

impl InvalidateAction {
    /// Name used in configuration and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidateAction::Clear => "clear",
            InvalidateAction::AgeBump => "age_bump",
        }
    }
}

impl fmt::Display for InvalidateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvalidateAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clear" => Ok(InvalidateAction::Clear),
            "age_bump" => Ok(InvalidateAction::AgeBump),
            other => Err(format!(
                "unknown invalidate action '{}', expected 'clear' or 'age_bump'",
                other
            )),
        }
    }
}

/// Transient record of the most recent successful query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastHit {
    /// Cell the returned value came from.
    pub cell: CellCoord,
    /// Bucket the returned value came from.
    pub bucket: Bucket,
    /// Epoch seconds at which the value was returned.
    pub read_at: i64,
}

/// How the startup restore went.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// No snapshot was stored.
    Empty,
    /// The snapshot was restored.
    Restored {
        /// Number of cells restored.
        cells: usize,
        /// Cells reset to empty because their stored arrays were malformed.
        repaired_cells: usize,
    },
    /// The snapshot had a foreign format and was deleted.
    Incompatible(Incompatibility),
    /// The snapshot could not be decoded and was deleted.
    Corrupt(String),
    /// The store could not be read; the snapshot was left in place.
    ReadFailed(String),
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOutcome::Empty => write!(f, "no snapshot stored"),
            LoadOutcome::Restored {
                cells,
                repaired_cells,
            } => write!(f, "restored {} cells ({} repaired)", cells, repaired_cells),
            LoadOutcome::Incompatible(why) => {
                write!(f, "discarded incompatible snapshot: {}", why)
            }
            LoadOutcome::Corrupt(e) => write!(f, "discarded corrupt snapshot: {}", e),
            LoadOutcome::ReadFailed(e) => write!(f, "failed to read snapshot: {}", e),
        }
    }
}

/// Summary of the grid contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cells in the grid.
    pub cells: usize,
    /// Slots holding a value.
    pub populated_slots: usize,
    /// Slots holding a cruise (positive) hint.
    pub positive_slots: usize,
    /// Slots holding a deceleration (negative) hint.
    pub negative_slots: usize,
    /// Whether there are changes not yet handed to the store.
    pub dirty: bool,
    /// Epoch seconds of the last save, if any.
    pub last_save: Option<i64>,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cells, {} slots ({} cruise, {} decel){}",
            self.cells,
            self.populated_slots,
            self.positive_slots,
            self.negative_slots,
            if self.dirty { ", unsaved changes" } else { "" }
        )
    }
}

/// State guarded by the cache mutex.
#[derive(Debug, Default)]
struct CacheState {
    grid: SpeedGrid,
    dirty: bool,
    /// Epoch seconds of the last save; 0 until the first save.
    last_save: i64,
    last_hit: Option<LastHit>,
}

/// Crowdsourced memory of driving speeds keyed by position and heading.
///
/// Thread-safe; share it behind an `Arc`.
pub struct SpeedCache {
    config: SpeedCacheConfig,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

impl fmt::Debug for SpeedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SpeedCache")
            .field("storage_key", &self.config.storage_key)
            .field("cells", &state.grid.len())
            .field("dirty", &state.dirty)
            .field("last_hit", &state.last_hit)
            .finish()
    }
}

impl SpeedCache {
    /// Create an empty cache without reading the store.
    pub fn new(
        config: SpeedCacheConfig,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            clock,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Create a cache and restore the stored snapshot.
    ///
    /// Never fails: a missing, foreign or corrupt snapshot leaves the grid
    /// empty (deleting the stored key in the latter two cases).
    pub fn open(
        config: SpeedCacheConfig,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::open_with_outcome(config, store, clock).0
    }

    /// Like [`open`](Self::open), also reporting how the restore went.
    pub fn open_with_outcome(
        config: SpeedCacheConfig,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> (Self, LoadOutcome) {
        let cache = Self::new(config, store, clock);
        let outcome = cache.restore();
        (cache, outcome)
    }

    /// The active configuration.
    pub fn config(&self) -> &SpeedCacheConfig {
        &self.config
    }

    fn restore(&self) -> LoadOutcome {
        let key = self.config.storage_key.as_str();
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "No stored snapshot, starting empty");
                return LoadOutcome::Empty;
            }
            Err(e) => {
                warn!(error = %e, key, "Failed to read snapshot, starting empty");
                return LoadOutcome::ReadFailed(e.to_string());
            }
        };

        match codec::decode(&raw) {
            Ok(Decoded::Restored {
                grid,
                repaired_cells,
            }) => {
                if repaired_cells > 0 {
                    warn!(key, repaired_cells, "Reset malformed cells to empty");
                }
                let cells = grid.len();
                info!(key, cells, bytes = raw.len(), "Restored speed snapshot");
                let mut state = self.state.lock();
                state.grid = grid;
                state.dirty = false;
                LoadOutcome::Restored {
                    cells,
                    repaired_cells,
                }
            }
            Ok(Decoded::Incompatible(why)) => {
                info!(key, reason = %why, "Discarding incompatible snapshot");
                self.reset_store();
                LoadOutcome::Incompatible(why)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding corrupt snapshot");
                self.reset_store();
                LoadOutcome::Corrupt(e.to_string())
            }
        }
    }

    /// Deletes the stored key and empties the grid, logging a failed delete.
    fn reset_store(&self) {
        let key = self.config.storage_key.as_str();
        if let Err(e) = self.store.delete(key) {
            warn!(error = %e, key, "Failed to delete stored snapshot");
        }
        let mut state = self.state.lock();
        state.grid.clear();
        state.dirty = false;
        state.last_hit = None;
    }

    /// Records one observed speed at a position and heading.
    ///
    /// The speed is rounded to one decimal; samples that round to zero (or
    /// are not finite) are ignored. See [`crate::sample`] for the merge rules.
    pub fn add_sample(&self, lat: f64, lon: f64, heading_deg: f64, speed_signed: f64) {
        let Some(speed) = sample::normalize_speed(speed_signed) else {
            return;
        };
        let cell = quantize(lat, lon);
        let bucket = bucket_of(heading_deg);
        let now = self.clock.now_secs();

        let mut state = self.state.lock();
        let record = state.grid.entry(cell);
        let merged = sample::merge_sample(record.get(bucket), speed, now);
        record.set(bucket, merged);
        state.dirty = true;
    }

    /// Advisory speed for the point reached in `lookahead_secs` at `v_ego`.
    ///
    /// # Returns
    ///
    /// The stored signed speed, or `0.0` when nothing eligible is found.
    pub fn query_target(
        &self,
        lat: f64,
        lon: f64,
        heading_deg: f64,
        v_ego: f64,
        lookahead_secs: f64,
        neighbor_fallback: bool,
    ) -> f64 {
        let distance = query::lookahead_distance(v_ego, lookahead_secs);
        self.query_target_by_distance(lat, lon, heading_deg, distance, neighbor_fallback)
    }

    /// [`query_target`](Self::query_target) with the configured look-ahead
    /// and neighbor fallback enabled.
    pub fn query_target_default(&self, lat: f64, lon: f64, heading_deg: f64, v_ego: f64) -> f64 {
        self.query_target(
            lat,
            lon,
            heading_deg,
            v_ego,
            self.config.lookahead_secs,
            true,
        )
    }

    /// Advisory speed for the point `distance_m` ahead.
    ///
    /// # Returns
    ///
    /// The stored signed speed, or `0.0` when nothing eligible is found.
    pub fn query_target_by_distance(
        &self,
        lat: f64,
        lon: f64,
        heading_deg: f64,
        distance_m: f64,
        neighbor_fallback: bool,
    ) -> f64 {
        let now = self.clock.now_secs();
        let params = SearchParams {
            neighbor_ring: if neighbor_fallback {
                self.config.neighbor_ring
            } else {
                0
            },
            old_threshold_secs: self.config.neighbor_old_threshold_secs,
            now,
        };

        let mut state = self.state.lock();
        match query::find_target(&state.grid, lat, lon, heading_deg, distance_m, &params) {
            Some(QueryHit { cell, bucket, value }) => {
                state.last_hit = Some(LastHit {
                    cell,
                    bucket,
                    read_at: now,
                });
                value
            }
            None => 0.0,
        }
    }

    /// Retracts the value returned by the most recent successful query.
    ///
    /// Does nothing (returns `false`) if there was no hit, if more than
    /// `window_secs` have passed since it, or if the slot is already empty.
    ///
    /// # Returns
    ///
    /// Whether the slot was changed.
    pub fn invalidate_last_hit(&self, window_secs: f64, action: InvalidateAction) -> bool {
        let now = self.clock.now_secs();
        let mut state = self.state.lock();

        let Some(hit) = state.last_hit else {
            return false;
        };
        if (now - hit.read_at) as f64 > window_secs {
            return false;
        }
        let Some(record) = state.grid.get_mut(&hit.cell) else {
            return false;
        };
        let Some(entry) = record.get(hit.bucket) else {
            return false;
        };

        let replacement: Slot = match action {
            InvalidateAction::Clear => None,
            InvalidateAction::AgeBump => Some(SlotEntry::new(entry.value, now)),
        };
        record.set(hit.bucket, replacement);
        state.dirty = true;
        debug!(cell = %hit.cell, bucket = hit.bucket.index(), %action, "Invalidated last hit");
        true
    }

    /// [`invalidate_last_hit`](Self::invalidate_last_hit) with the configured window.
    pub fn invalidate_last_hit_default(&self, action: InvalidateAction) -> bool {
        self.invalidate_last_hit(self.config.invalidate_window_secs, action)
    }

    /// Serializes the grid and hands it to the store without waiting.
    ///
    /// Clears the dirty flag. If the store refuses the write the grid stays
    /// dirty so a later [`maybe_save`](Self::maybe_save) retries.
    pub fn save(&self) -> Result<(), SpeedCacheError> {
        let key = self.config.storage_key.as_str();
        let now = self.clock.now_secs();

        // The hand-off stays under the lock so stores see snapshots in the
        // order they were encoded.
        let mut state = self.state.lock();
        let payload = codec::encode(&state.grid, self.config.compression())?;
        let (cells, bytes) = (state.grid.len(), payload.len());
        self.store.put_nonblocking(key, payload)?;
        state.dirty = false;
        state.last_save = now;
        drop(state);

        debug!(key, cells, bytes, "Speed snapshot handed to store");
        Ok(())
    }

    /// Saves if the grid is dirty and at least `interval_secs` have passed
    /// since the last save.
    ///
    /// # Returns
    ///
    /// Whether a save was performed.
    pub fn maybe_save(&self, interval_secs: i64) -> Result<bool, SpeedCacheError> {
        let now = self.clock.now_secs();
        {
            let state = self.state.lock();
            if !state.dirty || now - state.last_save < interval_secs {
                return Ok(false);
            }
        }
        self.save()?;
        Ok(true)
    }

    /// [`maybe_save`](Self::maybe_save) with the configured interval.
    pub fn maybe_save_default(&self) -> Result<bool, SpeedCacheError> {
        self.maybe_save(self.config.save_interval_secs)
    }

    /// Final best-effort flush: saves if dirty and waits for the store.
    ///
    /// Errors are logged and swallowed.
    pub fn close(&self) {
        if self.is_dirty() {
            if let Err(e) = self.save() {
                warn!(error = %e, "Final speed snapshot save failed");
            }
        }
        self.store.flush();
    }

    /// Deletes the stored snapshot and empties the grid.
    pub fn purge(&self) -> Result<bool, SpeedCacheError> {
        let existed = self.store.delete(&self.config.storage_key)?;
        let mut state = self.state.lock();
        state.grid.clear();
        state.dirty = false;
        state.last_hit = None;
        info!(key = %self.config.storage_key, existed, "Purged speed snapshot");
        Ok(existed)
    }

    /// Slot at `(cell, bucket)`.
    pub fn slot(&self, cell: &CellCoord, bucket: Bucket) -> Slot {
        self.state.lock().grid.slot(cell, bucket)
    }

    /// Number of cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.state.lock().grid.len()
    }

    /// Whether there are changes not yet handed to the store.
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// The current last-hit marker.
    pub fn last_hit(&self) -> Option<LastHit> {
        self.state.lock().last_hit
    }

    /// Summary of the grid contents.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = CacheStats {
            cells: state.grid.len(),
            dirty: state.dirty,
            last_save: (state.last_save > 0).then_some(state.last_save),
            ..CacheStats::default()
        };
        for entry in state
            .grid
            .iter()
            .flat_map(|(_, record)| record.slots().iter().flatten())
        {
            stats.populated_slots += 1;
            if entry.value > 0.0 {
                stats.positive_slots += 1;
            } else {
                stats.negative_slots += 1;
            }
        }
        stats
    }

    /// Copy of the grid, for export and inspection.
    pub fn snapshot(&self) -> SpeedGrid {
        self.state.lock().grid.clone()
    }
}
