//! Forward look-ahead search.
//!
//! Given a position, heading and look-ahead distance, the search probes a
//! small set of forward points and returns the first stored speed that
//! passes the old-only gate.
//!
//! # Search Order
//!
//! ```text
//! for d in [d, d+3, d-3 (if >= 0), d+6, d-6 (if >= 0)]:
//!     cell = quantize(project(origin, heading, d))
//!     home cell:       buckets b, b-1, b+1
//!     neighbor cells:  same buckets, dy-major scan (if enabled)
//! ```
//!
//! Every candidate slot, home or neighbor, must be at least
//! `old_threshold_secs` old to be returned.

use tracing::trace;

use crate::geo::{bucket_of, project, quantize, Bucket, CellCoord};
use crate::grid::{CellRecord, SpeedGrid};

/// Offsets (metres) probed around the requested distance, in priority order.
pub const DISTANCE_OFFSETS_M: [f64; 4] = [3.0, -3.0, 6.0, -6.0];

/// Bucket offsets probed within a cell, in priority order.
const BUCKET_OFFSETS: [i32; 3] = [0, -1, 1];

/// A successful lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryHit {
    /// Cell the value was read from.
    pub cell: CellCoord,
    /// Bucket the value was read from.
    pub bucket: Bucket,
    /// Stored signed speed.
    pub value: f64,
}

/// Parameters of one search.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    /// Neighbor radius in cells; 0 searches the home cell only.
    pub neighbor_ring: u32,
    /// Minimum slot age in seconds.
    pub old_threshold_secs: i64,
    /// Current epoch seconds.
    pub now: i64,
}

/// Look-ahead distance covered in `lookahead_secs` at `v_ego`, never negative.
#[inline]
pub fn lookahead_distance(v_ego: f64, lookahead_secs: f64) -> f64 {
    (v_ego * lookahead_secs).max(0.0)
}

/// Candidate forward distances for a requested distance, in priority order.
///
/// Negative candidates are skipped. A non-finite distance yields no candidates.
pub fn candidate_distances(distance_m: f64) -> Vec<f64> {
    if !distance_m.is_finite() {
        return Vec::new();
    }
    std::iter::once(distance_m)
        .chain(DISTANCE_OFFSETS_M.iter().map(|off| distance_m + off))
        .filter(|d| *d >= 0.0)
        .collect()
}

/// Searches one cell record for bucket `b`, then `b-1`, then `b+1`.
///
/// Returns the first present slot whose age passes the gate.
pub fn search_record(
    record: &CellRecord,
    bucket: Bucket,
    params: &SearchParams,
) -> Option<(Bucket, f64)> {
    BUCKET_OFFSETS.iter().find_map(|&step| {
        let candidate = bucket.rotate(step);
        record
            .get(candidate)
            .filter(|entry| entry.is_old(params.now, params.old_threshold_secs))
            .map(|entry| (candidate, entry.value))
    })
}

fn search_cell(
    grid: &SpeedGrid,
    cell: CellCoord,
    bucket: Bucket,
    params: &SearchParams,
) -> Option<QueryHit> {
    let record = grid.get(&cell)?;
    search_record(record, bucket, params).map(|(bucket, value)| QueryHit {
        cell,
        bucket,
        value,
    })
}

/// Finds the advisory speed ahead of a position.
///
/// # Arguments
///
/// * `grid` - The grid to search (already locked by the caller)
/// * `lat`, `lon` - Current position in degrees
/// * `heading_deg` - Current heading in degrees
/// * `distance_m` - Look-ahead distance in metres
/// * `params` - Neighbor radius, age gate and current time
///
/// # Returns
///
/// The first matching slot, or `None` when every candidate is exhausted.
pub fn find_target(
    grid: &SpeedGrid,
    lat: f64,
    lon: f64,
    heading_deg: f64,
    distance_m: f64,
    params: &SearchParams,
) -> Option<QueryHit> {
    let bucket = bucket_of(heading_deg);

    for d in candidate_distances(distance_m) {
        let (plat, plon) = project(lat, lon, heading_deg, d);
        if !plat.is_finite() || !plon.is_finite() {
            continue;
        }
        let home = quantize(plat, plon);

        if let Some(hit) = search_cell(grid, home, bucket, params) {
            trace!(
                cell = %hit.cell,
                bucket = hit.bucket.index(),
                distance = d,
                "Home cell hit"
            );
            return Some(hit);
        }

        if let Some(hit) = home
            .neighbors(params.neighbor_ring)
            .find_map(|cell| search_cell(grid, cell, bucket, params))
        {
            trace!(
                cell = %hit.cell,
                bucket = hit.bucket.index(),
                distance = d,
                "Neighbor cell hit"
            );
            return Some(hit);
        }
    }

    None
}
