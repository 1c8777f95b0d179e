//! Grid and heading type definitions

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Grid units per degree of latitude/longitude (one unit ≈ 9-11 m at mid-latitudes).
pub const GRID_SCALE: f64 = 1e4;

/// Number of heading sectors attached to every cell.
pub const BUCKET_COUNT: usize = 8;

/// Width of one heading sector in degrees.
pub const BUCKET_WIDTH_DEG: f64 = 360.0 / BUCKET_COUNT as f64;

/// Mean Earth radius used by the flat-earth projection.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Quantized grid cell, identified by floored `lat * 1e4` and `lon * 1e4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// Floor of latitude × 1e4 (north-south index)
    pub gy: i64,
    /// Floor of longitude × 1e4 (east-west index)
    pub gx: i64,
}

impl CellCoord {
    /// Create a cell coordinate from raw grid indices.
    pub const fn new(gy: i64, gx: i64) -> Self {
        Self { gy, gx }
    }

    /// Cell shifted by `(dy, dx)` grid units, saturating at the index range.
    #[inline]
    pub fn offset(&self, dy: i64, dx: i64) -> Self {
        Self {
            gy: self.gy.saturating_add(dy),
            gx: self.gx.saturating_add(dx),
        }
    }

    /// Cell shifted by `(dy, dx)` grid units, or `None` if an index overflows.
    #[inline]
    pub fn checked_offset(&self, dy: i64, dx: i64) -> Option<Self> {
        Some(Self {
            gy: self.gy.checked_add(dy)?,
            gx: self.gx.checked_add(dx)?,
        })
    }

    /// Geographic bounds of the cell as `(min_lat, min_lon, max_lat, max_lon)`.
    ///
    /// The south/west edges are inclusive, the north/east edges exclusive.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (
            self.gy as f64 / GRID_SCALE,
            self.gx as f64 / GRID_SCALE,
            self.gy.saturating_add(1) as f64 / GRID_SCALE,
            self.gx.saturating_add(1) as f64 / GRID_SCALE,
        )
    }

    /// Iterate over the cells within Chebyshev distance `ring`, excluding this cell.
    ///
    /// Cells are yielded row by row (`dy` outer, `dx` inner, both ascending).
    /// A ring of 1 yields the 8 adjacent cells; a ring of 0 yields nothing.
    /// Neighbors beyond the `i64` index range are skipped.
    #[inline]
    pub fn neighbors(&self, ring: u32) -> NeighborIter {
        let r = ring as i64;
        NeighborIter {
            center: *self,
            ring: r,
            dy: -r,
            dx: -r,
        }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.gy, self.gx)
    }
}

/// Error returned when a `"gy,gx"` cell key cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cell key '{0}', expected '<gy>,<gx>'")]
pub struct ParseCellError(pub String);

impl FromStr for CellCoord {
    type Err = ParseCellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (gy, gx) = s
            .split_once(',')
            .ok_or_else(|| ParseCellError(s.to_string()))?;
        let gy = gy
            .trim()
            .parse()
            .map_err(|_| ParseCellError(s.to_string()))?;
        let gx = gx
            .trim()
            .parse()
            .map_err(|_| ParseCellError(s.to_string()))?;
        Ok(Self { gy, gx })
    }
}

/// Iterator over the neighbors of a cell.
#[derive(Debug, Clone)]
pub struct NeighborIter {
    center: CellCoord,
    ring: i64,
    dy: i64,
    dx: i64,
}

impl Iterator for NeighborIter {
    type Item = CellCoord;

    fn next(&mut self) -> Option<Self::Item> {
        while self.ring > 0 && self.dy <= self.ring {
            let (dy, dx) = (self.dy, self.dx);
            if self.dx == self.ring {
                self.dx = -self.ring;
                self.dy += 1;
            } else {
                self.dx += 1;
            }
            if dy == 0 && dx == 0 {
                continue;
            }
            if let Some(cell) = self.center.checked_offset(dy, dx) {
                return Some(cell);
            }
        }
        None
    }
}

/// One of the eight 45° heading sectors; bucket 0 covers `[0°, 45°)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket(u8);

impl Bucket {
    /// Create a bucket from an index, wrapping into `[0, 8)`.
    #[inline]
    pub fn new(index: usize) -> Self {
        Self((index % BUCKET_COUNT) as u8)
    }

    /// Index of this bucket in a cell record.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// The bucket `step` sectors away, wrapping around the compass.
    #[inline]
    pub fn rotate(&self, step: i32) -> Self {
        let n = BUCKET_COUNT as i32;
        Self((self.0 as i32 + step).rem_euclid(n) as u8)
    }

    /// Iterate over every bucket in index order.
    pub fn all() -> impl Iterator<Item = Bucket> {
        (0..BUCKET_COUNT).map(Bucket::new)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self.0 as f64 * BUCKET_WIDTH_DEG;
        write!(f, "#{} [{}°, {}°)", self.0, start, start + BUCKET_WIDTH_DEG)
    }
}
