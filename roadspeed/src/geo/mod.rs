//! Spatial quantization module
//!
//! Converts geographic positions and headings into the keys used by the
//! speed grid:
//!
//! - `(lat, lon)` → [`CellCoord`] on a 1e-4° grid
//! - heading → one of eight 45° [`Bucket`]s
//! - `(origin, heading, distance)` → projected point for look-ahead queries
//!
//! All functions are pure and total. Invalid input (NaN, poles) is not
//! rejected; it produces cells that simply never match stored data.

mod types;

pub use types::{
    Bucket, CellCoord, NeighborIter, ParseCellError, BUCKET_COUNT, BUCKET_WIDTH_DEG,
    EARTH_RADIUS_M, GRID_SCALE,
};

/// Quantizes a geographic position to its grid cell.
///
/// `gy = floor(lat * 1e4)`, `gx = floor(lon * 1e4)`.
///
/// # Example
///
/// ```
/// use roadspeed::geo::{quantize, CellCoord};
///
/// assert_eq!(quantize(37.5, 127.0), CellCoord::new(375_000, 1_270_000));
/// assert_eq!(quantize(-0.00001, 0.0), CellCoord::new(-1, 0));
/// ```
#[inline]
pub fn quantize(lat: f64, lon: f64) -> CellCoord {
    CellCoord {
        gy: (lat * GRID_SCALE).floor() as i64,
        gx: (lon * GRID_SCALE).floor() as i64,
    }
}

/// Maps a heading in degrees to its direction bucket.
///
/// The heading is normalized into `[0, 360)` first, so negative headings and
/// headings above 360° are accepted. The result is clamped to `[0, 7]` to
/// absorb floating-point edge values that land exactly on 360°.
#[inline]
pub fn bucket_of(heading_deg: f64) -> Bucket {
    let sector = (heading_deg.rem_euclid(360.0) / BUCKET_WIDTH_DEG).floor() as i64;
    Bucket::new(sector.clamp(0, BUCKET_COUNT as i64 - 1) as usize)
}

/// Projects a point `distance_m` metres ahead along `heading_deg`.
///
/// Uses a flat-earth approximation around the origin, which is accurate for
/// the few tens of metres used by look-ahead queries. A non-positive distance
/// returns the origin unchanged.
///
/// Near the poles `cos(lat)` approaches zero and the longitude offset blows
/// up (or becomes NaN). No special handling is applied; such points quantize
/// to cells that never hold data.
///
/// # Returns
///
/// A tuple of (latitude, longitude) in degrees.
pub fn project(lat: f64, lon: f64, heading_deg: f64, distance_m: f64) -> (f64, f64) {
    if distance_m <= 0.0 {
        return (lat, lon);
    }
    let heading = heading_deg.to_radians();
    let dlat = distance_m * heading.cos() / EARTH_RADIUS_M;
    let dlon = distance_m * heading.sin() / (EARTH_RADIUS_M * lat.to_radians().cos());
    (lat + dlat.to_degrees(), lon + dlon.to_degrees())
}
