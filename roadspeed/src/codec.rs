//! Snapshot payload codec.
//!
//! Serializes the [`SpeedGrid`] into a self-describing JSON document and
//! back. The wire format is:
//!
//! ```text
//! {
//!   "format": "v4",
//!   "dir_buckets": 8,
//!   "cells": { "<gy>,<gx>": [[value|null, ts|null], ... 8 pairs ...] }
//! }
//! ```
//!
//! The JSON is written compactly and optionally wrapped in gzip. On decode the
//! gzip envelope is detected by its `1F 8B` magic bytes, so compressed and
//! plain payloads are both accepted regardless of the current setting.
//!
//! Decoding never migrates older formats. The outcome is one of:
//!
//! - [`Decoded::Restored`] - a fully valid grid
//! - [`Decoded::Incompatible`] - foreign format tag or bucket count
//! - `Err(CodecError)` - corrupt payload
//!
//! A cell whose array is not exactly eight two-element pairs is restored as
//! eight empty slots rather than failing the whole payload.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CodecError;
use crate::geo::{CellCoord, BUCKET_COUNT};
use crate::grid::{CellRecord, Slot, SlotEntry, SpeedGrid};

/// Format tag written into every snapshot.
pub const FORMAT_TAG: &str = "v4";

/// Gzip magic header.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Returns true if the bytes start with the gzip magic header.
#[inline]
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[..2] == GZIP_MAGIC
}

/// Why a payload was rejected as foreign.
#[derive(Debug, Clone, PartialEq)]
pub enum Incompatibility {
    /// The `format` tag is missing or not [`FORMAT_TAG`].
    Format(Option<String>),
    /// The declared `dir_buckets` is not [`BUCKET_COUNT`].
    BucketCount(String),
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Incompatibility::Format(Some(tag)) => {
                write!(f, "format '{}' (expected '{}')", tag, FORMAT_TAG)
            }
            Incompatibility::Format(None) => write!(f, "missing format tag"),
            Incompatibility::BucketCount(n) => {
                write!(f, "dir_buckets {} (expected {})", n, BUCKET_COUNT)
            }
        }
    }
}

/// Result of decoding a snapshot payload.
#[derive(Debug)]
pub enum Decoded {
    /// Payload matched the current format.
    Restored {
        /// The restored grid.
        grid: SpeedGrid,
        /// Cells whose stored arrays were malformed and were reset to empty slots.
        repaired_cells: usize,
    },
    /// Payload belongs to a different format and must be discarded.
    Incompatible(Incompatibility),
}

#[derive(Serialize)]
struct PayloadOut<'a> {
    format: &'a str,
    dir_buckets: usize,
    cells: BTreeMap<String, Vec<(Option<f64>, Option<i64>)>>,
}

#[derive(Deserialize)]
struct PayloadIn {
    #[serde(default)]
    format: Option<Value>,
    #[serde(default)]
    dir_buckets: Option<Value>,
    #[serde(default)]
    cells: Option<Map<String, Value>>,
}

/// Serializes a grid to compact JSON, gzip-wrapped when `gzip_level` is set.
///
/// # Arguments
///
/// * `grid` - The grid to serialize
/// * `gzip_level` - Compression level 0-9, or `None` for plain JSON
pub fn encode(grid: &SpeedGrid, gzip_level: Option<u32>) -> Result<Vec<u8>, CodecError> {
    let cells = grid
        .iter()
        .map(|(cell, record)| {
            let pairs = record
                .slots()
                .iter()
                .map(|slot| match slot {
                    Some(entry) => (Some(entry.value), Some(entry.timestamp)),
                    None => (None, None),
                })
                .collect();
            (cell.to_string(), pairs)
        })
        .collect();

    let payload = PayloadOut {
        format: FORMAT_TAG,
        dir_buckets: BUCKET_COUNT,
        cells,
    };
    let raw = serde_json::to_vec(&payload)?;

    match gzip_level {
        Some(level) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
            encoder.write_all(&raw).map_err(CodecError::Compress)?;
            encoder.finish().map_err(CodecError::Compress)
        }
        None => Ok(raw),
    }
}

/// Returns the JSON text of a payload, unwrapping gzip if present.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if !is_gzip(data) {
        return Ok(data.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(CodecError::Decompress)?;
    Ok(out)
}

/// Decodes a snapshot payload, decompressing it first if it is gzip-wrapped.
pub fn decode(data: &[u8]) -> Result<Decoded, CodecError> {
    let json = decompress(data)?;
    let payload: PayloadIn = serde_json::from_slice(&json)?;

    match payload.format {
        Some(Value::String(ref tag)) if tag == FORMAT_TAG => {}
        Some(Value::String(tag)) => {
            return Ok(Decoded::Incompatible(Incompatibility::Format(Some(tag))))
        }
        Some(other) => {
            return Ok(Decoded::Incompatible(Incompatibility::Format(Some(
                other.to_string(),
            ))))
        }
        None => return Ok(Decoded::Incompatible(Incompatibility::Format(None))),
    }

    // A missing bucket count is taken to mean the fixed default.
    if let Some(buckets) = payload.dir_buckets {
        if buckets.as_u64() != Some(BUCKET_COUNT as u64) {
            return Ok(Decoded::Incompatible(Incompatibility::BucketCount(
                buckets.to_string(),
            )));
        }
    }

    let mut grid = SpeedGrid::new();
    let mut repaired_cells = 0;
    for (key, value) in payload.cells.unwrap_or_default() {
        let cell: CellCoord = key.parse()?;
        let record = match decode_cell(&key, &value)? {
            Some(record) => record,
            None => {
                repaired_cells += 1;
                CellRecord::empty()
            }
        };
        grid.insert(cell, record);
    }

    Ok(Decoded::Restored {
        grid,
        repaired_cells,
    })
}

/// Decodes one cell's slot array.
///
/// Returns `Ok(None)` when the array is not eight two-element pairs (the cell
/// is repaired to empty), and `Err` when a pair holds values of the wrong type.
fn decode_cell(key: &str, value: &Value) -> Result<Option<CellRecord>, CodecError> {
    let Some(pairs) = value.as_array() else {
        return Ok(None);
    };
    if pairs.len() != BUCKET_COUNT {
        return Ok(None);
    }

    let mut slots: [Slot; BUCKET_COUNT] = [None; BUCKET_COUNT];
    for (slot, pair) in slots.iter_mut().zip(pairs) {
        let Some([value, ts]) = pair
            .as_array()
            .and_then(|p| <&[Value; 2]>::try_from(p.as_slice()).ok())
        else {
            return Ok(None);
        };
        *slot = decode_slot(key, value, ts)?;
    }

    Ok(Some(CellRecord::from_slots(slots)))
}

fn decode_slot(key: &str, value: &Value, ts: &Value) -> Result<Slot, CodecError> {
    let value = match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64(),
        other => {
            return Err(CodecError::InvalidSlot {
                cell: key.to_string(),
                reason: format!("value must be a number or null, got {}", other),
            })
        }
    };
    let ts = match ts {
        Value::Null => None,
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        other => {
            return Err(CodecError::InvalidSlot {
                cell: key.to_string(),
                reason: format!("timestamp must be an integer or null, got {}", other),
            })
        }
    };

    // A half-written pair cannot be represented; treat it as never written.
    Ok(match (value, ts) {
        (Some(value), Some(ts)) => Some(SlotEntry::new(value, ts)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Bucket;

    fn sample_grid() -> SpeedGrid {
        let mut grid = SpeedGrid::new();
        let a = grid.entry(CellCoord::new(375_000, 1_270_000));
        a.set(Bucket::new(2), Some(SlotEntry::new(15.0, 1_700_000_000)));
        a.set(Bucket::new(3), Some(SlotEntry::new(-4.2, 1_700_000_100)));
        let b = grid.entry(CellCoord::new(-338_689, -1_512_093));
        b.set(Bucket::new(7), Some(SlotEntry::new(8.3, 1_699_999_999)));
        grid
    }

    fn restored(decoded: Decoded) -> (SpeedGrid, usize) {
        match decoded {
            Decoded::Restored {
                grid,
                repaired_cells,
            } => (grid, repaired_cells),
            Decoded::Incompatible(why) => panic!("unexpected incompatible payload: {}", why),
        }
    }

    #[test]
    fn test_roundtrip_plain() {
        let grid = sample_grid();
        let bytes = encode(&grid, None).unwrap();
        assert!(!is_gzip(&bytes));

        let (decoded, repaired) = restored(decode(&bytes).unwrap());
        assert_eq!(decoded, grid);
        assert_eq!(repaired, 0);
    }

    #[test]
    fn test_roundtrip_gzip() {
        let grid = sample_grid();
        let bytes = encode(&grid, Some(5)).unwrap();
        assert!(is_gzip(&bytes));

        let (decoded, _) = restored(decode(&bytes).unwrap());
        assert_eq!(decoded, grid);
        assert_eq!(decompress(&bytes).unwrap(), encode(&grid, None).unwrap());
    }

    #[test]
    fn test_encoded_shape() {
        let mut grid = SpeedGrid::new();
        grid.entry(CellCoord::new(1, 2))
            .set(Bucket::new(0), Some(SlotEntry::new(5.0, 100)));

        let bytes = encode(&grid, None).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let empty = ",[null,null]".repeat(7);
        assert_eq!(
            text,
            format!(
                r#"{{"format":"v4","dir_buckets":8,"cells":{{"1,2":[[5.0,100]{}]}}}}"#,
                empty
            )
        );
    }

    #[test]
    fn test_empty_grid_roundtrip() {
        let bytes = encode(&SpeedGrid::new(), Some(1)).unwrap();
        let (decoded, _) = restored(decode(&bytes).unwrap());
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_foreign_format_is_incompatible() {
        let payload = br#"{"format":"v2","dir_buckets":8,"cells":{}}"#;
        match decode(payload).unwrap() {
            Decoded::Incompatible(Incompatibility::Format(Some(tag))) => assert_eq!(tag, "v2"),
            other => panic!("expected format incompatibility, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_format_is_incompatible() {
        let payload = br#"{"dir_buckets":8,"cells":{}}"#;
        assert!(matches!(
            decode(payload).unwrap(),
            Decoded::Incompatible(Incompatibility::Format(None))
        ));
    }

    #[test]
    fn test_bucket_mismatch_is_incompatible() {
        let payload = br#"{"format":"v4","dir_buckets":16,"cells":{}}"#;
        assert!(matches!(
            decode(payload).unwrap(),
            Decoded::Incompatible(Incompatibility::BucketCount(_))
        ));
    }

    #[test]
    fn test_missing_bucket_count_defaults_to_eight() {
        let payload = br#"{"format":"v4","cells":{}}"#;
        let (grid, _) = restored(decode(payload).unwrap());
        assert!(grid.is_empty());
    }

    #[test]
    fn test_short_cell_is_repaired_to_empty() {
        let payload = br#"{"format":"v4","dir_buckets":8,"cells":{"1,2":[[5.0,100]],"3,4":"x"}}"#;
        let (grid, repaired) = restored(decode(payload).unwrap());

        assert_eq!(repaired, 2);
        assert_eq!(grid.len(), 2);
        assert!(grid.get(&CellCoord::new(1, 2)).unwrap().is_empty());
        assert!(grid.get(&CellCoord::new(3, 4)).unwrap().is_empty());
    }

    #[test]
    fn test_bad_pair_repairs_whole_cell() {
        let mut pairs = vec!["[5.0,100]".to_string(); 7];
        pairs.push("[1.0]".to_string());
        let payload = format!(
            r#"{{"format":"v4","dir_buckets":8,"cells":{{"1,2":[{}]}}}}"#,
            pairs.join(",")
        );

        let (grid, repaired) = restored(decode(payload.as_bytes()).unwrap());
        assert_eq!(repaired, 1);
        assert!(grid.get(&CellCoord::new(1, 2)).unwrap().is_empty());
    }

    #[test]
    fn test_half_written_pair_is_dropped() {
        let mut pairs = vec!["[null,null]".to_string(); 6];
        pairs.push("[5.0,null]".to_string());
        pairs.push("[6.0,100.9]".to_string());
        let payload = format!(
            r#"{{"format":"v4","dir_buckets":8,"cells":{{"1,2":[{}]}}}}"#,
            pairs.join(",")
        );

        let (grid, repaired) = restored(decode(payload.as_bytes()).unwrap());
        let cell = CellCoord::new(1, 2);
        assert_eq!(repaired, 0);
        assert_eq!(grid.slot(&cell, Bucket::new(6)), None);
        assert_eq!(grid.slot(&cell, Bucket::new(7)), Some(SlotEntry::new(6.0, 100)));
    }

    #[test]
    fn test_bad_cell_key_is_error() {
        let payload = br#"{"format":"v4","dir_buckets":8,"cells":{"nope":[]}}"#;
        assert!(matches!(decode(payload), Err(CodecError::CellKey(_))));
    }

    #[test]
    fn test_string_value_is_error() {
        let mut pairs = vec!["[null,null]".to_string(); 7];
        pairs.push(r#"["fast",100]"#.to_string());
        let payload = format!(
            r#"{{"format":"v4","dir_buckets":8,"cells":{{"1,2":[{}]}}}}"#,
            pairs.join(",")
        );
        assert!(matches!(
            decode(payload.as_bytes()),
            Err(CodecError::InvalidSlot { .. })
        ));
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(matches!(decode(b"not json"), Err(CodecError::Json(_))));
        assert!(matches!(decode(b"[1,2,3]"), Err(CodecError::Json(_))));
    }

    #[test]
    fn test_truncated_gzip_is_error() {
        let bytes = encode(&sample_grid(), Some(5)).unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(decode(truncated).is_err());
    }

    #[test]
    fn test_is_gzip() {
        assert!(is_gzip(&[0x1F, 0x8B, 0x08]));
        assert!(!is_gzip(&[0x1F]));
        assert!(!is_gzip(b"{}"));
    }
}
