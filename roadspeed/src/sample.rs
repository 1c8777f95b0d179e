//! Sample ingestion merge policy.
//!
//! Each sample updates exactly one `(cell, bucket)` slot. The merge rules are
//! asymmetric between positive (cruise) and negative
//! (deceleration) samples:
//!
//! | Existing slot   | Incoming `> 0`                     | Incoming `< 0`         |
//! |-----------------|------------------------------------|------------------------|
//! | empty           | `(v_in, now)`                      | `(v_in, now)`          |
//! | `v_old < 0`     | `(v_in, ts_old)`                   | `(v_in, ts_old)`       |
//! | `v_old >= 0`    | `(round((v_old + v_in) / 2), ts_old)` | `(v_in, ts_old)`    |
//!
//! Only the first write to an empty slot stamps the current time; every later
//! merge carries the first timestamp forward.

use crate::grid::{Slot, SlotEntry};

/// Rounds a speed to one decimal place.
///
/// Rounds the exact binary value, with ties going to the even digit. `5.05`
/// is stored as slightly less than 5.05 and rounds to `5.0`; `5.25` is exact
/// and rounds to `5.2`. Scaling by ten first would blur both cases.
pub fn round_tenth(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.1}", value).parse().unwrap_or(value)
}

/// Normalizes a raw signed speed for storage.
///
/// Returns `None` for samples that carry no directional information: values
/// that round to `0.0`, and non-finite values.
pub fn normalize_speed(speed: f64) -> Option<f64> {
    if !speed.is_finite() {
        return None;
    }
    let rounded = round_tenth(speed);
    if rounded == 0.0 {
        None
    } else {
        Some(rounded)
    }
}

/// Merges a normalized, non-zero speed into an existing slot.
///
/// # Arguments
///
/// * `existing` - Current slot contents
/// * `incoming` - Speed already passed through [`normalize_speed`]
/// * `now` - Current epoch seconds, used only when the slot is empty
pub fn merge_sample(existing: Slot, incoming: f64, now: i64) -> Slot {
    let Some(old) = existing else {
        return Some(SlotEntry::new(incoming, now));
    };

    let value = if incoming > 0.0 && old.value >= 0.0 {
        round_tenth((old.value + incoming) / 2.0)
    } else {
        // A positive sample replaces a deceleration hint outright, and a
        // negative sample always wins without smoothing.
        incoming
    };

    Some(SlotEntry::new(value, old.timestamp))
}
