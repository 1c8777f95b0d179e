//! Speed cache configuration.
//!
//! [`SpeedCacheConfig`] holds every tunable of the engine with the defaults
//! the cache was designed around. It can be built in code with the `with_*`
//! methods or loaded from an INI file:
//!
//! ```ini
//! [storage]
//! key = SpeedTable
//! gzip = true
//! gzip_level = 5
//!
//! [query]
//! neighbor_ring = 1
//! neighbor_old_threshold = 120
//! lookahead = 2.0
//!
//! [invalidate]
//! window = 2.0
//!
//! [save]
//! interval = 60
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;

use crate::error::ConfigError;

/// Default key of the snapshot in the external store.
pub const DEFAULT_STORAGE_KEY: &str = "SpeedTable";

/// Default neighbor search radius in cells.
pub const DEFAULT_NEIGHBOR_RING: u32 = 1;

/// Default minimum age before a stored value is trusted.
pub const DEFAULT_NEIGHBOR_OLD_THRESHOLD_SECS: i64 = 120;

/// Default gzip level for snapshots.
pub const DEFAULT_GZIP_LEVEL: u32 = 5;

/// Default look-ahead horizon for speed-based queries.
pub const DEFAULT_LOOKAHEAD_SECS: f64 = 2.0;

/// Default window within which the last hit may be invalidated.
pub const DEFAULT_INVALIDATE_WINDOW_SECS: f64 = 2.0;

/// Default minimum interval between periodic snapshots.
pub const DEFAULT_SAVE_INTERVAL_SECS: i64 = 60;

/// Configuration for [`SpeedCache`](crate::engine::SpeedCache).
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedCacheConfig {
    /// Key of the snapshot in the external store.
    pub storage_key: String,

    /// Chebyshev radius of the neighbor search (0 disables it).
    pub neighbor_ring: u32,

    /// Minimum age in seconds before a stored value is returned by a query.
    pub neighbor_old_threshold_secs: i64,

    /// Whether snapshots are gzip-compressed.
    pub use_gzip: bool,

    /// Gzip level (0-9).
    pub gzip_level: u32,

    /// Horizon used by [`query_target_default`](crate::engine::SpeedCache::query_target_default).
    pub lookahead_secs: f64,

    /// Window used by [`invalidate_last_hit_default`](crate::engine::SpeedCache::invalidate_last_hit_default).
    pub invalidate_window_secs: f64,

    /// Interval used by [`maybe_save_default`](crate::engine::SpeedCache::maybe_save_default).
    pub save_interval_secs: i64,
}

impl Default for SpeedCacheConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            neighbor_ring: DEFAULT_NEIGHBOR_RING,
            neighbor_old_threshold_secs: DEFAULT_NEIGHBOR_OLD_THRESHOLD_SECS,
            use_gzip: true,
            gzip_level: DEFAULT_GZIP_LEVEL,
            lookahead_secs: DEFAULT_LOOKAHEAD_SECS,
            invalidate_window_secs: DEFAULT_INVALIDATE_WINDOW_SECS,
            save_interval_secs: DEFAULT_SAVE_INTERVAL_SECS,
        }
    }
}

impl SpeedCacheConfig {
    /// Set the storage key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the neighbor search radius.
    pub fn with_neighbor_ring(mut self, ring: u32) -> Self {
        self.neighbor_ring = ring;
        self
    }

    /// Set the old-only gate threshold.
    pub fn with_neighbor_old_threshold_secs(mut self, secs: i64) -> Self {
        self.neighbor_old_threshold_secs = secs;
        self
    }

    /// Enable or disable gzip compression.
    pub fn with_gzip(mut self, enabled: bool) -> Self {
        self.use_gzip = enabled;
        self
    }

    /// Set the gzip level, clamped to 0-9.
    pub fn with_gzip_level(mut self, level: u32) -> Self {
        self.gzip_level = level.min(9);
        self
    }

    /// Set the default look-ahead horizon.
    pub fn with_lookahead_secs(mut self, secs: f64) -> Self {
        self.lookahead_secs = secs;
        self
    }

    /// Set the default invalidation window.
    pub fn with_invalidate_window_secs(mut self, secs: f64) -> Self {
        self.invalidate_window_secs = secs;
        self
    }

    /// Set the default save interval.
    pub fn with_save_interval_secs(mut self, secs: i64) -> Self {
        self.save_interval_secs = secs;
        self
    }

    /// Gzip level to encode with, or `None` when compression is off.
    pub fn compression(&self) -> Option<u32> {
        self.use_gzip.then_some(self.gzip_level)
    }

    /// Load configuration from an INI file.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Build configuration from a parsed INI document, overlaying defaults.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // [storage] section
        if let Some(section) = ini.section(Some("storage")) {
            if let Some(v) = section.get("key") {
                let v = v.trim();
                if v.is_empty() {
                    return Err(invalid("storage", "key", v, "must not be empty"));
                }
                config.storage_key = v.to_string();
            }
            if let Some(v) = section.get("gzip") {
                config.use_gzip = parse_bool(v)
                    .ok_or_else(|| invalid("storage", "gzip", v, "must be true or false"))?;
            }
            if let Some(v) = section.get("gzip_level") {
                let level: u32 = parse_value("storage", "gzip_level", v, "must be 0-9")?;
                if level > 9 {
                    return Err(invalid("storage", "gzip_level", v, "must be 0-9"));
                }
                config.gzip_level = level;
            }
        }

        // [query] section
        if let Some(section) = ini.section(Some("query")) {
            if let Some(v) = section.get("neighbor_ring") {
                config.neighbor_ring =
                    parse_value("query", "neighbor_ring", v, "must be a non-negative integer")?;
            }
            if let Some(v) = section.get("neighbor_old_threshold") {
                config.neighbor_old_threshold_secs = parse_value(
                    "query",
                    "neighbor_old_threshold",
                    v,
                    "must be an integer (seconds)",
                )?;
            }
            if let Some(v) = section.get("lookahead") {
                config.lookahead_secs =
                    parse_non_negative("query", "lookahead", v, "must be >= 0 (seconds)")?;
            }
        }

        // [invalidate] section
        if let Some(section) = ini.section(Some("invalidate")) {
            if let Some(v) = section.get("window") {
                config.invalidate_window_secs =
                    parse_non_negative("invalidate", "window", v, "must be >= 0 (seconds)")?;
            }
        }

        // [save] section
        if let Some(section) = ini.section(Some("save")) {
            if let Some(v) = section.get("interval") {
                config.save_interval_secs =
                    parse_value("save", "interval", v, "must be an integer (seconds)")?;
            }
        }

        Ok(config)
    }
}

/// Get the path to the default config file (`<config_dir>/roadspeed/config.ini`).
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("roadspeed")
        .join("config.ini")
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_non_negative(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<f64, ConfigError> {
    let parsed: f64 = parse_value(section, key, value, reason)?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(invalid(section, key, value, reason));
    }
    Ok(parsed)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
