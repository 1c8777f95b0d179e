//! Roadspeed - a location and heading keyed memory of driving speeds.
//!
//! Samples of observed speed are folded into a grid of ~11 m cells, each
//! split into eight 45° heading buckets. Positive values are cruise speeds,
//! negative values mark places where the driver decelerated. Queries project
//! the vehicle forward along its heading and return the remembered value for
//! the point ahead, searching nearby headings, distances and cells when the
//! exact slot is empty, but only trusting values at least two minutes old.
//!
//! The grid is persisted as a single snapshot blob through a
//! [`SnapshotStore`](store::SnapshotStore).
//!
//! ```no_run
//! use std::sync::Arc;
//! use roadspeed::{FileStore, SpeedCache, SpeedCacheConfig, SystemClock};
//!
//! let cache = SpeedCache::open(
//!     SpeedCacheConfig::default(),
//!     Arc::new(FileStore::new("/var/lib/roadspeed")),
//!     Arc::new(SystemClock),
//! );
//! let advisory = cache.query_target_default(37.5, 127.0, 90.0, 14.0);
//! # let _ = advisory;
//! cache.close();
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod grid;
pub mod logging;
pub mod query;
pub mod sample;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SpeedCacheConfig;
pub use engine::{CacheStats, InvalidateAction, LastHit, LoadOutcome, SpeedCache};
pub use error::{CodecError, ConfigError, SpeedCacheError, StoreError};
pub use geo::{Bucket, CellCoord};
pub use store::{FileStore, MemoryStore, SnapshotStore};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
