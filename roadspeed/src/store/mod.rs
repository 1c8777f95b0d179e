//! Snapshot store interface.
//!
//! The `SnapshotStore` trait is the only persistence surface the speed cache
//! depends on: a keyed blob store with a blocking read, a fire-and-forget
//! write and a delete.
//!
//! # Available Stores
//!
//! - [`MemoryStore`]: in-process map, writes are applied synchronously
//! - [`FileStore`]: one file per key, writes happen on a background thread
//!
//! # Example
//!
//! ```
//! use roadspeed::store::{MemoryStore, SnapshotStore};
//!
//! let store = MemoryStore::new();
//! store.put_nonblocking("SpeedTable", b"{}".to_vec()).unwrap();
//! assert_eq!(store.get("SpeedTable").unwrap(), Some(b"{}".to_vec()));
//! ```

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;

/// Keyed blob storage for grid snapshots.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single store is shared by the
/// cache and may be called from whichever thread drives it.
pub trait SnapshotStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(data))` if the key exists
    /// - `Ok(None)` if the key is not found
    /// - `Err(_)` if the read failed
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key` without waiting for it to become durable.
    ///
    /// An `Ok` return only means the write was accepted. Failures after that
    /// point are reported by the store itself and are not retried.
    fn put_nonblocking(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Delete `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the key existed and was deleted
    /// - `Ok(false)` if the key did not exist
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Block until previously accepted writes have completed.
    ///
    /// Stores that write synchronously need not override this.
    fn flush(&self) {}
}
