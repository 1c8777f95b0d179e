//! File-backed snapshot store.
//!
//! Each key maps to `<root>/<key>`. Writes go to `<key>.tmp` and are renamed
//! into place, so a reader never observes a half-written snapshot.
//!
//! `put_nonblocking` hands the bytes to a short-lived writer thread and
//! returns immediately. Writes are sequenced: if several are in flight for
//! the same store, a writer that finds a newer snapshot already on disk
//! skips its own.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::SnapshotStore;
use crate::error::StoreError;

/// Shared state between the store and its writer threads.
#[derive(Debug, Default)]
struct WriteSequencer {
    /// Serializes writers and records the newest sequence written.
    written: Mutex<u64>,
    /// Next sequence number to hand out.
    next: AtomicU64,
}

/// Snapshot store that keeps one file per key under a root directory.
pub struct FileStore {
    root: PathBuf,
    sequencer: Arc<WriteSequencer>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("root", &self.root)
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequencer: Arc::new(WriteSequencer::default()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`.
    ///
    /// Keys are restricted to ASCII letters, digits, `_`, `-` and `.` (not
    /// leading) so they cannot escape the root directory.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, data)?;
        fs::rename(&temp_path, path)
    }
}

impl SnapshotStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put_nonblocking(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let seq = self.sequencer.next.fetch_add(1, Ordering::SeqCst) + 1;
        let sequencer = Arc::clone(&self.sequencer);

        let handle = std::thread::Builder::new()
            .name("roadspeed-store".to_string())
            .spawn(move || {
                let mut written = sequencer.written.lock();
                if *written > seq {
                    debug!(seq, newest = *written, "Skipping superseded snapshot write");
                    return;
                }
                match Self::write_atomic(&path, &value) {
                    Ok(()) => {
                        *written = seq;
                        debug!(path = %path.display(), bytes = value.len(), "Snapshot written");
                    }
                    Err(e) => {
                        warn!(error = %e, path = %path.display(), "Snapshot write failed");
                    }
                }
            })
            .map_err(|e| StoreError::SpawnError(e.to_string()))?;

        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        // An in-flight write would otherwise resurrect the key.
        self.flush();
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn flush(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.pending.lock());
        for handle in handles {
            if handle.join().is_err() {
                warn!("Snapshot writer thread panicked");
            }
        }
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_key_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.get("SpeedTable").unwrap(), None);
        assert!(!store.delete("SpeedTable").unwrap());
    }

    #[test]
    fn test_put_flush_get() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        store.put_nonblocking("SpeedTable", vec![1, 2, 3]).unwrap();
        store.flush();

        assert_eq!(store.get("SpeedTable").unwrap(), Some(vec![1, 2, 3]));
        assert!(!dir.path().join("nested").join("SpeedTable.tmp").exists());
    }

    #[test]
    fn test_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        for i in 0..10u8 {
            store.put_nonblocking("k", vec![i]).unwrap();
        }
        store.flush();

        assert_eq!(store.get("k").unwrap(), Some(vec![9]));
    }

    #[test]
    fn test_delete_waits_for_pending_write() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        store.put_nonblocking("k", vec![7]).unwrap();
        assert!(store.delete("k").unwrap());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let store = FileStore::new("/tmp/unused");
        for key in ["", "../escape", "a/b", ".hidden", "sp ace"] {
            assert!(
                matches!(store.path_for(key), Err(StoreError::InvalidKey(_))),
                "key '{}' should be rejected",
                key
            );
        }
        assert!(store.path_for("Speed_Table-v4.bin").is_ok());
    }

    #[test]
    fn test_drop_flushes() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::new(dir.path());
            store.put_nonblocking("k", vec![42]).unwrap();
        }
        assert_eq!(fs::read(dir.path().join("k")).unwrap(), vec![42]);
    }
}
