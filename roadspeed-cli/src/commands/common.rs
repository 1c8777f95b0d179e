//! Shared setup for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use roadspeed::config::config_file_path;
use roadspeed::{FileStore, LoadOutcome, SpeedCache, SpeedCacheConfig, SystemClock};

use crate::error::CliError;

/// Default snapshot directory: `<data dir>/roadspeed`.
pub fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("roadspeed"))
        .unwrap_or_else(|| PathBuf::from(".roadspeed"))
}

/// Resolved configuration and store location for one CLI invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: SpeedCacheConfig,
    pub store_dir: PathBuf,
}

impl CommandContext {
    /// Resolve the context from global CLI options.
    ///
    /// A missing config file yields the defaults.
    pub fn resolve(
        store_dir: Option<PathBuf>,
        config_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        let path = config_path.unwrap_or_else(config_file_path);
        let config = SpeedCacheConfig::load_from(&path)
            .map_err(|error| CliError::Config { path, error })?;

        Ok(Self {
            config,
            store_dir: store_dir.unwrap_or_else(default_store_dir),
        })
    }

    /// Context with default configuration rooted at `store_dir`.
    #[cfg(test)]
    pub fn with_store_dir(store_dir: &Path) -> Self {
        Self {
            config: SpeedCacheConfig::default(),
            store_dir: store_dir.to_path_buf(),
        }
    }

    /// The snapshot store.
    pub fn store(&self) -> Arc<FileStore> {
        Arc::new(FileStore::new(&self.store_dir))
    }

    /// Open the cache on the wall clock.
    pub fn open_cache(&self) -> (SpeedCache, LoadOutcome) {
        SpeedCache::open_with_outcome(self.config.clone(), self.store(), Arc::new(SystemClock))
    }
}
