//! CLI error handling with user-friendly messages.

use std::fmt;
use std::path::PathBuf;
use std::process;

use roadspeed::{CodecError, ConfigError, SpeedCacheError, StoreError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be loaded
    Config { path: PathBuf, error: ConfigError },
    /// Snapshot store failure
    Store(StoreError),
    /// Stored snapshot could not be decoded
    Codec(CodecError),
    /// Speed cache operation failed
    Cache(SpeedCacheError),
    /// Output could not be rendered
    Output(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Codec(_) = self {
            eprintln!();
            eprintln!("The snapshot is unreadable. It will be discarded the next time");
            eprintln!("the cache is opened, or remove it now with: roadspeed purge");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config { path, error } => {
                write!(f, "Failed to load config '{}': {}", path.display(), error)
            }
            CliError::Store(e) => write!(f, "Snapshot store error: {}", e),
            CliError::Codec(e) => write!(f, "Failed to decode snapshot: {}", e),
            CliError::Cache(e) => write!(f, "Speed cache error: {}", e),
            CliError::Output(msg) => write!(f, "Failed to render output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config { error, .. } => Some(error),
            CliError::Store(e) => Some(e),
            CliError::Codec(e) => Some(e),
            CliError::Cache(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<CodecError> for CliError {
    fn from(e: CodecError) -> Self {
        CliError::Codec(e)
    }
}

impl From<SpeedCacheError> for CliError {
    fn from(e: SpeedCacheError) -> Self {
        CliError::Cache(e)
    }
}
