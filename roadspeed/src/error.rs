//! Error types for the speed cache.
//!
//! Only snapshot persistence and configuration can fail in a way the caller
//! sees. Sampling, querying and invalidation degrade to "no data" instead.

use thiserror::Error;

use crate::geo::ParseCellError;

/// Errors raised by a [`SnapshotStore`](crate::store::SnapshotStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error while reading, writing or deleting a key.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key contains characters the store cannot represent.
    #[error("Invalid store key '{0}'")]
    InvalidKey(String),

    /// The background writer could not be started.
    #[error("Failed to spawn writer: {0}")]
    SpawnError(String),
}

/// Errors raised while decoding a snapshot payload.
///
/// Any of these causes the loader to purge the stored key and start empty.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Gzip envelope could not be decompressed.
    #[error("Decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    /// Compression of an outgoing payload failed.
    #[error("Compression failed: {0}")]
    Compress(#[source] std::io::Error),

    /// Payload is not valid JSON or not the expected shape.
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A cell key is not of the form `"<gy>,<gx>"`.
    #[error(transparent)]
    CellKey(#[from] ParseCellError),

    /// A slot value or timestamp has an unusable type.
    #[error("Invalid slot in cell {cell}: {reason}")]
    InvalidSlot { cell: String, reason: String },
}

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Top-level error for [`SpeedCache`](crate::engine::SpeedCache) operations.
#[derive(Debug, Error)]
pub enum SpeedCacheError {
    /// Snapshot store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Snapshot encoding or decoding failure.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration failure.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
