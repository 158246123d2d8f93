use std::io;

use thiserror::Error;

/// Errors surfaced by the storage engine.
///
/// These map directly onto the taxonomy in the system's error handling
/// design: WAL/partition I/O failures, capacity failures, and range/lookup
/// failures on the series and database namespaces.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("wal append failed: {0}")]
    WalAppend(#[source] io::Error),

    #[error("failed to initialize partition: {0}")]
    InitPartition(#[source] io::Error),

    #[error("chunk is out of memory")]
    ChunkOutOfMemory,

    #[error("invalid range: start {0} is after end {1}")]
    InvalidRange(u64, u64),

    #[error("series '{0}' not found")]
    SeriesNotFound(String),

    #[error("series '{0}' already exists")]
    SeriesAlreadyExists(String),

    #[error("database '{0}' not found")]
    DatabaseNotFound(String),

    #[error("database '{0}' already exists")]
    DatabaseAlreadyExists(String),

    #[error("no active database selected")]
    NoActiveDatabase,

    #[error("series '{0}' has reached its maximum number of partitions")]
    TooManyPartitions(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
