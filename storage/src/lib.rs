//! Time-series storage engine: per-series write-ahead log, two in-memory
//! chunks (head + previous), and flushed partitions each holding a commit
//! log and sparse timestamp index.

pub mod chunk;
pub mod context;
pub mod database;
pub mod error;
pub mod partition;
pub mod record;
pub mod series;
pub mod wal;

pub use chunk::{Chunk, DuplicationPolicy, Fit};
pub use context::DatabaseContext;
pub use database::Database;
pub use error::{Result, StorageError};
pub use record::Record;
pub use series::{SeriesOptions, TimeSeries};
