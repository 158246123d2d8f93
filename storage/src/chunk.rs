use std::path::Path;

use crate::error::{Result, StorageError};
use crate::record::{bucket_search, Record, RecordBucket};
use crate::wal::{ChunkRole, Wal};

/// Number of one-second buckets held by a chunk: 15 minutes.
pub const CHUNK_SIZE: usize = 900;

/// Rule applied when a record lands on a timestamp already occupied within a
/// bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicationPolicy {
    /// Drop the new point; the insert still succeeds.
    Ignore,
    /// Append the new point as a duplicate, keeping bucket order.
    Insert,
}

/// Where a given whole-second timestamp falls relative to a chunk's
/// `[base_offset_sec, base_offset_sec + CHUNK_SIZE)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// Strictly before the chunk's window.
    Older,
    /// Within the chunk's window.
    InRange,
    /// At or beyond the chunk's window.
    Newer,
}

/// A fixed 900-bucket in-memory window of a time series, anchored at
/// `base_offset_sec`, backed by a write-ahead log so it can be rebuilt after
/// a restart.
pub struct Chunk {
    role: ChunkRole,
    base_offset_sec: u64,
    start_ts_ns: u64,
    end_ts_ns: u64,
    max_index: usize,
    buckets: Vec<RecordBucket>,
    wal: Wal,
    initialized: bool,
}

impl Chunk {
    /// Creates a new chunk anchored at `base_offset_sec`, with a freshly
    /// opened WAL file.
    pub fn init(series_dir: &Path, role: ChunkRole, base_offset_sec: u64) -> Result<Self> {
        let wal = Wal::open(series_dir, role, base_offset_sec).map_err(StorageError::InitPartition)?;
        Ok(Chunk {
            role,
            base_offset_sec,
            start_ts_ns: 0,
            end_ts_ns: 0,
            max_index: 0,
            buckets: (0..CHUNK_SIZE).map(|_| RecordBucket::new()).collect(),
            wal,
            initialized: true,
        })
    }

    /// Rebuilds a chunk of the given `role` from an on-disk WAL file whose
    /// anchor second is `base_offset_sec`, replaying every record back into
    /// its bucket without re-appending to the WAL.
    pub fn rebuild(series_dir: &Path, role: ChunkRole, base_offset_sec: u64) -> Result<Self> {
        let wal = Wal::open(series_dir, role, base_offset_sec).map_err(StorageError::InitPartition)?;
        let records = wal.replay()?;
        let mut chunk = Chunk {
            role,
            base_offset_sec,
            start_ts_ns: 0,
            end_ts_ns: 0,
            max_index: 0,
            buckets: (0..CHUNK_SIZE).map(|_| RecordBucket::new()).collect(),
            wal,
            initialized: true,
        };
        for r in records {
            chunk.set_in_memory(r, DuplicationPolicy::Insert);
        }
        Ok(chunk)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn base_offset_sec(&self) -> u64 {
        self.base_offset_sec
    }

    pub fn start_ts_ns(&self) -> u64 {
        self.start_ts_ns
    }

    pub fn end_ts_ns(&self) -> u64 {
        self.end_ts_ns
    }

    pub fn wal_size(&self) -> u64 {
        self.wal.size()
    }

    pub fn role(&self) -> ChunkRole {
        self.role
    }

    /// Classifies a whole-second timestamp relative to this chunk's window.
    pub fn fit(&self, sec: u64) -> Fit {
        if sec < self.base_offset_sec {
            Fit::Older
        } else if sec >= self.base_offset_sec + CHUNK_SIZE as u64 {
            Fit::Newer
        } else {
            Fit::InRange
        }
    }

    /// Appends `record` to the WAL, then mutates the in-memory bucket. The
    /// WAL write happens first so a crash never acknowledges a point that
    /// cannot be recovered.
    pub fn insert(&mut self, record: Record, policy: DuplicationPolicy) -> Result<()> {
        self.wal.append(&record).map_err(StorageError::WalAppend)?;
        self.set_in_memory(record, policy);
        Ok(())
    }

    fn set_in_memory(&mut self, record: Record, policy: DuplicationPolicy) {
        let (sec, _) = Record::split_ts(record.timestamp_ns);
        let relative = (sec - self.base_offset_sec) as usize;
        let bucket = &mut self.buckets[relative];

        match bucket_search(bucket, record.timestamp_ns) {
            Ok(idx) => {
                if policy == DuplicationPolicy::Insert {
                    bucket.insert(idx + 1, record);
                }
                // Ignore: drop the new point, keep the existing one.
            }
            Err(idx) => bucket.insert(idx, record),
        }

        if self.start_ts_ns == 0 || record.timestamp_ns < self.start_ts_ns {
            self.start_ts_ns = record.timestamp_ns;
        }
        if record.timestamp_ns > self.end_ts_ns {
            self.end_ts_ns = record.timestamp_ns;
        }
        if relative > self.max_index {
            self.max_index = relative;
        }
    }

    /// Exact-timestamp lookup within this chunk.
    pub fn find(&self, timestamp_ns: u64) -> Option<Record> {
        let (sec, _) = Record::split_ts(timestamp_ns);
        if self.fit(sec) != Fit::InRange {
            return None;
        }
        let relative = (sec - self.base_offset_sec) as usize;
        let bucket = &self.buckets[relative];
        match bucket_search(bucket, timestamp_ns) {
            Ok(idx) => Some(bucket[idx]),
            Err(_) => None,
        }
    }

    /// Returns every record whose timestamp lies in `[t0, t1]`, oldest to
    /// newest.
    pub fn range(&self, t0: u64, t1: u64) -> Vec<Record> {
        let mut out = Vec::new();
        for bucket in self.buckets.iter().take(self.max_index + 1) {
            for record in bucket {
                if record.timestamp_ns >= t0 && record.timestamp_ns <= t1 {
                    out.push(*record);
                }
            }
        }
        out
    }

    /// Returns every record held by this chunk, oldest to newest.
    pub fn scan(&self) -> Vec<Record> {
        let mut out = Vec::new();
        for bucket in self.buckets.iter().take(self.max_index + 1) {
            out.extend_from_slice(bucket);
        }
        out
    }

    pub fn non_empty_buckets(&self) -> impl Iterator<Item = (usize, &RecordBucket)> {
        self.buckets
            .iter()
            .enumerate()
            .take(self.max_index + 1)
            .filter(|(_, b)| !b.is_empty())
    }

    /// Consumes this chunk's WAL file, removing it from disk. Called once
    /// the chunk has been durably flushed to a partition.
    pub fn discard_wal(self) -> Result<()> {
        self.wal.remove().map_err(StorageError::Io)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.max_index == 0 && self.buckets[0].is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn insert_within_a_bucket_stays_ordered() {
        let dir = tempdir().unwrap();
        let mut chunk = Chunk::init(dir.path(), ChunkRole::Head, 1_700_000_000).unwrap();

        let base = 1_700_000_000u64 * 1_000_000_000;
        chunk
            .insert(Record::new(base + 500, 2.0), DuplicationPolicy::Insert)
            .unwrap();
        chunk
            .insert(Record::new(base + 100, 1.0), DuplicationPolicy::Insert)
            .unwrap();
        chunk
            .insert(Record::new(base + 900, 3.0), DuplicationPolicy::Insert)
            .unwrap();

        let scanned = chunk.scan();
        assert_eq!(scanned.len(), 3);
        assert!(scanned.windows(2).all(|w| w[0].timestamp_ns < w[1].timestamp_ns));
    }

    #[test]
    fn fit_classifies_seconds_relative_to_window() {
        let dir = tempdir().unwrap();
        let chunk = Chunk::init(dir.path(), ChunkRole::Head, 1_000).unwrap();
        assert_eq!(chunk.fit(999), Fit::Older);
        assert_eq!(chunk.fit(1_000), Fit::InRange);
        assert_eq!(chunk.fit(1_899), Fit::InRange);
        assert_eq!(chunk.fit(1_900), Fit::Newer);
    }

    #[test]
    fn ignore_policy_drops_duplicate_timestamp() {
        let dir = tempdir().unwrap();
        let mut chunk = Chunk::init(dir.path(), ChunkRole::Head, 1_700_000_000).unwrap();
        let ts = 1_700_000_000u64 * 1_000_000_000 + 5;

        chunk
            .insert(Record::new(ts, 1.0), DuplicationPolicy::Ignore)
            .unwrap();
        chunk
            .insert(Record::new(ts, 2.0), DuplicationPolicy::Ignore)
            .unwrap();

        assert_eq!(chunk.find(ts), Some(Record::new(ts, 1.0)));
    }
}
