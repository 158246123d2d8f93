use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;

use crate::chunk::{Chunk, DuplicationPolicy, Fit};
use crate::error::{Result, StorageError};
use crate::partition::{discover_partitions, Partition};
use crate::record::Record;
use crate::wal::{parse_wal_file_name, ChunkRole};

/// Maximum number of flushed partitions a series retains.
pub const TS_MAX_PARTITIONS: usize = 16;

/// Default WAL byte size at which a chunk is flushed to a partition.
pub const DEFAULT_FLUSH_SIZE: u64 = 4096;

#[derive(Debug, Clone)]
pub struct SeriesOptions {
    pub retention: Option<Duration>,
    pub flushsize: u64,
    pub duplication_policy: DuplicationPolicy,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        SeriesOptions {
            retention: None,
            flushsize: DEFAULT_FLUSH_SIZE,
            duplication_policy: DuplicationPolicy::Insert,
        }
    }
}

/// A named, owned time series: a head chunk receiving the newest writes, an
/// optional previous chunk absorbing out-of-order writes, and up to
/// [`TS_MAX_PARTITIONS`] flushed, read-only partitions.
pub struct TimeSeries {
    name: String,
    dir: PathBuf,
    options: SeriesOptions,
    head: Option<Chunk>,
    prev: Option<Chunk>,
    partitions: Vec<Partition>,
}

impl TimeSeries {
    pub fn create(dir: &Path, name: &str, options: SeriesOptions) -> Result<Self> {
        let series_dir = dir.join(name);
        fs::create_dir_all(&series_dir)?;
        Ok(TimeSeries {
            name: name.to_string(),
            dir: series_dir,
            options,
            head: None,
            prev: None,
            partitions: Vec::new(),
        })
    }

    /// Rebuilds a series from its on-disk directory: replays any WAL files
    /// found back into chunks, and opens any flushed partitions.
    pub fn open(dir: &Path, name: &str, options: SeriesOptions) -> Result<Self> {
        let series_dir = dir.join(name);
        let mut head = None;
        let mut prev = None;

        if series_dir.exists() {
            for entry in fs::read_dir(&series_dir)? {
                let entry = entry?;
                let file_name = entry.file_name();
                let file_name = file_name.to_string_lossy();
                if let Some((role, base)) = parse_wal_file_name(&file_name) {
                    let chunk = Chunk::rebuild(&series_dir, role, base)?;
                    match role {
                        ChunkRole::Head => head = Some(chunk),
                        ChunkRole::Previous => prev = Some(chunk),
                    }
                }
            }
        }

        let mut partitions = Vec::new();
        for base in discover_partitions(&series_dir)? {
            partitions.push(Partition::open(&series_dir, base)?);
        }
        partitions.sort_by_key(|p| p.start_ts());

        debug!(
            "rebuilt series '{}': head={} prev={} partitions={}",
            name,
            head.is_some(),
            prev.is_some(),
            partitions.len()
        );

        Ok(TimeSeries {
            name: name.to_string(),
            dir: series_dir,
            options,
            head,
            prev,
            partitions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &SeriesOptions {
        &self.options
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Appends a record, maintaining in-bucket ordering. Out-of-order writes
    /// within the head's window are allowed in place; writes older than the
    /// head's base second go to the previous chunk, rotating it as needed.
    pub fn insert(&mut self, timestamp_ns: u64, value: f64) -> Result<()> {
        let (sec, _) = Record::split_ts(timestamp_ns);
        let record = Record::new(timestamp_ns, value);

        if let Some(head) = &self.head {
            if head.wal_size() >= self.options.flushsize {
                self.flush_all()?;
            }
        }

        match &self.head {
            Some(head) if sec < head.base_offset_sec() => {
                self.insert_into_prev(sec)?;
                self.prev
                    .as_mut()
                    .expect("prev initialized by insert_into_prev")
                    .insert(record, self.options.duplication_policy)
            }
            Some(head) => match head.fit(sec) {
                Fit::InRange => self
                    .head
                    .as_mut()
                    .unwrap()
                    .insert(record, self.options.duplication_policy),
                Fit::Newer => {
                    self.rotate(sec)?;
                    self.head
                        .as_mut()
                        .unwrap()
                        .insert(record, self.options.duplication_policy)
                }
                Fit::Older => unreachable!("sec >= head.base_offset_sec was already checked"),
            },
            None => {
                self.head = Some(Chunk::init(&self.dir, ChunkRole::Head, sec)?);
                self.head
                    .as_mut()
                    .unwrap()
                    .insert(record, self.options.duplication_policy)
            }
        }
    }

    fn insert_into_prev(&mut self, sec: u64) -> Result<()> {
        match &self.prev {
            None => {
                self.prev = Some(Chunk::init(&self.dir, ChunkRole::Previous, sec)?);
            }
            Some(prev) => match prev.fit(sec) {
                Fit::InRange => {}
                Fit::Older | Fit::Newer => {
                    let old_prev = self.prev.take().unwrap();
                    self.flush_chunk(old_prev)?;
                    self.prev = Some(Chunk::init(&self.dir, ChunkRole::Previous, sec)?);
                }
            },
        }
        Ok(())
    }

    fn rotate(&mut self, sec: u64) -> Result<()> {
        if let Some(prev) = self.prev.take() {
            self.flush_chunk(prev)?;
        }
        let old_head = self.head.take().expect("rotate only called with a head");
        self.prev = Some(old_head);
        self.head = Some(Chunk::init(&self.dir, ChunkRole::Head, sec)?);
        Ok(())
    }

    fn flush_all(&mut self) -> Result<()> {
        if let Some(prev) = self.prev.take() {
            self.flush_chunk(prev)?;
        }
        if let Some(head) = self.head.take() {
            self.flush_chunk(head)?;
        }
        Ok(())
    }

    fn flush_chunk(&mut self, chunk: Chunk) -> Result<()> {
        if chunk.is_empty() {
            chunk.discard_wal()?;
            return Ok(());
        }
        if self.partitions.len() >= TS_MAX_PARTITIONS {
            return Err(StorageError::TooManyPartitions(self.name.clone()));
        }
        let partition = Partition::flush(&self.dir, &chunk)?;
        chunk.discard_wal()?;
        debug!(
            "flushed series '{}' chunk to partition base={}",
            self.name,
            partition.base_offset_sec()
        );
        self.partitions.push(partition);
        Ok(())
    }

    /// Exact-timestamp lookup: head, then previous chunk, then partitions in
    /// base-timestamp order.
    pub fn find(&self, timestamp_ns: u64) -> Result<Option<Record>> {
        if let Some(head) = &self.head {
            if let Some(r) = head.find(timestamp_ns) {
                return Ok(Some(r));
            }
        }
        if let Some(prev) = &self.prev {
            if let Some(r) = prev.find(timestamp_ns) {
                return Ok(Some(r));
            }
        }
        for partition in &self.partitions {
            if let Some(r) = partition.find(timestamp_ns)? {
                return Ok(Some(r));
            }
        }
        Ok(None)
    }

    /// Inclusive range scan, possibly spanning chunks and partitions.
    /// Results are returned oldest-to-newest: partitions, then the previous
    /// chunk, then the head.
    pub fn range(&self, t0: u64, t1: u64) -> Result<Vec<Record>> {
        if t0 > t1 {
            return Err(StorageError::InvalidRange(t0, t1));
        }
        let mut out = Vec::new();
        for partition in &self.partitions {
            if partition.end_ts() < t0 || partition.start_ts() > t1 {
                continue;
            }
            out.extend(partition.range(t0, t1)?);
        }
        if let Some(prev) = &self.prev {
            out.extend(prev.range(t0, t1));
        }
        if let Some(head) = &self.head {
            out.extend(head.range(t0, t1));
        }
        Ok(out)
    }

    /// Returns the full series, oldest to newest: partitions, then previous,
    /// then head.
    pub fn scan(&self) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        for partition in &self.partitions {
            out.extend(partition.scan()?);
        }
        if let Some(prev) = &self.prev {
            out.extend(prev.scan());
        }
        if let Some(head) = &self.head {
            out.extend(head.scan());
        }
        Ok(out)
    }

    /// Same data as [`scan`](Self::scan), yielded in bounded batches so the
    /// full series need not be materialized at once.
    pub fn scan_batches(&self, batch_size: usize) -> Result<Vec<Vec<Record>>> {
        let all = self.scan()?;
        Ok(all.chunks(batch_size.max(1)).map(|c| c.to_vec()).collect())
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn single_record_round_trip() {
        let dir = tempdir().unwrap();
        let mut ts = TimeSeries::create(dir.path(), "cpu", SeriesOptions::default()).unwrap();
        ts.insert(1_700_000_000_000_000_000, 42.5).unwrap();
        assert_eq!(
            ts.find(1_700_000_000_000_000_000).unwrap(),
            Some(Record::new(1_700_000_000_000_000_000, 42.5))
        );
    }

    #[test]
    fn range_across_buckets() {
        let dir = tempdir().unwrap();
        let mut ts = TimeSeries::create(dir.path(), "cpu", SeriesOptions::default()).unwrap();
        let t0 = 1_700_000_000_000_000_000u64;
        for i in 0..90u64 {
            ts.insert(t0 + i * 1_000_000_000, i as f64).unwrap();
        }
        let ranged = ts.range(t0 + 10 * 1_000_000_000, t0 + 20 * 1_000_000_000).unwrap();
        assert_eq!(ranged.len(), 11);
        assert_eq!(ranged[0].value, 10.0);
        assert_eq!(ranged[10].value, 20.0);
    }

    #[test]
    fn out_of_order_earlier_second_creates_prev() {
        let dir = tempdir().unwrap();
        let mut ts = TimeSeries::create(dir.path(), "cpu", SeriesOptions::default()).unwrap();
        let t0 = 1_700_000_000_000_000_000u64;
        for i in 0..90u64 {
            ts.insert(t0 + i * 1_000_000_000, i as f64).unwrap();
        }

        let older = t0 - 1_000 * 1_000_000_000;
        ts.insert(older, 999.0).unwrap();

        assert_eq!(ts.find(older).unwrap(), Some(Record::new(older, 999.0)));
        assert!(ts.prev.is_some());
        assert_eq!(
            ts.prev.as_ref().unwrap().base_offset_sec(),
            older / 1_000_000_000
        );
    }

    #[test]
    fn flush_and_read_back() {
        let dir = tempdir().unwrap();
        let mut options = SeriesOptions::default();
        options.flushsize = 160; // 10 WAL records of 16 bytes
        let mut ts = TimeSeries::create(dir.path(), "cpu", options).unwrap();

        let t0 = 1_700_000_000_000_000_000u64;
        for i in 0..50u64 {
            ts.insert(t0 + i * 1_000_000_000, i as f64).unwrap();
        }

        assert!(ts.partition_count() > 0);
        assert_eq!(ts.find(t0).unwrap(), Some(Record::new(t0, 0.0)));
        let ranged = ts.range(t0, t0 + 49 * 1_000_000_000).unwrap();
        assert_eq!(ranged.len(), 50);
    }
}
