use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::chunk::Chunk;
use crate::error::{Result, StorageError};
use crate::record::Record;

/// Maximum number of records serialized contiguously in one flush batch.
pub const BATCH_SIZE: usize = 64;

const RECORD_PAYLOAD_LEN: u64 = 16; // u64 ts_ns + f64 value
const BATCH_HEADER_LEN: u64 = 16; // u64 batch_bytes + u64 last_timestamp_ns
const RECORD_ENTRY_LEN: u64 = 8 + RECORD_PAYLOAD_LEN; // u64 record_bytes tag + payload
const INDEX_ENTRY_LEN: u64 = 16; // u64 relative_ts_ns + u64 offset

fn commit_log_file_name(base_offset_sec: u64) -> String {
    format!("c-{}.log", base_offset_sec)
}

fn index_file_name(base_offset_sec: u64) -> String {
    format!("i-{}.index", base_offset_sec)
}

/// A closed, flushed range of a series, persisted as a commit log (variable
/// length batches of records) plus a sparse index mapping a batch's first
/// relative timestamp to its byte offset in the commit log.
pub struct Partition {
    base_offset_sec: u64,
    commit_log_path: PathBuf,
    index_path: PathBuf,
    start_ts: u64,
    end_ts: u64,
    base_ns: u64,
    initialized: bool,
    index: Vec<(u64, u64)>,
}

impl Partition {
    pub fn start_ts(&self) -> u64 {
        self.start_ts
    }

    pub fn end_ts(&self) -> u64 {
        self.end_ts
    }

    pub fn base_offset_sec(&self) -> u64 {
        self.base_offset_sec
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Nanosecond remainder of the first record ever flushed into this
    /// partition, captured for timestamp reconstruction purposes.
    pub fn base_ns(&self) -> u64 {
        self.base_ns
    }

    /// Flushes every non-empty bucket of `chunk` into a new partition
    /// anchored at `chunk.base_offset_sec()`.
    pub fn flush(series_dir: &Path, chunk: &Chunk) -> Result<Self> {
        let base_offset_sec = chunk.base_offset_sec();
        let commit_log_path = series_dir.join(commit_log_file_name(base_offset_sec));
        let index_path = series_dir.join(index_file_name(base_offset_sec));

        let mut commit_log = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&commit_log_path)
            .map_err(StorageError::InitPartition)?;
        let mut index_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&index_path)
            .map_err(StorageError::InitPartition)?;

        let mut index = Vec::new();
        let mut start_ts: Option<u64> = None;
        let mut end_ts = 0u64;
        let mut base_ns = 0u64;
        let mut offset: u64 = 0;

        for (_, bucket) in chunk.non_empty_buckets() {
            for batch in bucket.chunks(BATCH_SIZE) {
                let first_ts = batch[0].timestamp_ns;
                let last_ts = batch[batch.len() - 1].timestamp_ns;

                if start_ts.is_none() {
                    start_ts = Some(first_ts);
                    let (_, nsec) = Record::split_ts(first_ts);
                    base_ns = nsec;
                }
                let start_ts_val = start_ts.unwrap();

                let batch_bytes = batch.len() as u64 * RECORD_ENTRY_LEN;
                commit_log.write_all(&batch_bytes.to_be_bytes())?;
                commit_log.write_all(&last_ts.to_be_bytes())?;
                let record_start_offset = offset + BATCH_HEADER_LEN;

                for record in batch {
                    commit_log.write_all(&RECORD_PAYLOAD_LEN.to_be_bytes())?;
                    commit_log.write_all(&record.timestamp_ns.to_be_bytes())?;
                    commit_log.write_all(&record.value.to_be_bytes())?;
                }

                index.push((first_ts - start_ts_val, record_start_offset));
                offset += BATCH_HEADER_LEN + batch_bytes;
                end_ts = last_ts;
            }
        }

        for (relative_ts, rec_offset) in &index {
            index_file.write_all(&relative_ts.to_be_bytes())?;
            index_file.write_all(&rec_offset.to_be_bytes())?;
        }
        commit_log.flush()?;
        index_file.flush()?;

        Ok(Partition {
            base_offset_sec,
            commit_log_path,
            index_path,
            start_ts: start_ts.unwrap_or(0),
            end_ts,
            base_ns,
            initialized: true,
            index,
        })
    }

    /// Opens a previously flushed partition discovered on disk (its commit
    /// log and index files already exist).
    pub fn open(series_dir: &Path, base_offset_sec: u64) -> Result<Self> {
        let commit_log_path = series_dir.join(commit_log_file_name(base_offset_sec));
        let index_path = series_dir.join(index_file_name(base_offset_sec));

        let index = read_index(&index_path)?;
        let (start_ts, end_ts, base_ns) = if index.is_empty() {
            (0, 0, 0)
        } else {
            let mut commit_log = File::open(&commit_log_path)?;
            let first = decode_records_from(&mut commit_log, index[0].1 - BATCH_HEADER_LEN)?;
            let start_ts = first.first().map(|r| r.timestamp_ns).unwrap_or(0);
            let (_, base_ns) = Record::split_ts(start_ts);

            let last_batch_offset = index.last().unwrap().1 - BATCH_HEADER_LEN;
            let last = decode_records_from(&mut commit_log, last_batch_offset)?;
            let end_ts = last.last().map(|r| r.timestamp_ns).unwrap_or(start_ts);
            (start_ts, end_ts, base_ns)
        };

        Ok(Partition {
            base_offset_sec,
            commit_log_path,
            index_path,
            start_ts,
            end_ts,
            base_ns,
            initialized: true,
            index,
        })
    }

    /// Exact-timestamp lookup: binary-searches the sparse index for the
    /// enclosing batch, then decodes it looking for the exact timestamp.
    pub fn find(&self, timestamp_ns: u64) -> Result<Option<Record>> {
        Ok(self
            .range(timestamp_ns, timestamp_ns)?
            .into_iter()
            .next())
    }

    /// Returns every record in `[t0, t1]`, decoding only the batches the
    /// sparse index says can possibly overlap the range.
    pub fn range(&self, t0: u64, t1: u64) -> Result<Vec<Record>> {
        if self.index.is_empty() || t1 < self.start_ts || t0 > self.end_ts {
            return Ok(Vec::new());
        }

        let start_pos = self
            .index
            .iter()
            .position(|(relative, _)| self.start_ts + relative >= t0)
            .map(|i| i.saturating_sub(1))
            .unwrap_or(0);

        let mut commit_log = File::open(&self.commit_log_path)?;
        let mut out = Vec::new();

        for &(_, record_offset) in &self.index[start_pos..] {
            let batch_header_offset = record_offset - BATCH_HEADER_LEN;
            let (batch_bytes, last_ts) = read_batch_header(&mut commit_log, batch_header_offset)?;
            if last_ts < t0 {
                continue;
            }
            let records = decode_batch(&mut commit_log, record_offset, batch_bytes)?;
            for r in records {
                if r.timestamp_ns >= t0 && r.timestamp_ns <= t1 {
                    out.push(r);
                }
            }
            if last_ts > t1 {
                break;
            }
        }

        Ok(out)
    }

    /// Returns every record in this partition, oldest to newest.
    pub fn scan(&self) -> Result<Vec<Record>> {
        self.range(0, u64::MAX)
    }
}

fn read_index(path: &Path) -> Result<Vec<(u64, u64)>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let mut entries = Vec::with_capacity(buf.len() / INDEX_ENTRY_LEN as usize);
    let mut chunks = buf.chunks_exact(INDEX_ENTRY_LEN as usize);
    for chunk in &mut chunks {
        let relative = u64::from_be_bytes(chunk[0..8].try_into().unwrap());
        let offset = u64::from_be_bytes(chunk[8..16].try_into().unwrap());
        entries.push((relative, offset));
    }
    Ok(entries)
}

fn read_batch_header(file: &mut File, header_offset: u64) -> Result<(u64, u64)> {
    file.seek(SeekFrom::Start(header_offset))?;
    let mut buf = [0u8; BATCH_HEADER_LEN as usize];
    file.read_exact(&mut buf)?;
    let batch_bytes = u64::from_be_bytes(buf[0..8].try_into().unwrap());
    let last_ts = u64::from_be_bytes(buf[8..16].try_into().unwrap());
    Ok((batch_bytes, last_ts))
}

fn decode_batch(file: &mut File, records_offset: u64, batch_bytes: u64) -> Result<Vec<Record>> {
    file.seek(SeekFrom::Start(records_offset))?;
    let mut buf = vec![0u8; batch_bytes as usize];
    file.read_exact(&mut buf)?;

    let mut records = Vec::with_capacity(batch_bytes as usize / RECORD_ENTRY_LEN as usize);
    let mut cursor = 0usize;
    while cursor < buf.len() {
        // first 8 bytes are the self-describing record_bytes tag, always 16
        let ts = u64::from_be_bytes(buf[cursor + 8..cursor + 16].try_into().unwrap());
        let value = f64::from_be_bytes(buf[cursor + 16..cursor + 24].try_into().unwrap());
        records.push(Record::new(ts, value));
        cursor += RECORD_ENTRY_LEN as usize;
    }
    Ok(records)
}

fn decode_records_from(file: &mut File, header_offset: u64) -> Result<Vec<Record>> {
    let (batch_bytes, _last_ts) = read_batch_header(file, header_offset)?;
    let records_offset = header_offset + BATCH_HEADER_LEN;
    decode_batch(file, records_offset, batch_bytes)
}

/// Discovers existing partitions for a series directory by scanning for
/// `c-<base>.log` / `i-<base>.index` file pairs.
pub fn discover_partitions(series_dir: &Path) -> Result<Vec<u64>> {
    let mut bases = Vec::new();
    if !series_dir.exists() {
        return Ok(bases);
    }
    for entry in std::fs::read_dir(series_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name.strip_prefix("c-") {
            if let Some(base_str) = rest.strip_suffix(".log") {
                if let Ok(base) = base_str.parse::<u64>() {
                    bases.push(base);
                }
            }
        }
    }
    bases.sort_unstable();
    Ok(bases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::DuplicationPolicy;
    use crate::wal::ChunkRole;
    use tempfile::tempdir;

    #[test]
    fn flush_then_read_back() {
        let dir = tempdir().unwrap();
        let mut chunk = Chunk::init(dir.path(), ChunkRole::Head, 1_700_000_000).unwrap();
        let base_ns = 1_700_000_000u64 * 1_000_000_000;
        for i in 0..150u64 {
            chunk
                .insert(Record::new(base_ns + i * 1_000_000_000, i as f64), DuplicationPolicy::Insert)
                .unwrap();
        }

        let partition = Partition::flush(dir.path(), &chunk).unwrap();
        assert_eq!(partition.start_ts(), base_ns);
        assert_eq!(partition.end_ts(), base_ns + 149 * 1_000_000_000);

        let found = partition.find(base_ns + 75 * 1_000_000_000).unwrap();
        assert_eq!(found, Some(Record::new(base_ns + 75 * 1_000_000_000, 75.0)));

        let ranged = partition
            .range(base_ns + 10 * 1_000_000_000, base_ns + 20 * 1_000_000_000)
            .unwrap();
        assert_eq!(ranged.len(), 11);
        assert_eq!(ranged[0].value, 10.0);
        assert_eq!(ranged[10].value, 20.0);

        let scanned = partition.scan().unwrap();
        assert_eq!(scanned.len(), 150);
    }
}
