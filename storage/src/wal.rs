use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::record::Record;

/// Size in bytes of one fixed WAL record: `u64` timestamp + `f64` value.
pub const WAL_RECORD_SIZE: usize = 16;

/// Which in-memory chunk a WAL file backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRole {
    Head,
    Previous,
}

impl ChunkRole {
    fn tag(self) -> char {
        match self {
            ChunkRole::Head => 'h',
            ChunkRole::Previous => 't',
        }
    }
}

fn wal_file_name(role: ChunkRole, base_offset_sec: u64) -> String {
    format!("wal-{}-{}.log", role.tag(), base_offset_sec)
}

/// An append-only write-ahead log of fixed-size `(timestamp, value)` records,
/// backing exactly one in-memory chunk. Used to rebuild the chunk on restart
/// and to guarantee WAL-before-ack durability of inserts.
pub struct Wal {
    file: File,
    path: PathBuf,
    size: u64,
}

impl Wal {
    /// Creates (or reopens) the WAL file for `role` anchored at
    /// `base_offset_sec`, inside `series_dir`.
    pub fn open(series_dir: &Path, role: ChunkRole, base_offset_sec: u64) -> io::Result<Self> {
        fs::create_dir_all(series_dir)?;
        let path = series_dir.join(wal_file_name(role, base_offset_sec));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let size = file.metadata()?.len();
        Ok(Wal { file, path, size })
    }

    pub fn append(&mut self, record: &Record) -> io::Result<()> {
        let mut buf = [0u8; WAL_RECORD_SIZE];
        buf[0..8].copy_from_slice(&record.timestamp_ns.to_be_bytes());
        buf[8..16].copy_from_slice(&record.value.to_be_bytes());
        self.file.write_all(&buf)?;
        self.file.flush()?;
        self.size += WAL_RECORD_SIZE as u64;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replays every record currently persisted in this WAL, in append
    /// order. Used to rebuild a chunk on startup.
    pub fn replay(&self) -> io::Result<Vec<Record>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        let mut buf = [0u8; WAL_RECORD_SIZE];
        loop {
            match reader.read_exact(&mut buf) {
                Ok(()) => {
                    let timestamp_ns = u64::from_be_bytes(buf[0..8].try_into().unwrap());
                    let value = f64::from_be_bytes(buf[8..16].try_into().unwrap());
                    records.push(Record::new(timestamp_ns, value));
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    /// Removes the backing file. Called once a chunk has been flushed to a
    /// partition and its WAL is no longer needed for recovery.
    pub fn remove(self) -> io::Result<()> {
        let path = self.path.clone();
        drop(self);
        fs::remove_file(path)
    }
}

/// Parses `wal-<role>-<base>.log` file names, used when discovering existing
/// WAL files for a series directory on startup.
pub fn parse_wal_file_name(name: &str) -> Option<(ChunkRole, u64)> {
    let rest = name.strip_prefix("wal-")?;
    let rest = rest.strip_suffix(".log")?;
    let mut parts = rest.splitn(2, '-');
    let role = match parts.next()? {
        "h" => ChunkRole::Head,
        "t" => ChunkRole::Previous,
        _ => return None,
    };
    let base_offset_sec = parts.next()?.parse().ok()?;
    Some((role, base_offset_sec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_and_replay_round_trip() {
        let dir = tempdir().unwrap();
        let mut wal = Wal::open(dir.path(), ChunkRole::Head, 1_000).unwrap();
        wal.append(&Record::new(1_000_000_000_000, 1.0)).unwrap();
        wal.append(&Record::new(1_000_000_000_500, 2.5)).unwrap();
        assert_eq!(wal.size(), WAL_RECORD_SIZE as u64 * 2);

        let replayed = wal.replay().unwrap();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0], Record::new(1_000_000_000_000, 1.0));
        assert_eq!(replayed[1], Record::new(1_000_000_000_500, 2.5));
    }

    #[test]
    fn parses_file_names() {
        assert_eq!(
            parse_wal_file_name("wal-h-1700000000.log"),
            Some((ChunkRole::Head, 1_700_000_000))
        );
        assert_eq!(
            parse_wal_file_name("wal-t-42.log"),
            Some((ChunkRole::Previous, 42))
        );
        assert_eq!(parse_wal_file_name("c-42.log"), None);
    }
}
