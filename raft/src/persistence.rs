//! Persistent Raft hard state: `current_term`, `voted_for` and the log,
//! written as a single compact record any time one of them changes.
//!
//! Layout: `i32 current_term, i32 voted_for, i32 log_length, (i32 term, i32
//! value)*`. All integers are big-endian.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::message::LogEntry;

/// Everything a replica must recover after a restart.
#[derive(Debug, Clone, PartialEq)]
pub struct HardState {
    pub current_term: i32,
    pub voted_for: i32,
    pub log: Vec<LogEntry>,
}

impl Default for HardState {
    fn default() -> Self {
        HardState {
            current_term: 0,
            voted_for: -1,
            log: Vec::new(),
        }
    }
}

/// Persists and reloads [`HardState`]. Kept as a trait so tests (and
/// alternative deployments) can swap in an in-memory backend.
pub trait Persistence {
    fn save(&mut self, state: &HardState) -> io::Result<()>;
    fn load(&mut self) -> io::Result<HardState>;
}

/// Default backend: a single file at a fixed path, rewritten wholesale on
/// every save.
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePersistence { path: path.into() }
    }
}

impl Persistence for FilePersistence {
    fn save(&mut self, state: &HardState) -> io::Result<()> {
        let mut buf = Vec::with_capacity(12 + state.log.len() * 8);
        buf.extend_from_slice(&state.current_term.to_be_bytes());
        buf.extend_from_slice(&state.voted_for.to_be_bytes());
        buf.extend_from_slice(&(state.log.len() as i32).to_be_bytes());
        for entry in &state.log {
            buf.extend_from_slice(&entry.term.to_be_bytes());
            buf.extend_from_slice(&entry.value.to_be_bytes());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&buf)?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn load(&mut self) -> io::Result<HardState> {
        if !Path::new(&self.path).exists() {
            return Ok(HardState::default());
        }
        let mut file = File::open(&self.path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        if buf.len() < 12 {
            return Ok(HardState::default());
        }
        let current_term = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let voted_for = i32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let log_length = i32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;
        let mut log = Vec::with_capacity(log_length);
        let mut pos = 12;
        for _ in 0..log_length {
            if pos + 8 > buf.len() {
                break;
            }
            let term = i32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
            let value = i32::from_be_bytes([
                buf[pos + 4],
                buf[pos + 5],
                buf[pos + 6],
                buf[pos + 7],
            ]);
            log.push(LogEntry { term, value });
            pos += 8;
        }
        Ok(HardState {
            current_term,
            voted_for,
            log,
        })
    }
}

/// In-memory backend used by tests and by nodes that opt out of durability.
#[derive(Default)]
pub struct MemoryPersistence {
    state: HardState,
}

impl Persistence for MemoryPersistence {
    fn save(&mut self, state: &HardState) -> io::Result<()> {
        self.state = state.clone();
        Ok(())
    }

    fn load(&mut self) -> io::Result<HardState> {
        Ok(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_persistence_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raft.state");
        let mut p = FilePersistence::new(&path);

        let state = HardState {
            current_term: 4,
            voted_for: 2,
            log: vec![LogEntry { term: 1, value: 10 }, LogEntry { term: 4, value: 20 }],
        };
        p.save(&state).unwrap();

        let mut reopened = FilePersistence::new(&path);
        assert_eq!(reopened.load().unwrap(), state);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let mut p = FilePersistence::new(dir.path().join("missing.state"));
        assert_eq!(p.load().unwrap(), HardState::default());
    }
}
