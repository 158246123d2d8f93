use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};
use crate::series::{SeriesOptions, TimeSeries};

/// A named container of time series, materialized as a directory on disk.
pub struct Database {
    name: String,
    dir: PathBuf,
    series: HashMap<String, TimeSeries>,
}

impl Database {
    pub fn create(base_dir: &Path, name: &str) -> Result<Self> {
        let dir = base_dir.join(name);
        fs::create_dir_all(&dir)?;
        Ok(Database {
            name: name.to_string(),
            dir,
            series: HashMap::new(),
        })
    }

    /// Rebuilds a database from disk, discovering any series subdirectories
    /// already present.
    pub fn open(base_dir: &Path, name: &str) -> Result<Self> {
        let dir = base_dir.join(name);
        let mut series = HashMap::new();
        if dir.exists() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    let series_name = entry.file_name().to_string_lossy().into_owned();
                    let ts = TimeSeries::open(&dir, &series_name, SeriesOptions::default())?;
                    series.insert(series_name, ts);
                }
            }
        }
        Ok(Database {
            name: name.to_string(),
            dir,
            series,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create_series(&mut self, name: &str, options: SeriesOptions) -> Result<()> {
        if self.series.contains_key(name) {
            return Err(StorageError::SeriesAlreadyExists(name.to_string()));
        }
        let ts = TimeSeries::create(&self.dir, name, options)?;
        self.series.insert(name.to_string(), ts);
        Ok(())
    }

    pub fn series(&self, name: &str) -> Result<&TimeSeries> {
        self.series
            .get(name)
            .ok_or_else(|| StorageError::SeriesNotFound(name.to_string()))
    }

    pub fn series_mut(&mut self, name: &str) -> Result<&mut TimeSeries> {
        self.series
            .get_mut(name)
            .ok_or_else(|| StorageError::SeriesNotFound(name.to_string()))
    }

    pub fn drop_series(&mut self, name: &str) -> Result<()> {
        let ts = self
            .series
            .remove(name)
            .ok_or_else(|| StorageError::SeriesNotFound(name.to_string()))?;
        let _ = fs::remove_dir_all(ts.dir());
        Ok(())
    }

    pub fn series_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.keys().cloned().collect();
        names.sort();
        names
    }
}
