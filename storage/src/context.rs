use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::database::Database;
use crate::error::{Result, StorageError};

/// Global mapping from database name to database, with exactly one active
/// database selected at a time.
pub struct DatabaseContext {
    base_dir: PathBuf,
    databases: HashMap<String, Database>,
    active: Option<String>,
}

impl DatabaseContext {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        let mut databases = HashMap::new();
        for entry in fs::read_dir(&base_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                databases.insert(name.clone(), Database::open(&base_dir, &name)?);
            }
        }
        let active = databases.keys().next().cloned();
        Ok(DatabaseContext {
            base_dir,
            databases,
            active,
        })
    }

    pub fn create_database(&mut self, name: &str) -> Result<()> {
        if self.databases.contains_key(name) {
            return Err(StorageError::DatabaseAlreadyExists(name.to_string()));
        }
        let db = Database::create(&self.base_dir, name)?;
        self.databases.insert(name.to_string(), db);
        if self.active.is_none() {
            self.active = Some(name.to_string());
        }
        Ok(())
    }

    pub fn use_database(&mut self, name: &str) -> Result<()> {
        if !self.databases.contains_key(name) {
            return Err(StorageError::DatabaseNotFound(name.to_string()));
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Result<&Database> {
        let name = self.active.as_ref().ok_or(StorageError::NoActiveDatabase)?;
        self.databases
            .get(name)
            .ok_or_else(|| StorageError::DatabaseNotFound(name.clone()))
    }

    pub fn active_mut(&mut self) -> Result<&mut Database> {
        let name = self
            .active
            .clone()
            .ok_or(StorageError::NoActiveDatabase)?;
        self.databases
            .get_mut(&name)
            .ok_or(StorageError::DatabaseNotFound(name))
    }

    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn drop_database(&mut self, name: &str) -> Result<()> {
        let db = self
            .databases
            .remove(name)
            .ok_or_else(|| StorageError::DatabaseNotFound(name.to_string()))?;
        let _ = fs::remove_dir_all(self.base_dir.join(db.name()));
        if self.active.as_deref() == Some(name) {
            self.active = self.databases.keys().next().cloned();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_and_select_database() {
        let dir = tempdir().unwrap();
        let mut ctx = DatabaseContext::new(dir.path()).unwrap();
        ctx.create_database("metrics").unwrap();
        assert_eq!(ctx.active_name(), Some("metrics"));

        ctx.create_database("other").unwrap();
        ctx.use_database("other").unwrap();
        assert_eq!(ctx.active_name(), Some("other"));
        assert_eq!(ctx.database_names(), vec!["metrics", "other"]);
    }
}
