//! Where settings snapshots live.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use utf8path::Path;

use crate::error::{Error, Result};

/// A string key-value store for settings snapshots.
pub trait SettingsStorage: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory storage.  Values vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage holding one value.
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let storage = Self::new();
        storage
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        storage
    }
}

impl SettingsStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: Path<'static>,
}

impl FileStorage {
    /// Store files under `dir`.  The directory is created on first write.
    pub fn new(dir: Path<'_>) -> Self {
        Self {
            dir: dir.into_owned(),
        }
    }

    /// The file that holds `key`.
    pub fn path_for(&self, key: &str) -> Result<Path<'static>> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(Error::validation(
                format!("invalid storage key {key:?}"),
                Some("key".to_string()),
            ));
        }
        let file = format!("{key}.json");
        Ok(self.dir.join(file.as_str()).into_owned())
    }
}

impl SettingsStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::io(format!("failed to read {}", path.as_str()), err)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|err| Error::io(format!("failed to create {}", self.dir.as_str()), err))?;
        // Write beside the target and rename so a crash never leaves half a snapshot.
        let staging = format!(".{key}.json.tmp");
        let staging = self.dir.join(staging.as_str()).into_owned();
        std::fs::write(&staging, value)
            .map_err(|err| Error::io(format!("failed to write {}", staging.as_str()), err))?;
        std::fs::rename(&staging, &path)
            .map_err(|err| Error::io(format!("failed to replace {}", path.as_str()), err))
    }
}
