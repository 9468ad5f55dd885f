//! Small string key-value persistence used for state that must survive a
//! restart (the in-progress announcement record).

use crate::error::{CoreError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

const LOG_TARGET: &str = "sholat::storage";

/// String key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn delete(&self, key: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| CoreError::StorageError {
        reason: "state store lock poisoned".to_string(),
    })
}

/// In-process store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file.
///
/// The file is read once on first access and rewritten (temp file + rename)
/// on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl JsonFileStore {
    /// Open the store at the default location (`~/.config/sholat/state.json`)
    #[must_use]
    pub fn new() -> Self {
        Self::open(crate::paths::state_path())
    }

    /// Open a store at a specific path. The file is created on first write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        if !self.path.exists() {
            return BTreeMap::new();
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => {
                    debug!(target: LOG_TARGET, "Loaded state from {:?}", self.path);
                    entries
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, "Ignoring unreadable state file {:?}: {}", self.path, e);
                    BTreeMap::new()
                }
            },
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to read state file {:?}: {}", self.path, e);
                BTreeMap::new()
            }
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> Result<T> {
        let mut guard = lock(&self.entries)?;
        let entries = guard.get_or_insert_with(|| self.load());
        Ok(f(entries))
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let snapshot = self.with_entries(|entries| {
            entries.insert(key.to_string(), value.to_string());
            entries.clone()
        })?;
        self.persist(&snapshot)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let snapshot = self.with_entries(|entries| entries.remove(key).map(|_| entries.clone()))?;
        match snapshot {
            Some(entries) => self.persist(&entries),
            None => Ok(()),
        }
    }
}
