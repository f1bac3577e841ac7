//! Key-value persistence for settings and stats.
//!
//! Every write replaces the whole document under its key, so a lost write
//! only loses the changes since the previous one.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use log::debug;

/// Overrides the directory `FileStore::open_default` writes to
pub const DATA_DIR_ENV: &str = "MORSE_TRAINER_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No usable storage location
    Unavailable(String),
    Io(String),
    Serialize(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            StorageError::Io(msg) => write!(f, "Storage I/O error: {}", msg),
            StorageError::Serialize(msg) => write!(f, "Failed to serialize: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One JSON file per key inside a directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under `$MORSE_TRAINER_DATA_DIR`, or the platform config dir
    pub fn open_default() -> Result<Self, StorageError> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return Ok(Self::new(dir));
        }
        dirs::config_dir()
            .map(|mut path| {
                path.push("morse-trainer");
                Self::new(path)
            })
            .ok_or_else(|| StorageError::Unavailable("Could not determine config directory".to_string()))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| StorageError::Io(format!("Failed to read {:?}: {}", path, e)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| StorageError::Unavailable(format!("Failed to create data dir: {}", e)))?;

        // Write to a sibling file first so a crash never leaves half a document
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)
            .map_err(|e| StorageError::Io(format!("Failed to create {:?}: {}", tmp, e)))?;
        file.write_all(value.as_bytes())
            .map_err(|e| StorageError::Io(format!("Failed to write {:?}: {}", tmp, e)))?;
        file.sync_all()
            .map_err(|e| StorageError::Io(format!("Failed to sync {:?}: {}", tmp, e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| StorageError::Io(format!("Failed to replace {:?}: {}", path, e)))?;

        debug!(target: "storage", "Saved {} ({} bytes)", key, value.len());
        Ok(())
    }
}

/// In-memory store. Can be switched to fail every write.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            entries: HashMap::new(),
            fail_writes: true,
        }
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Several trainers (or a test and its trainer) can share one store
impl<T: KeyValueStore> KeyValueStore for std::sync::Arc<parking_lot::Mutex<T>> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.lock().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().set(key, value)
    }
}
