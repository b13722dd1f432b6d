//! Persistence medium implementations

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::Result;

/// String-keyed persistence medium a versioned store writes through.
///
/// Mirrors the surface of a browser-style storage area: flat string keys,
/// string values, possibly bounded capacity.
pub trait StorageMedium: Send + Sync {
    /// Look up the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Fails with [`Error::QuotaExceeded`] when the medium is full, or
    /// with an IO/storage error when the backing host fails.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove `key` if present.
    fn remove(&mut self, key: &str);

    /// All keys currently stored, in no particular order.
    fn keys(&self) -> Vec<String>;
}

/// In-memory medium with an optional byte quota.
///
/// Usage is metered as key length plus value length per entry, the way
/// browser storage areas account for space.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: HashMap<String, String>,
    capacity: Option<usize>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Medium that rejects writes once `capacity` bytes are in use.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: Some(capacity),
        }
    }

    fn used_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }
}

impl StorageMedium for MemoryMedium {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(capacity) = self.capacity {
            let replaced = self
                .entries
                .get(key)
                .map(|existing| key.len() + existing.len())
                .unwrap_or(0);
            let projected = self.used_bytes() - replaced + key.len() + value.len();
            if projected > capacity {
                return Err(Error::QuotaExceeded(format!(
                    "write of {} bytes exceeds the {} byte capacity",
                    key.len() + value.len(),
                    capacity
                )));
            }
        }

        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// File-backed medium keeping the whole key space as one JSON object.
///
/// Every mutation rewrites the file through a temp-file rename so a crash
/// mid-write never leaves a truncated snapshot behind. An unreadable file
/// at open degrades to an empty medium; the application must still start.
pub struct FileMedium {
    entries: HashMap<String, String>,
    file_path: PathBuf,
}

impl FileMedium {
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).map_err(Into::<Error>::into)?;
        }

        let entries = if file_path.exists() {
            let content = fs::read_to_string(&file_path).map_err(Into::<Error>::into)?;
            match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        "Discarding unreadable storage file {}: {}",
                        file_path.display(),
                        e
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Ok(Self { entries, file_path })
    }

    fn persist(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;

        let parent = self.file_path.parent().unwrap_or_else(|| Path::new("."));
        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4().as_hyphenated()));

        fs::write(&temp_path, content).map_err(Into::<Error>::into)?;

        if let Err(e) = fs::rename(&temp_path, &self.file_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::Storage(format!(
                "Failed to finalize storage write: {}",
                e
            )));
        }

        debug!(
            "Persisted {} keys to {}",
            self.entries.len(),
            self.file_path.display()
        );
        Ok(())
    }
}

impl StorageMedium for FileMedium {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let previous = self.entries.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist() {
            match previous {
                Some(value) => {
                    self.entries.insert(key.to_string(), value);
                }
                None => {
                    self.entries.remove(key);
                }
            }
            return Err(e);
        }

        Ok(())
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            if let Err(e) = self.persist() {
                warn!("Failed to persist removal of '{}': {}", key, e);
            }
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
