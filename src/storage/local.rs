//! Local key-value storage for non-secret state.
//!
//! # Responsibilities
//! - Hold JSON values keyed by string (preferences, cached address, history)
//! - Persist the whole map to one JSON file after every change
//! - Fall back to memory only when no path is given

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::storage::{write_atomic, StorageError, StorageResult};

/// JSON key-value store backed by a single file.
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    entries: DashMap<String, Value>,
    /// Serializes writers so the file and the map change together.
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Open the store at `path`, loading existing entries.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let entries = DashMap::new();

        match std::fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => {
                let map: BTreeMap<String, Value> = serde_json::from_slice(&bytes)?;
                for (k, v) in map {
                    entries.insert(k, v);
                }
                tracing::debug!(path = %path.display(), entries = entries.len(), "Local store loaded");
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Local store not found, starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path: Some(path),
            entries,
            write_lock: Mutex::new(()),
        })
    }

    /// Store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: DashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read and deserialize a value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(value) = self.entries.get(key).map(|v| v.value().clone()) else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StorageError::Corrupted {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Serialize and store a value.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let value = serde_json::to_value(value)?;
        let _guard = self.lock_writes();
        self.commit(key, Some(value))
    }

    /// Remove a value; removing a missing key is not an error.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        let _guard = self.lock_writes();
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        self.commit(key, None)
    }

    /// Read-modify-write of one value. Other writers wait until it is stored.
    pub fn update<T, F>(&self, key: &str, f: F) -> StorageResult<()>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> T,
    {
        let _guard = self.lock_writes();
        let current = self.get(key)?;
        let value = serde_json::to_value(f(current))?;
        self.commit(key, Some(value))
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write the map with `key` changed, then apply the change in memory.
    /// Callers hold the write lock.
    fn commit(&self, key: &str, value: Option<Value>) -> StorageResult<()> {
        if let Some(path) = &self.path {
            let mut snapshot: BTreeMap<String, Value> = self
                .entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect();
            match &value {
                Some(v) => {
                    snapshot.insert(key.to_string(), v.clone());
                }
                None => {
                    snapshot.remove(key);
                }
            }
            let bytes = serde_json::to_vec_pretty(&snapshot)?;
            write_atomic(path, &bytes, false)?;
        }

        match value {
            Some(v) => {
                self.entries.insert(key.to_string(), v);
            }
            None => {
                self.entries.remove(key);
            }
        }
        Ok(())
    }
}
