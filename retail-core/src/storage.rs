//! Local persistent key-value storage.
//!
//! The stores keep their state under string keys in a `KeyValueStore`. Multi-key
//! writes are all-or-nothing: `FileStore` rewrites the whole document through a
//! temporary file and an atomic rename, so a crash mid-write never leaves one key
//! of a pair without the other.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt storage document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// String key-value storage shared by the session and location stores.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write every entry, or none of them.
    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError>;

    /// Remove every key, or none of them.
    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError>;

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.set_many(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_many(&[key])
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// Process-local storage. State is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set_many(&self, new_entries: &[(&str, String)]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        for (key, value) in new_entries {
            entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// A JSON object on disk. Every mutation is a read-modify-write of the whole
/// document under one lock, finished by an atomic rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the document at `path`. Parent directories are
    /// created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_document(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    /// Document for a read-modify-write. An unparseable document is moved
    /// aside to `<path>.corrupt` and replaced by an empty one, so a clear or a
    /// fresh write always goes through.
    fn read_for_write(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match self.read_document() {
            Err(StorageError::Json(e)) => {
                let aside = self.path.with_extension("corrupt");
                tracing::warn!(
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "Corrupt storage document, starting fresh"
                );
                fs::rename(&self.path, &aside).map_err(|e| self.io_err(e))?;
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_document(&self, document: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }

        let serialized = serde_json::to_vec_pretty(document)?;
        let tmp_path = self.path.with_extension("tmp");

        let mut tmp = fs::File::create(&tmp_path).map_err(|e| self.io_err(e))?;
        tmp.write_all(&serialized).map_err(|e| self.io_err(e))?;
        tmp.sync_all().map_err(|e| self.io_err(e))?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_err(e))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_document()?.remove(key))
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut document = self.read_for_write()?;
        for (key, value) in entries {
            document.insert((*key).to_string(), value.clone());
        }
        self.write_document(&document)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut document = self.read_for_write()?;
        let before = document.len();
        for key in keys {
            document.remove(*key);
        }
        if document.len() == before {
            return Ok(());
        }
        self.write_document(&document)
    }
}
