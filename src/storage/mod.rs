//! Durable key-value substrate for history records
//!
//! The history store never talks to a storage medium directly. It goes
//! through the [`Substrate`] trait, which offers the four synchronous
//! operations a flat string-keyed store needs: enumerate, read, write and
//! remove. Two implementations ship with the crate: an in-memory map and a
//! SQLite table.

pub mod sqlite;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};

pub use sqlite::SqliteSubstrate;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A writer panicked while holding the substrate lock
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Flat string key-value storage.
///
/// Implementations serialize their own operations; callers get no
/// transactional guarantees across calls.
pub trait Substrate {
    /// Enumerate every key currently stored
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Read the value stored under `key`
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<S: Substrate + ?Sized> Substrate for &S {
    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

impl<S: Substrate + ?Sized> Substrate for Arc<S> {
    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

impl<S: Substrate + ?Sized> Substrate for Box<S> {
    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// Process-local substrate backed by a sorted map
#[derive(Debug, Default)]
pub struct MemorySubstrate {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemorySubstrate {
    /// Create an empty substrate
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, across all namespaces
    pub fn len(&self) -> Result<usize, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.len())
    }

    /// Whether the substrate holds no keys at all
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl Substrate for MemorySubstrate {
    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Open the substrate described by `config`
pub fn open(config: &StorageConfig) -> Result<Box<dyn Substrate + Send + Sync>, StorageError> {
    match config.backend {
        StorageBackend::Sqlite => {
            info!(path = %config.path.display(), "Opening history database");
            Ok(Box::new(SqliteSubstrate::open(&config.path)?))
        }
        StorageBackend::Memory => {
            info!("Using in-memory history");
            Ok(Box::new(MemorySubstrate::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_write_and_read() {
        let substrate = MemorySubstrate::new();
        substrate.write("a", "1").unwrap();

        assert_eq!(substrate.read("a").unwrap(), Some("1".to_string()));
        assert_eq!(substrate.read("b").unwrap(), None);
    }

    #[test]
    fn test_memory_overwrite() {
        let substrate = MemorySubstrate::new();
        substrate.write("a", "1").unwrap();
        substrate.write("a", "2").unwrap();

        assert_eq!(substrate.len().unwrap(), 1);
        assert_eq!(substrate.read("a").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_memory_keys_sorted() {
        let substrate = MemorySubstrate::new();
        substrate.write("b", "").unwrap();
        substrate.write("a", "").unwrap();
        substrate.write("c", "").unwrap();

        assert_eq!(substrate.keys().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_memory_remove_missing_key() {
        let substrate = MemorySubstrate::new();
        substrate.write("a", "1").unwrap();

        substrate.remove("missing").unwrap();
        substrate.remove("a").unwrap();
        assert!(substrate.is_empty().unwrap());
    }

    #[test]
    fn test_poisoned_lock_reported() {
        let substrate = Arc::new(MemorySubstrate::new());
        substrate.write("a", "1").unwrap();

        let poisoner = Arc::clone(&substrate);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.entries.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(substrate.len(), Err(StorageError::Poisoned)));
        assert!(matches!(substrate.is_empty(), Err(StorageError::Poisoned)));
        assert!(matches!(substrate.keys(), Err(StorageError::Poisoned)));
    }

    #[test]
    fn test_open_memory_backend() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            path: Default::default(),
        };
        let substrate = open(&config).unwrap();
        substrate.write("k", "v").unwrap();
        assert_eq!(substrate.keys().unwrap(), vec!["k"]);
    }

    #[test]
    fn test_shared_through_arc() {
        let substrate = Arc::new(MemorySubstrate::new());
        let handle = Arc::clone(&substrate);

        handle.write("k", "v").unwrap();
        assert_eq!(substrate.read("k").unwrap(), Some("v".to_string()));
    }
}
