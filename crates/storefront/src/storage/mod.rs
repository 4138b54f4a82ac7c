//! Durable key-value storage for session state.
//!
//! The stores in [`crate::services`] write a JSON projection of their state
//! after every mutation and read it back once on load. Storage is
//! synchronous from the caller's perspective, like browser local storage.
//!
//! # Backends
//!
//! - [`MemoryStore`] - process-local map, used for tests and guest sessions
//! - [`FileStore`] - one JSON document per key inside a data directory

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur when reading or writing the durable store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key contains characters the backend cannot store.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// A durable string-keyed store of JSON documents.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON value.
///
/// # Errors
///
/// Returns `StorageError` if the read fails or the payload is not valid JSON
/// for `T`.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value.
///
/// # Errors
///
/// Returns `StorageError` if encoding or the write fails.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Rehydrate a value, treating unreadable or malformed data as absent.
pub(crate) fn restore<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match load_json(store, key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding unreadable persisted state");
            None
        }
    }
}

/// Write a value without failing the caller; errors are logged.
pub(crate) fn persist<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    if let Err(e) = save_json(store, key, value) {
        tracing::error!(key, error = %e, "Failed to persist state");
    }
}

/// Delete a key without failing the caller; errors are logged.
pub(crate) fn forget(store: &dyn KeyValueStore, key: &str) {
    if let Err(e) = store.remove(key) {
        tracing::error!(key, error = %e, "Failed to remove persisted state");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_json_helpers_roundtrip() {
        let store = MemoryStore::new();
        save_json(&store, "favorites", &vec!["a", "b"]).unwrap();
        let loaded: Option<Vec<String>> = load_json(&store, "favorites").unwrap();
        assert_eq!(loaded.unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_restore_treats_malformed_as_absent() {
        let store = MemoryStore::new();
        store.set("ft_addresses", "{not json").unwrap();
        let restored: Option<Vec<String>> = restore(&store, "ft_addresses");
        assert!(restored.is_none());
    }

    #[test]
    fn test_load_missing_key() {
        let store = MemoryStore::new();
        let loaded: Option<bool> = load_json(&store, "ft_is_logged_in").unwrap();
        assert!(loaded.is_none());
    }
}
