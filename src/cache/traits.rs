//! Core traits and error types for the caching system.

use thiserror::Error;

/// Errors raised by a durable storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
  /// The platform could not supply a writable directory for the store.
  #[error("Could not determine a writable cache location")]
  NoStorageLocation,

  /// No entry exists for the key.
  #[error("No stored entry for key: {0}")]
  NotFound(String),

  /// Underlying I/O or database failure.
  #[error("Storage I/O failed: {0}")]
  Io(String),
}

/// Errors raised by the tiered cache.
#[derive(Debug, Error)]
pub enum CacheError {
  /// The key is in neither tier. This is an ordinary miss, not a failure.
  #[error("Cache item not found for key: {0}")]
  NotFound(String),

  #[error("Failed to serialize value for cache: {0}")]
  SerializationFailed(#[source] serde_json::Error),

  /// Cached bytes exist but do not decode to the requested type.
  #[error("Failed to decode cache data: {0}")]
  DecodeFailed(#[source] serde_json::Error),

  /// The durable write failed. The fast tier still holds the value.
  #[error("Failed to save to cache: {0}")]
  SaveFailed(#[source] StorageError),

  #[error("Failed to read from cache: {0}")]
  ReadFailed(#[source] StorageError),

  /// Eviction from the durable tier failed. The fast tier was evicted anyway.
  #[error("Failed to evict from cache: {0}")]
  EvictFailed(#[source] StorageError),
}

impl CacheError {
  /// Whether this is a plain miss rather than a failure.
  pub fn is_not_found(&self) -> bool {
    matches!(self, CacheError::NotFound(_))
  }
}

/// Trait for durable key → bytes storage backends.
///
/// Writes must be atomic with respect to concurrent reads of the same key:
/// a reader sees either the previous value or the new one, never a partial
/// write.
pub trait CacheStorage: Send + Sync {
  /// Store bytes under a key, replacing any previous value.
  fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

  /// Read the bytes stored under a key.
  fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

  /// Remove a key. Removing a missing key is not an error.
  fn remove(&self, key: &str) -> Result<(), StorageError>;

  /// Remove every stored entry.
  fn clear(&self) -> Result<(), StorageError>;
}
