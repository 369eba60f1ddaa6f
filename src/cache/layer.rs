//! Two-tier cache: an in-process fast tier over a durable store.

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::{NoopStorage, SqliteStorage};
use super::traits::{CacheError, CacheStorage, StorageError};
use crate::config::CacheConfig;

/// Default number of entries held in the fast tier.
pub const DEFAULT_MEMORY_CAPACITY: u64 = 256;

/// Cache layer that owns both tiers.
///
/// Reads go to the fast tier first and fall through to the durable store,
/// repopulating the fast tier on a durable hit. Writes go to both. Entries
/// never expire on their own; invalidation is explicit.
pub struct TieredCache {
  memory: Cache<String, Arc<Vec<u8>>>,
  storage: Arc<dyn CacheStorage>,
}

impl TieredCache {
  /// Create a tiered cache over the given durable store.
  ///
  /// The fast tier evicts least-recently-used entries and always admits new
  /// ones, so a value is readable right after `save`. It holds at least one
  /// entry.
  pub fn new(storage: impl CacheStorage + 'static, memory_capacity: u64) -> Self {
    let memory = Cache::builder()
      .max_capacity(memory_capacity.max(1))
      .eviction_policy(EvictionPolicy::lru())
      .build();

    Self {
      memory,
      storage: Arc::new(storage),
    }
  }

  /// Create a cache with no durable tier.
  pub fn in_memory() -> Self {
    Self::new(NoopStorage, DEFAULT_MEMORY_CAPACITY)
  }

  /// Open the durable tier described by `config`, falling back to a
  /// memory-only cache when it is disabled or cannot be opened.
  pub fn open_or_memory(config: &CacheConfig) -> Self {
    if !config.enabled {
      debug!("Durable cache disabled, using memory-only cache");
      return Self::new(NoopStorage, config.memory_capacity);
    }

    match SqliteStorage::open(config.directory.as_deref()) {
      Ok(storage) => {
        debug!(path = %storage.path().display(), "Opened durable cache");
        Self::new(storage, config.memory_capacity)
      }
      Err(e) => {
        warn!(error = %e, "Failed to open durable cache, using memory-only cache");
        Self::new(NoopStorage, config.memory_capacity)
      }
    }
  }

  /// Serialize `value` and store it under `key` in both tiers.
  ///
  /// The fast tier is written first and unconditionally, so a `SaveFailed`
  /// error still leaves the value readable from this instance.
  pub fn save<T: Serialize>(&self, value: &T, key: &str) -> Result<(), CacheError> {
    let data = serde_json::to_vec(value).map_err(CacheError::SerializationFailed)?;
    let data = Arc::new(data);

    self.memory.insert(key.to_string(), Arc::clone(&data));

    self.storage.put(key, &data).map_err(CacheError::SaveFailed)
  }

  /// Look up `key` and decode it as `T`.
  ///
  /// Corrupt or mismatched bytes are `DecodeFailed`, never `NotFound`.
  pub fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
    if let Some(data) = self.memory.get(key) {
      debug!(key, "Memory cache hit");
      return decode(&data);
    }

    let data = match self.storage.get(key) {
      Ok(data) => data,
      Err(StorageError::NotFound(_)) => return Err(CacheError::NotFound(key.to_string())),
      Err(e) => return Err(CacheError::ReadFailed(e)),
    };

    let value = decode(&data)?;

    debug!(key, "Durable cache hit, repopulating memory tier");
    self.memory.insert(key.to_string(), Arc::new(data));

    Ok(value)
  }

  /// Evict `key` from both tiers.
  pub fn remove(&self, key: &str) -> Result<(), CacheError> {
    self.memory.invalidate(key);
    self.storage.remove(key).map_err(CacheError::EvictFailed)
  }

  /// Evict everything from both tiers.
  ///
  /// The fast tier is cleared even when the durable clear fails.
  pub fn clear(&self) -> Result<(), CacheError> {
    self.memory.invalidate_all();
    self.storage.clear().map_err(CacheError::EvictFailed)
  }
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, CacheError> {
  serde_json::from_slice(data).map_err(CacheError::DecodeFailed)
}
