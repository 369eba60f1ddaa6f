//! Two-tier response cache.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Keeps recently used entries in an in-process fast tier
//! - Persists every entry to a durable key → blob store
//! - Repopulates the fast tier on durable hits
//! - Falls back to a memory-only cache when no durable store is available

mod layer;
mod storage;
mod traits;

pub use layer::{TieredCache, DEFAULT_MEMORY_CAPACITY};
pub use storage::{NoopStorage, SqliteStorage};
pub use traits::{CacheError, CacheStorage, StorageError};
