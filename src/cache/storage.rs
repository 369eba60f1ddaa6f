//! Durable storage backends: SQLite on disk, and a no-op store.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::{CacheStorage, StorageError};

/// Storage implementation that doesn't persist anything.
/// Used when durable caching is disabled or unavailable - every read misses.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn put(&self, _key: &str, _data: &[u8]) -> Result<(), StorageError> {
    Ok(()) // Discard
  }

  fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
    Err(StorageError::NotFound(key.to_string())) // Always miss
  }

  fn remove(&self, _key: &str) -> Result<(), StorageError> {
    Ok(())
  }

  fn clear(&self) -> Result<(), StorageError> {
    Ok(())
  }
}

/// SQLite-based durable storage.
///
/// Each entry is a single row, so `INSERT OR REPLACE` makes writes atomic for
/// readers of the same key.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
  path: PathBuf,
}

impl SqliteStorage {
  /// Open the store at the default location, or under `directory` if given.
  ///
  /// The location is resolved once, here.
  pub fn open(directory: Option<&Path>) -> Result<Self, StorageError> {
    let dir = match directory {
      Some(dir) => dir.to_path_buf(),
      None => Self::default_dir()?,
    };

    std::fs::create_dir_all(&dir).map_err(|e| {
      StorageError::Io(format!(
        "Failed to create cache directory {}: {}",
        dir.display(),
        e
      ))
    })?;

    let path = dir.join("cache.db");
    let conn = Connection::open(&path).map_err(|e| {
      StorageError::Io(format!(
        "Failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;

    let storage = Self {
      conn: Mutex::new(conn),
      path,
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Path of the backing database file.
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Get the default cache directory.
  fn default_dir() -> Result<PathBuf, StorageError> {
    let cache_dir = dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .ok_or(StorageError::NoStorageLocation)?;

    Ok(cache_dir.join("classifieds"))
  }

  fn run_migrations(&self) -> Result<(), StorageError> {
    let conn = self.lock()?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| StorageError::Io(format!("Failed to run cache migrations: {}", e)))?;

    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
    self
      .conn
      .lock()
      .map_err(|e| StorageError::Io(format!("Lock poisoned: {}", e)))
  }
}

/// Schema for the key → blob table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl CacheStorage for SqliteStorage {
  fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
    let conn = self.lock()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (key, data, cached_at)
         VALUES (?, ?, datetime('now'))",
        params![key, data],
      )
      .map_err(|e| StorageError::Io(format!("Failed to store entry: {}", e)))?;

    Ok(())
  }

  fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
    let conn = self.lock()?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT data FROM cache_entries WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| StorageError::Io(format!("Failed to read entry: {}", e)))?;

    data.ok_or_else(|| StorageError::NotFound(key.to_string()))
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM cache_entries WHERE key = ?", params![key])
      .map_err(|e| StorageError::Io(format!("Failed to remove entry: {}", e)))?;

    Ok(())
  }

  fn clear(&self) -> Result<(), StorageError> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM cache_entries", [])
      .map_err(|e| StorageError::Io(format!("Failed to clear cache: {}", e)))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn open_temp() -> (tempfile::TempDir, SqliteStorage) {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::open(Some(dir.path())).unwrap();
    (dir, storage)
  }

  #[test]
  fn test_put_then_get() {
    let (_dir, storage) = open_temp();

    storage.put("a", b"hello").unwrap();
    assert_eq!(storage.get("a").unwrap(), b"hello".to_vec());

    storage.put("a", b"replaced").unwrap();
    assert_eq!(storage.get("a").unwrap(), b"replaced".to_vec());
  }

  #[test]
  fn test_missing_key_is_not_found() {
    let (_dir, storage) = open_temp();

    assert!(matches!(
      storage.get("missing"),
      Err(StorageError::NotFound(key)) if key == "missing"
    ));
  }

  #[test]
  fn test_remove_and_clear() {
    let (_dir, storage) = open_temp();

    storage.put("a", b"1").unwrap();
    storage.put("b", b"2").unwrap();

    storage.remove("a").unwrap();
    // Removing twice is fine
    storage.remove("a").unwrap();
    assert!(matches!(storage.get("a"), Err(StorageError::NotFound(_))));
    assert!(storage.get("b").is_ok());

    storage.clear().unwrap();
    assert!(matches!(storage.get("b"), Err(StorageError::NotFound(_))));
  }

  #[test]
  fn test_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
      let storage = SqliteStorage::open(Some(dir.path())).unwrap();
      storage.put("persisted", b"bytes").unwrap();
    }

    let storage = SqliteStorage::open(Some(dir.path())).unwrap();
    assert_eq!(storage.get("persisted").unwrap(), b"bytes".to_vec());
    assert_eq!(storage.path(), dir.path().join("cache.db"));
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    storage.put("a", b"1").unwrap();
    assert!(matches!(storage.get("a"), Err(StorageError::NotFound(_))));
    storage.clear().unwrap();
  }
}
