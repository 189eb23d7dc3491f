//! Durable cache tier: storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AppError, Result};

/// A single durable cache record.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  /// Serialized JSON payload
  pub data: String,
  /// When the entry was written
  pub updated_at: DateTime<Utc>,
}

/// Trait for durable cache backends.
///
/// Upsert semantics: at most one entry per key, last writer wins.
pub trait CacheStorage: Send + Sync {
  /// Read an entry by key.
  fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

  /// Write (or overwrite) an entry with the current timestamp.
  fn put(&self, key: &str, data: &str) -> Result<()>;
}

impl CacheStorage for Box<dyn CacheStorage> {
  fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
    (**self).get(key)
  }

  fn put(&self, key: &str, data: &str) -> Result<()> {
    (**self).put(key, data)
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
    Ok(None) // Always miss
  }

  fn put(&self, _key: &str, _data: &str) -> Result<()> {
    Ok(()) // Discard
  }
}

/// SQLite-based durable cache.
///
/// A single mutex around the connection serializes every read and write;
/// lookups are infrequent relative to any reasonable lock hold time.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database, creating it if needed.
  ///
  /// With no explicit path the database lands in the platform data dir.
  pub fn open(explicit_path: Option<&Path>) -> Result<Self> {
    let path = match explicit_path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| AppError::Cache(format!("failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(&path).map_err(|e| {
      AppError::Cache(format!("failed to open cache db at {}: {}", path.display(), e))
    })?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// In-memory database, for tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()?;
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| AppError::Cache("could not determine data directory".to_string()))?;

    Ok(data_dir.join("devboard").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| AppError::Cache(format!("failed to run cache migrations: {}", e)))?;
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| AppError::Cache(format!("lock poisoned: {}", e)))
  }

  /// Rewrite an entry's timestamp, for freshness tests.
  #[cfg(test)]
  pub fn backdate(&self, key: &str, updated_at: DateTime<Utc>) -> Result<()> {
    let conn = self.lock()?;
    conn.execute(
      "UPDATE cache_entries SET updated_at = ? WHERE cache_key = ?",
      params![updated_at.to_rfc3339(), key],
    )?;
    Ok(())
  }
}

/// Schema for the cache table. Upsert-only, no migrations beyond creation.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

impl CacheStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
    let conn = self.lock()?;

    let row: Option<(String, String)> = conn
      .query_row(
        "SELECT data, updated_at FROM cache_entries WHERE cache_key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    match row {
      Some((data, updated_at)) => {
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
          .map_err(|e| AppError::Cache(format!("bad cache timestamp '{}': {}", updated_at, e)))?
          .with_timezone(&Utc);
        Ok(Some(CacheEntry { data, updated_at }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, key: &str, data: &str) -> Result<()> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT INTO cache_entries (cache_key, data, updated_at) VALUES (?, ?, ?)
       ON CONFLICT(cache_key) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
      params![key, data, Utc::now().to_rfc3339()],
    )?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn get_on_empty_store_misses() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    assert!(storage.get("nope").unwrap().is_none());
  }

  #[test]
  fn put_then_get_roundtrips() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put("k", r#"{"n":1}"#).unwrap();

    let entry = storage.get("k").unwrap().expect("entry should exist");
    assert_eq!(entry.data, r#"{"n":1}"#);
    assert!((Utc::now() - entry.updated_at).num_seconds() < 5);
  }

  #[test]
  fn put_is_an_upsert_with_last_writer_wins() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put("k", "1").unwrap();
    storage.put("k", "2").unwrap();
    storage.put("k", "2").unwrap();

    let entry = storage.get("k").unwrap().unwrap();
    assert_eq!(entry.data, "2");

    // Exactly one row per key.
    let conn = storage.lock().unwrap();
    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE cache_key = 'k'",
        [],
        |row| row.get(0),
      )
      .unwrap();
    assert_eq!(count, 1);
  }

  #[test]
  fn noop_storage_always_misses() {
    let storage = NoopStorage;
    storage.put("k", "v").unwrap();
    assert!(storage.get("k").unwrap().is_none());
  }
}
