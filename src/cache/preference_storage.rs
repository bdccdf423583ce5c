//! Small-payload preference store backed by SQLite.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::error::StorageError;
use super::key::CacheKey;
use super::storage::KeyValueStore;

/// Default key prefix for rows owned by the cache.
pub const DEFAULT_PREFIX: &str = "paddock.cache.";

/// Default per-value limit. Preference stores are meant for small payloads.
pub const DEFAULT_MAX_VALUE_BYTES: usize = 512 * 1024;

/// Schema for the preference table.
const PREFERENCES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS preferences (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Key-value preference store. Rows are keyed by `<prefix><key>` and values
/// over `max_value_bytes` are refused.
pub struct PreferenceStorage {
  conn: Mutex<Connection>,
  prefix: String,
  max_value_bytes: usize,
}

impl PreferenceStorage {
  /// Open the store at `path`, creating the parent directory if needed.
  pub fn open(path: &Path, prefix: &str, max_value_bytes: usize) -> Result<Self, StorageError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        StorageError::InvalidLocation(format!(
          "failed to create preference directory {}: {}",
          parent.display(),
          e
        ))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      StorageError::InvalidLocation(format!(
        "failed to open preference store at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::with_connection(conn, prefix, max_value_bytes)
  }

  /// Open a store that lives only as long as this value.
  pub fn in_memory(prefix: &str, max_value_bytes: usize) -> Result<Self, StorageError> {
    let conn = Connection::open_in_memory().map_err(|e| {
      StorageError::InvalidLocation(format!("failed to open in-memory preference store: {}", e))
    })?;
    Self::with_connection(conn, prefix, max_value_bytes)
  }

  fn with_connection(
    conn: Connection,
    prefix: &str,
    max_value_bytes: usize,
  ) -> Result<Self, StorageError> {
    conn
      .execute_batch(PREFERENCES_SCHEMA)
      .map_err(|e| StorageError::InvalidLocation(format!("failed to create preferences table: {}", e)))?;

    Ok(Self {
      conn: Mutex::new(conn),
      prefix: prefix.to_string(),
      max_value_bytes,
    })
  }

  fn row_key(&self, key: &CacheKey) -> String {
    format!("{}{}", self.prefix, key)
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
    self
      .conn
      .lock()
      .map_err(|e| StorageError::InvalidLocation(format!("lock poisoned: {}", e)))
  }
}

impl KeyValueStore for PreferenceStorage {
  fn name(&self) -> &'static str {
    "preferences"
  }

  fn save_raw(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), StorageError> {
    if bytes.len() > self.max_value_bytes {
      return Err(StorageError::CapacityExceeded {
        key: key.to_string(),
        size: bytes.len(),
        limit: self.max_value_bytes,
      });
    }

    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO preferences (key, value, updated_at) VALUES (?, ?, ?)",
        params![self.row_key(key), bytes, Utc::now().to_rfc3339()],
      )
      .map_err(|e| StorageError::InvalidLocation(format!("failed to store preference: {}", e)))?;

    Ok(())
  }

  fn load_raw(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StorageError> {
    let conn = self.lock()?;
    conn
      .query_row(
        "SELECT value FROM preferences WHERE key = ?",
        params![self.row_key(key)],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| StorageError::InvalidLocation(format!("failed to read preference: {}", e)))
  }

  fn remove(&self, key: &CacheKey) -> Result<(), StorageError> {
    let conn = self.lock()?;
    conn
      .execute(
        "DELETE FROM preferences WHERE key = ?",
        params![self.row_key(key)],
      )
      .map_err(|e| StorageError::DeleteFailed {
        key: key.to_string(),
        reason: e.to_string(),
      })?;
    Ok(())
  }

  fn clear_all(&self) -> Result<(), StorageError> {
    let conn = self.lock()?;
    // substr instead of LIKE so '_' and '%' in the prefix match literally.
    conn
      .execute(
        "DELETE FROM preferences WHERE substr(key, 1, ?1) = ?2",
        params![self.prefix.chars().count() as i64, self.prefix],
      )
      .map_err(|e| StorageError::DeleteFailed {
        key: format!("{}*", self.prefix),
        reason: e.to_string(),
      })?;
    Ok(())
  }

  fn on_resource_evict(&self) {
    if let Ok(conn) = self.lock() {
      if let Err(e) = conn.execute_batch("PRAGMA shrink_memory;") {
        debug!(error = %e, "Failed to shrink preference store memory");
      }
    }
  }
}
