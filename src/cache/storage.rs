//! Persistent key-value store contract and backend selection.

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::entry::{CacheEntry, EntryMetadata, HeaderOnly};
use super::error::StorageError;
use super::file_storage::FileStorage;
use super::key::CacheKey;
use super::policy::VersionSource;
use super::preference_storage::PreferenceStorage;
use crate::config::CacheConfig;

/// Durable byte storage keyed by [`CacheKey`].
///
/// Backends must make `save_raw` atomic with respect to concurrent
/// `load_raw` calls for the same key: a reader sees the old bytes or the
/// new bytes, never a mix.
///
/// Every call is blocking I/O. Async code reaches a store through
/// [`LocalLoader`](super::LocalLoader)'s async methods, which run it on the
/// blocking thread pool.
pub trait KeyValueStore: Send + Sync {
  /// Backend name for logging (e.g. "file", "preferences").
  fn name(&self) -> &'static str;

  /// Write `bytes` under `key`, replacing any previous value.
  fn save_raw(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), StorageError>;

  /// Read the bytes stored under `key`. A missing key is `Ok(None)`.
  fn load_raw(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StorageError>;

  /// Delete the value under `key`. Deleting a missing key succeeds.
  fn remove(&self, key: &CacheKey) -> Result<(), StorageError>;

  /// Delete every value owned by this store.
  fn clear_all(&self) -> Result<(), StorageError>;

  /// Called by the host when the platform asks to release memory.
  fn on_resource_evict(&self) {}
}

/// Typed access to a [`KeyValueStore`] through [`CacheEntry`] envelopes.
pub trait KeyValueStoreExt: KeyValueStore {
  /// Wrap `value` in a timestamped entry and persist it under `key`.
  fn save<T: Serialize + ?Sized>(
    &self,
    key: &CacheKey,
    value: &T,
    version: Option<&str>,
  ) -> Result<(), StorageError> {
    let entry = CacheEntry::new(value, version.map(str::to_string));
    let bytes = serde_json::to_vec(&entry).map_err(|e| StorageError::EncodingFailed {
      key: key.to_string(),
      reason: e.to_string(),
    })?;
    self.save_raw(key, &bytes)
  }

  /// Load and decode the entry under `key`.
  fn load<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<CacheEntry<T>>, StorageError> {
    match self.load_raw(key)? {
      Some(bytes) => serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StorageError::DecodingFailed {
          key: key.to_string(),
          reason: e.to_string(),
        }),
      None => Ok(None),
    }
  }

  /// Load only the timestamp and version tag of the entry under `key`.
  fn load_metadata(&self, key: &CacheKey) -> Result<Option<EntryMetadata>, StorageError> {
    match self.load_raw(key)? {
      Some(bytes) => serde_json::from_slice::<HeaderOnly>(&bytes)
        .map(|header| Some(header.into()))
        .map_err(|e| StorageError::DecodingFailed {
          key: key.to_string(),
          reason: e.to_string(),
        }),
      None => Ok(None),
    }
  }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// Storage that keeps nothing. Used when caching is disabled.
pub struct NoopStorage;

impl KeyValueStore for NoopStorage {
  fn name(&self) -> &'static str {
    "noop"
  }

  fn save_raw(&self, _key: &CacheKey, _bytes: &[u8]) -> Result<(), StorageError> {
    Ok(()) // Discard
  }

  fn load_raw(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, StorageError> {
    Ok(None) // Always miss
  }

  fn remove(&self, _key: &CacheKey) -> Result<(), StorageError> {
    Ok(())
  }

  fn clear_all(&self) -> Result<(), StorageError> {
    Ok(())
  }
}

/// Reads version tags from the entries of a store.
#[derive(Clone)]
pub struct StoredVersions(Arc<dyn KeyValueStore>);

impl StoredVersions {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self(store)
  }
}

impl fmt::Debug for StoredVersions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("StoredVersions").field(&self.0.name()).finish()
  }
}

impl VersionSource for StoredVersions {
  fn stored_version(&self, key: &CacheKey) -> Option<String> {
    // Unreadable entries have no usable version; treated like a missing tag.
    self.0.load_metadata(key).ok().flatten().and_then(|meta| meta.version)
  }
}

/// Open the store described by `config`.
///
/// File storage is preferred. If its directory can't be created the
/// size-constrained preference store is used instead, first on disk and
/// then in memory.
pub fn open_storage(config: &CacheConfig) -> Arc<dyn KeyValueStore> {
  if !config.enabled {
    debug!("Caching disabled, using noop storage");
    return Arc::new(NoopStorage);
  }

  match config.directory() {
    Some(dir) => match FileStorage::open(&dir) {
      Ok(storage) => {
        debug!(path = %dir.display(), "Using file cache storage");
        return Arc::new(storage);
      }
      Err(err) => warn!(path = %dir.display(), error = %err, "File cache unavailable, falling back to preferences"),
    },
    None => warn!("No cache directory available, falling back to preferences"),
  }

  if let Some(path) = config.preference_path() {
    match PreferenceStorage::open(&path, &config.preference_prefix, config.max_preference_bytes) {
      Ok(storage) => return Arc::new(storage),
      Err(err) => warn!(path = %path.display(), error = %err, "Preference store unavailable on disk"),
    }
  }

  match PreferenceStorage::in_memory(&config.preference_prefix, config.max_preference_bytes) {
    Ok(storage) => Arc::new(storage),
    Err(err) => {
      warn!(error = %err, "In-memory preference store unavailable, caching disabled");
      Arc::new(NoopStorage)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    let key = CacheKey::fixed("seasons");
    storage.save(&key, &vec![1, 2, 3], None).unwrap();
    assert_eq!(storage.load::<Vec<i32>>(&key).unwrap(), None);
  }

  #[test]
  fn test_factory_prefers_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig {
      directory: Some(dir.path().join("cache")),
      ..CacheConfig::default()
    };
    let storage = open_storage(&config);
    assert_eq!(storage.name(), "file");
    assert!(dir.path().join("cache").is_dir());
  }

  #[test]
  fn test_factory_falls_back_to_preferences() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the cache directory should go.
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let config = CacheConfig {
      directory: Some(blocker.join("cache")),
      preference_path: Some(dir.path().join("prefs.db")),
      ..CacheConfig::default()
    };
    let storage = open_storage(&config);
    assert_eq!(storage.name(), "preferences");

    let key = CacheKey::fixed("seasons");
    storage.save(&key, &["2023"], None).unwrap();
    let entry = storage.load::<Vec<String>>(&key).unwrap().unwrap();
    assert_eq!(entry.data, vec!["2023".to_string()]);
  }

  #[test]
  fn test_factory_falls_back_to_memory_preferences() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, b"x").unwrap();

    let config = CacheConfig {
      directory: Some(blocker.join("cache")),
      preference_path: Some(blocker.join("nested").join("prefs.db")),
      ..CacheConfig::default()
    };
    let storage = open_storage(&config);
    assert_eq!(storage.name(), "preferences");
  }

  #[test]
  fn test_disabled_cache_uses_noop() {
    let config = CacheConfig {
      enabled: false,
      ..CacheConfig::default()
    };
    assert_eq!(open_storage(&config).name(), "noop");
  }

  #[test]
  fn test_stored_versions_reads_entry_tag() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStorage::open(dir.path()).unwrap());
    let tagged = CacheKey::fixed("tagged");
    let untagged = CacheKey::fixed("untagged");
    store.save(&tagged, &[1u8], Some("v3")).unwrap();
    store.save(&untagged, &[1u8], None).unwrap();

    let versions = StoredVersions::new(store);
    assert_eq!(versions.stored_version(&tagged).as_deref(), Some("v3"));
    assert_eq!(versions.stored_version(&untagged), None);
    assert_eq!(versions.stored_version(&CacheKey::fixed("missing")), None);
  }
}
