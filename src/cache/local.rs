//! Local loader: reads and writes one entity collection type in the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::entry::CacheEntry;
use super::error::{LocalError, StorageError};
use super::policy::InvalidationPolicy;
use super::storage::{KeyValueStore, KeyValueStoreExt};
use super::traits::{Cacheable, Loader};

/// Loads and saves collections of `T` through a shared [`KeyValueStore`].
///
/// Holds no state of its own beyond configuration; the store owns every entry.
pub struct LocalLoader<T> {
  store: Arc<dyn KeyValueStore>,
  policy: InvalidationPolicy,
  /// Tag written with every save.
  version: Option<String>,
  _entity: PhantomData<fn() -> T>,
}

impl<T: Cacheable> LocalLoader<T> {
  /// Create a loader with the default 30 minute invalidation window.
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self {
      store,
      policy: InvalidationPolicy::default(),
      version: None,
      _entity: PhantomData,
    }
  }

  pub fn with_policy(mut self, policy: InvalidationPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_invalidation_window(self, window: Duration) -> Self {
    self.with_policy(InvalidationPolicy::time_based(window))
  }

  /// Tag every saved entry with `version`.
  pub fn with_version(mut self, version: impl Into<String>) -> Self {
    self.version = Some(version.into());
    self
  }

  pub fn policy(&self) -> &InvalidationPolicy {
    &self.policy
  }

  pub fn store(&self) -> &Arc<dyn KeyValueStore> {
    &self.store
  }

  /// Read the entry for `resource` if it exists and the policy accepts it.
  pub fn load_valid(&self, resource: &str) -> Result<CacheEntry<Vec<T>>, LocalError> {
    let key = T::cache_key(resource);
    let entry = self.load_stale(resource)?;

    if self.policy.should_invalidate(&key, entry.timestamp) {
      debug!(entity = T::entity_type(), key = %key, "Cached data is stale");
      return Err(LocalError::InvalidationRequired);
    }

    debug!(entity = T::entity_type(), key = %key, "Cache hit");
    Ok(entry)
  }

  /// Read the entry for `resource` without consulting the policy.
  pub fn load_stale(&self, resource: &str) -> Result<CacheEntry<Vec<T>>, LocalError> {
    let key = T::cache_key(resource);
    match self.store.load::<Vec<T>>(&key)? {
      Some(entry) => Ok(entry),
      None => {
        debug!(entity = T::entity_type(), key = %key, "Cache miss");
        Err(LocalError::DataNotFound)
      }
    }
  }

  /// Persist `items` as the collection for `resource`.
  pub fn save(&self, items: &[T], resource: &str) -> Result<(), StorageError> {
    let key = T::cache_key(resource);
    self.store.save(&key, items, self.version.as_deref())?;
    debug!(entity = T::entity_type(), key = %key, count = items.len(), "Saved to cache");
    Ok(())
  }

  /// Whether a cached entry exists, decodes, and is still valid.
  pub fn has_valid_cache(&self, resource: &str) -> bool {
    self.load_valid(resource).is_ok()
  }

  /// When the entry for `resource` was written, if there is a readable one.
  pub fn cache_timestamp(&self, resource: &str) -> Option<DateTime<Utc>> {
    self.load_stale(resource).ok().map(|entry| entry.timestamp)
  }

  /// [`load_valid`](Self::load_valid) on the blocking thread pool.
  pub async fn fetch_valid(&self, resource: &str) -> Result<CacheEntry<Vec<T>>, LocalError> {
    let resource = resource.to_string();
    self
      .blocking(move |loader| loader.load_valid(&resource))
      .await
      .unwrap_or_else(|reason| Err(LocalError::StorageNotAvailable(reason)))
  }

  /// [`load_stale`](Self::load_stale) on the blocking thread pool.
  pub async fn fetch_stale(&self, resource: &str) -> Result<CacheEntry<Vec<T>>, LocalError> {
    let resource = resource.to_string();
    self
      .blocking(move |loader| loader.load_stale(&resource))
      .await
      .unwrap_or_else(|reason| Err(LocalError::StorageNotAvailable(reason)))
  }

  /// [`save`](Self::save) on the blocking thread pool.
  pub async fn persist(&self, items: Vec<T>, resource: &str) -> Result<(), StorageError> {
    let resource = resource.to_string();
    self
      .blocking(move |loader| loader.save(&items, &resource))
      .await
      .unwrap_or_else(|reason| Err(StorageError::InvalidLocation(reason)))
  }

  /// Run `op` against a clone of this loader without stalling the async worker.
  async fn blocking<R, F>(&self, op: F) -> Result<R, String>
  where
    F: FnOnce(Self) -> R + Send + 'static,
    R: Send + 'static,
  {
    let loader = self.clone();
    match tokio::task::spawn_blocking(move || op(loader)).await {
      Ok(out) => Ok(out),
      Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
      Err(err) => Err(format!("storage task cancelled: {}", err)),
    }
  }

  pub fn clear(&self, resource: &str) -> Result<(), StorageError> {
    self.store.remove(&T::cache_key(resource))
  }

  /// Clear the whole store, including other entity types sharing it.
  pub fn clear_all(&self) -> Result<(), StorageError> {
    self.store.clear_all()
  }
}

impl<T> Clone for LocalLoader<T> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      policy: self.policy.clone(),
      version: self.version.clone(),
      _entity: PhantomData,
    }
  }
}

#[async_trait]
impl<T: Cacheable> Loader<T> for LocalLoader<T> {
  type Error = LocalError;

  async fn fetch(&self, resource: &str) -> Result<Vec<T>, LocalError> {
    self.fetch_valid(resource).await.map(|entry| entry.data)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::cache::file_storage::FileStorage;
  use crate::cache::key::{CacheKey, KeyDerivation};
  use crate::cache::policy::InvalidationPolicy;
  use crate::cache::storage::StoredVersions;
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
  pub(crate) struct Winner {
    pub round: u32,
    pub driver: String,
  }

  impl Cacheable for Winner {
    fn entity_type() -> &'static str {
      "winner"
    }

    fn key_derivation() -> KeyDerivation {
      KeyDerivation::YearOrHash("winners")
    }
  }

  pub(crate) fn winners() -> Vec<Winner> {
    vec![
      Winner {
        round: 1,
        driver: "Leclerc".into(),
      },
      Winner {
        round: 2,
        driver: "Verstappen".into(),
      },
    ]
  }

  pub(crate) fn file_store() -> (tempfile::TempDir, Arc<dyn KeyValueStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStorage::open(dir.path()).unwrap());
    (dir, store)
  }

  /// Write an entry whose timestamp is `age` in the past.
  pub(crate) fn save_aged(
    store: &Arc<dyn KeyValueStore>,
    resource: &str,
    items: &[Winner],
    age: chrono::Duration,
  ) {
    let entry = CacheEntry {
      data: items,
      timestamp: Utc::now() - age,
      version: None,
    };
    let bytes = serde_json::to_vec(&entry).unwrap();
    store
      .save_raw(&Winner::cache_key(resource), &bytes)
      .unwrap();
  }

  #[tokio::test]
  async fn test_missing_is_data_not_found() {
    let (_dir, store) = file_store();
    let loader = LocalLoader::<Winner>::new(store);
    assert_eq!(loader.fetch("2022").await, Err(LocalError::DataNotFound));
    assert!(!loader.has_valid_cache("2022"));
    assert_eq!(loader.cache_timestamp("2022"), None);
  }

  #[tokio::test]
  async fn test_save_then_fetch() {
    let (_dir, store) = file_store();
    let loader = LocalLoader::<Winner>::new(store);
    loader.save(&winners(), "https://api/f1/2022/winners.json").unwrap();

    // Same year, different identifier: same key.
    assert_eq!(loader.fetch("2022").await.unwrap(), winners());
    assert!(loader.has_valid_cache("2022"));
    assert!(loader.cache_timestamp("2022").is_some());
  }

  #[tokio::test]
  async fn test_stale_entry_requires_invalidation() {
    let (_dir, store) = file_store();
    save_aged(&store, "2022", &winners(), chrono::Duration::minutes(31));

    let loader = LocalLoader::<Winner>::new(store);
    assert_eq!(
      loader.fetch("2022").await,
      Err(LocalError::InvalidationRequired)
    );
    assert!(!loader.has_valid_cache("2022"));
    assert_eq!(loader.load_stale("2022").unwrap().data, winners());
  }

  #[tokio::test]
  async fn test_custom_window() {
    let (_dir, store) = file_store();
    save_aged(&store, "2022", &winners(), chrono::Duration::minutes(31));

    let loader =
      LocalLoader::<Winner>::new(store).with_invalidation_window(Duration::from_secs(60 * 60));
    assert_eq!(loader.fetch("2022").await.unwrap(), winners());
  }

  #[tokio::test]
  async fn test_corrupted_entry() {
    let (_dir, store) = file_store();
    store
      .save_raw(&Winner::cache_key("2022"), b"[[[")
      .unwrap();

    let loader = LocalLoader::<Winner>::new(store);
    assert!(matches!(
      loader.fetch("2022").await,
      Err(LocalError::DataCorrupted(_))
    ));
  }

  #[tokio::test]
  async fn test_undecodable_entry_is_not_valid_cache() {
    let (_dir, store) = file_store();
    let bytes = serde_json::to_vec(&serde_json::json!({
      "data": { "oops": 1 },
      "timestamp": Utc::now(),
    }))
    .unwrap();
    store.save_raw(&Winner::cache_key("2022"), &bytes).unwrap();

    let loader = LocalLoader::<Winner>::new(store);
    assert!(matches!(
      loader.fetch("2022").await,
      Err(LocalError::DataCorrupted(_))
    ));
    assert!(!loader.has_valid_cache("2022"));
    assert_eq!(loader.cache_timestamp("2022"), None);
  }

  /// Store that records which thread served each read.
  struct ThreadRecordingStore {
    inner: Arc<dyn KeyValueStore>,
    readers: std::sync::Mutex<Vec<std::thread::ThreadId>>,
  }

  impl KeyValueStore for ThreadRecordingStore {
    fn name(&self) -> &'static str {
      "thread-recording"
    }

    fn save_raw(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), StorageError> {
      self.inner.save_raw(key, bytes)
    }

    fn load_raw(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StorageError> {
      self.readers.lock().unwrap().push(std::thread::current().id());
      self.inner.load_raw(key)
    }

    fn remove(&self, key: &CacheKey) -> Result<(), StorageError> {
      self.inner.remove(key)
    }

    fn clear_all(&self) -> Result<(), StorageError> {
      self.inner.clear_all()
    }
  }

  #[tokio::test]
  async fn test_async_reads_run_off_the_runtime_thread() {
    let (_dir, inner) = file_store();
    let recording = Arc::new(ThreadRecordingStore {
      inner,
      readers: std::sync::Mutex::new(Vec::new()),
    });
    let store: Arc<dyn KeyValueStore> = recording.clone();
    let loader = LocalLoader::<Winner>::new(store);
    loader.persist(winners(), "2022").await.unwrap();

    assert_eq!(loader.fetch("2022").await.unwrap(), winners());
    assert_eq!(loader.fetch_stale("2022").await.unwrap().data, winners());

    let runtime_thread = std::thread::current().id();
    let readers = recording.readers.lock().unwrap();
    assert_eq!(readers.len(), 2);
    assert!(readers.iter().all(|id| *id != runtime_thread));
  }

  #[tokio::test]
  async fn test_version_tag_drives_invalidation() {
    let (_dir, store) = file_store();
    let policy =
      InvalidationPolicy::version_based("2", Arc::new(StoredVersions::new(Arc::clone(&store))));

    let old = LocalLoader::<Winner>::new(Arc::clone(&store)).with_version("1");
    old.save(&winners(), "2022").unwrap();

    let current = LocalLoader::<Winner>::new(Arc::clone(&store))
      .with_version("2")
      .with_policy(policy);
    assert_eq!(
      current.fetch("2022").await,
      Err(LocalError::InvalidationRequired)
    );

    current.save(&winners(), "2022").unwrap();
    assert_eq!(current.fetch("2022").await.unwrap(), winners());
  }

  #[tokio::test]
  async fn test_clear() {
    let (_dir, store) = file_store();
    let loader = LocalLoader::<Winner>::new(store);
    loader.save(&winners(), "2021").unwrap();
    loader.save(&winners(), "2022").unwrap();

    loader.clear("2021").unwrap();
    assert_eq!(loader.fetch("2021").await, Err(LocalError::DataNotFound));
    assert!(loader.fetch("2022").await.is_ok());

    loader.clear_all().unwrap();
    assert_eq!(loader.fetch("2022").await, Err(LocalError::DataNotFound));
  }
}
