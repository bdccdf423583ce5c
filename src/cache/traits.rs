//! Core traits and types for the caching system.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use super::key::{CacheKey, KeyDerivation};

/// Trait for records that are cached as collections.
///
/// Implementors say how a resource identifier maps onto a cache key.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Entity type name for logging (e.g., "season", "race_winner")
  fn entity_type() -> &'static str;

  /// How resource identifiers are turned into cache keys.
  fn key_derivation() -> KeyDerivation;

  /// Cache key for the collection identified by `resource`.
  fn cache_key(resource: &str) -> CacheKey {
    Self::key_derivation().derive(resource)
  }
}

/// Something that can produce the collection for a resource identifier.
///
/// Local, remote and composite loaders all implement this, so they can be
/// stacked or swapped freely.
#[async_trait]
pub trait Loader<T>: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  async fn fetch(&self, resource: &str) -> Result<Vec<T>, Self::Error>;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data that passed the invalidation policy.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      cached_at: Some(cached_at),
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }

  /// True when the data did not come from a successful network fetch or a fresh cache hit.
  pub fn is_degraded(&self) -> bool {
    self.source == CacheSource::Offline
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Offline mode - network unavailable, serving possibly stale cached data
  Offline,
}
