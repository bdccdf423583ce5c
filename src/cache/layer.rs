//! Cache layer that orchestrates the local cache with network fetching.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::error::{CompositeError, LocalError, RemoteError};
use super::local::LocalLoader;
use super::traits::{CacheResult, Cacheable, Loader};

/// Where a composite fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
  /// Serve valid cache, otherwise go to the network.
  #[default]
  CacheFirst,
  /// Always go to the network first (explicit refresh).
  ForceRemote,
  /// Never touch the network.
  CacheOnly,
}

/// Local cache in front of a remote loader.
///
/// 1. Check cache - if valid, return immediately
/// 2. If stale/missing/unreadable, fetch from the remote
/// 3. Write the fresh data back to the cache (best effort)
/// 4. On remote failure, return whatever is cached, however old (offline mode)
///
/// Concurrent fetches for the same resource are not coordinated: each may
/// reach the remote and the last save wins.
pub struct CompositeLoader<T, R> {
  local: LocalLoader<T>,
  remote: R,
  mode: FetchMode,
}

impl<T, R> CompositeLoader<T, R>
where
  T: Cacheable,
  R: Loader<T, Error = RemoteError>,
{
  pub fn new(local: LocalLoader<T>, remote: R) -> Self {
    Self {
      local,
      remote,
      mode: FetchMode::CacheFirst,
    }
  }

  pub fn with_mode(mut self, mode: FetchMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn mode(&self) -> FetchMode {
    self.mode
  }

  pub fn local(&self) -> &LocalLoader<T> {
    &self.local
  }

  pub fn remote(&self) -> &R {
    &self.remote
  }

  /// Fetch `resource`, reporting where the data came from.
  pub async fn fetch_detailed(&self, resource: &str) -> Result<CacheResult<Vec<T>>, CompositeError> {
    match self.mode {
      FetchMode::ForceRemote => return Ok(self.fetch_remote(resource).await?),
      FetchMode::CacheFirst | FetchMode::CacheOnly => {}
    }

    let local_err = match self.local.fetch_valid(resource).await {
      Ok(entry) => return Ok(CacheResult::from_cache(entry.data, entry.timestamp)),
      Err(err) => err,
    };

    if self.mode == FetchMode::CacheOnly {
      return Err(CompositeError::Local(local_err));
    }

    debug!(
      entity = T::entity_type(),
      resource,
      reason = %local_err,
      "No usable cache, going to network"
    );
    Ok(self.fetch_remote(resource).await?)
  }

  /// Fetch `resource` from the remote regardless of cache validity.
  ///
  /// Keeps the write-through and stale fallback of a normal fetch.
  pub async fn force_refresh(&self, resource: &str) -> Result<Vec<T>, CompositeError> {
    info!(entity = T::entity_type(), resource, "Forcing refresh");
    Ok(self.fetch_remote(resource).await?.data)
  }

  async fn fetch_remote(&self, resource: &str) -> Result<CacheResult<Vec<T>>, RemoteError> {
    match self.remote.fetch(resource).await {
      Ok(data) => {
        if let Err(err) = self.local.persist(data.clone(), resource).await {
          warn!(
            entity = T::entity_type(),
            resource,
            error = %err,
            "Failed to cache fetched data"
          );
        }
        Ok(CacheResult::from_network(data))
      }
      Err(remote_err) => match self.local.fetch_stale(resource).await {
        Ok(entry) => {
          warn!(
            entity = T::entity_type(),
            resource,
            error = %remote_err,
            cached_at = %entry.timestamp,
            "Network failed, serving cached data"
          );
          Ok(CacheResult::offline(entry.data, entry.timestamp))
        }
        Err(LocalError::DataNotFound) => Err(remote_err),
        Err(local_err) => {
          debug!(
            entity = T::entity_type(),
            resource,
            error = %local_err,
            "Cached fallback unreadable"
          );
          Err(remote_err)
        }
      },
    }
  }
}

impl<T, R: Clone> Clone for CompositeLoader<T, R> {
  fn clone(&self) -> Self {
    Self {
      local: self.local.clone(),
      remote: self.remote.clone(),
      mode: self.mode,
    }
  }
}

#[async_trait]
impl<T, R> Loader<T> for CompositeLoader<T, R>
where
  T: Cacheable,
  R: Loader<T, Error = RemoteError>,
{
  type Error = CompositeError;

  async fn fetch(&self, resource: &str) -> Result<Vec<T>, CompositeError> {
    self.fetch_detailed(resource).await.map(|result| result.data)
  }
}
