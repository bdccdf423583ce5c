//! Cached F1 client that wraps remote loaders with transparent caching.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::cache::{
  open_storage, CacheResult, Cacheable, CompositeError, CompositeLoader, HttpFetcher,
  KeyValueStore, LocalLoader, Loader, RemoteFetcher, RemoteLoader, StorageError,
};
use crate::config::Config;

use super::endpoints;
use super::types::{RaceWinner, Season};

/// Standings client with transparent caching support.
///
/// Both collections share one store, constructed once and handed to every
/// loader. Results are served from cache while valid, refreshed from the
/// network otherwise, and served stale when the network is down.
pub struct CachedF1Client<F = HttpFetcher> {
  store: Arc<dyn KeyValueStore>,
  seasons: CompositeLoader<Season, RemoteLoader<Season, F>>,
  race_winners: CompositeLoader<RaceWinner, RemoteLoader<RaceWinner, F>>,
}

impl CachedF1Client<HttpFetcher> {
  /// Create a client using the configured storage and an HTTP transport.
  pub fn new(config: &Config) -> Result<Self> {
    let store = open_storage(&config.cache);
    let fetcher = HttpFetcher::from_config(&config.api)
      .map_err(|e| eyre!("Failed to create standings client: {}", e))?;

    Ok(Self::with_parts(config, store, fetcher))
  }
}

impl<F: RemoteFetcher + Clone> CachedF1Client<F> {
  /// Create a client over an existing store and transport.
  pub fn with_parts(config: &Config, store: Arc<dyn KeyValueStore>, fetcher: F) -> Self {
    let seasons = CompositeLoader::new(
      local_loader(config, &store),
      RemoteLoader::new(fetcher.clone(), config.api.base_url.clone()),
    );
    let race_winners = CompositeLoader::new(
      local_loader(config, &store),
      RemoteLoader::new(fetcher, config.api.base_url.clone()),
    );

    Self {
      store,
      seasons,
      race_winners,
    }
  }

  /// All seasons, newest data available.
  pub async fn seasons(&self) -> Result<Vec<Season>, CompositeError> {
    self.seasons.fetch(endpoints::SEASONS).await
  }

  /// All seasons, with where they came from.
  pub async fn seasons_detailed(&self) -> Result<CacheResult<Vec<Season>>, CompositeError> {
    self.seasons.fetch_detailed(endpoints::SEASONS).await
  }

  /// Race winners of `year`.
  pub async fn race_winners(&self, year: u16) -> Result<Vec<RaceWinner>, CompositeError> {
    self.race_winners.fetch(&endpoints::race_winners(year)).await
  }

  /// Race winners of `year`, with where they came from.
  pub async fn race_winners_detailed(
    &self,
    year: u16,
  ) -> Result<CacheResult<Vec<RaceWinner>>, CompositeError> {
    self
      .race_winners
      .fetch_detailed(&endpoints::race_winners(year))
      .await
  }

  /// User-initiated refresh of the seasons list.
  pub async fn refresh_seasons(&self) -> Result<Vec<Season>, CompositeError> {
    self.seasons.force_refresh(endpoints::SEASONS).await
  }

  /// User-initiated refresh of one year's race winners.
  pub async fn refresh_race_winners(&self, year: u16) -> Result<Vec<RaceWinner>, CompositeError> {
    self
      .race_winners
      .force_refresh(&endpoints::race_winners(year))
      .await
  }

  pub fn has_valid_race_winners(&self, year: u16) -> bool {
    self
      .race_winners
      .local()
      .has_valid_cache(&endpoints::race_winners(year))
  }

  /// Drop every cached collection.
  pub fn clear_cache(&self) -> Result<(), StorageError> {
    self.store.clear_all()
  }

  /// Forward a platform memory-pressure notification to the store.
  pub fn on_resource_evict(&self) {
    self.store.on_resource_evict();
  }
}

fn local_loader<T: Cacheable>(
  config: &Config,
  store: &Arc<dyn KeyValueStore>,
) -> LocalLoader<T> {
  let loader =
    LocalLoader::new(Arc::clone(store)).with_policy(config.cache.invalidation_policy(store));
  match &config.cache.version {
    Some(version) => loader.with_version(version.clone()),
    None => loader,
  }
}
