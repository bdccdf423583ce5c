//! Remote fetching: the network transport and the JSON-decoding loader on top of it.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::info;
use url::Url;

use super::error::RemoteError;
use super::traits::{Cacheable, Loader};
use crate::config::ApiConfig;

/// Fetches the raw body at a URL.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
  async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, RemoteError>;
}

/// [`RemoteFetcher`] over HTTP.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, RemoteError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(user_agent)
      .build()
      .map_err(|e| RemoteError::Transport {
        url: String::new(),
        reason: format!("failed to create HTTP client: {}", e),
      })?;

    Ok(Self { client })
  }

  pub fn from_config(config: &ApiConfig) -> Result<Self, RemoteError> {
    Self::new(Duration::from_secs(config.timeout_secs), &config.user_agent)
  }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
  async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, RemoteError> {
    let response = self
      .client
      .get(url.clone())
      .send()
      .await
      .map_err(|e| RemoteError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
      })?;

    let status = response.status();
    if !status.is_success() {
      return Err(RemoteError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    let body = response.bytes().await.map_err(|e| RemoteError::Transport {
      url: url.to_string(),
      reason: e.to_string(),
    })?;

    Ok(body.to_vec())
  }
}

/// Loads collections of `T` from a JSON API.
///
/// Resource identifiers are either absolute URLs or paths relative to `base_url`.
/// Responses must be a JSON array of objects.
pub struct RemoteLoader<T, F> {
  fetcher: F,
  base_url: Url,
  _entity: PhantomData<fn() -> T>,
}

impl<T: Cacheable, F: RemoteFetcher> RemoteLoader<T, F> {
  pub fn new(fetcher: F, base_url: Url) -> Self {
    Self {
      fetcher,
      base_url,
      _entity: PhantomData,
    }
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Turn `resource` into the URL to request.
  pub fn resolve(&self, resource: &str) -> Result<Url, RemoteError> {
    match Url::parse(resource) {
      Ok(url) => Ok(url),
      Err(url::ParseError::RelativeUrlWithoutBase) => {
        self
          .base_url
          .join(resource)
          .map_err(|e| RemoteError::InvalidUrl {
            url: resource.to_string(),
            reason: e.to_string(),
          })
      }
      Err(e) => Err(RemoteError::InvalidUrl {
        url: resource.to_string(),
        reason: e.to_string(),
      }),
    }
  }
}

impl<T, F: Clone> Clone for RemoteLoader<T, F> {
  fn clone(&self) -> Self {
    Self {
      fetcher: self.fetcher.clone(),
      base_url: self.base_url.clone(),
      _entity: PhantomData,
    }
  }
}

#[async_trait]
impl<T: Cacheable, F: RemoteFetcher> Loader<T> for RemoteLoader<T, F> {
  type Error = RemoteError;

  async fn fetch(&self, resource: &str) -> Result<Vec<T>, RemoteError> {
    let url = self.resolve(resource)?;
    info!(entity = T::entity_type(), url = %url, "Fetching from network");

    let bytes = self.fetcher.fetch_bytes(&url).await?;
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decoding {
      url: url.to_string(),
      reason: e.to_string(),
    })
  }
}
