//! Error taxonomy for the caching layers.
//!
//! Storage faults stay inside the local loader: they are translated into
//! [`LocalError`] before anything above it sees them.

use thiserror::Error;

/// Faults raised by a [`KeyValueStore`](super::storage::KeyValueStore) backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
  #[error("failed to encode cache entry '{key}': {reason}")]
  EncodingFailed { key: String, reason: String },

  #[error("failed to decode cache entry '{key}': {reason}")]
  DecodingFailed { key: String, reason: String },

  #[error("cache location unavailable: {0}")]
  InvalidLocation(String),

  #[error("failed to delete cache entry '{key}': {reason}")]
  DeleteFailed { key: String, reason: String },

  /// The preference backend only takes small payloads.
  #[error("cache entry '{key}' is {size} bytes, over the {limit} byte limit")]
  CapacityExceeded {
    key: String,
    size: usize,
    limit: usize,
  },
}

/// Outcome of a local cache read that produced no usable data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalError {
  #[error("no cached data")]
  DataNotFound,

  /// The entry exists but the invalidation policy marked it stale.
  #[error("cached data requires invalidation")]
  InvalidationRequired,

  #[error("cache storage not available: {0}")]
  StorageNotAvailable(String),

  #[error("cached data is corrupted: {0}")]
  DataCorrupted(String),
}

impl From<StorageError> for LocalError {
  fn from(err: StorageError) -> Self {
    match err {
      StorageError::DecodingFailed { .. } => LocalError::DataCorrupted(err.to_string()),
      other => LocalError::StorageNotAvailable(other.to_string()),
    }
  }
}

/// Failure of the remote fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
  #[error("invalid request url '{url}': {reason}")]
  InvalidUrl { url: String, reason: String },

  #[error("request to {url} failed: {reason}")]
  Transport { url: String, reason: String },

  #[error("request to {url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  /// The payload arrived but did not match the expected shape.
  #[error("failed to decode response from {url}: {reason}")]
  Decoding { url: String, reason: String },
}

/// Error surfaced by the composite loader once every fallback is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositeError {
  #[error(transparent)]
  Remote(#[from] RemoteError),

  /// Only produced when the loader is configured without a network attempt.
  #[error(transparent)]
  Local(#[from] LocalError),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decoding_failure_maps_to_corrupted() {
    let err = StorageError::DecodingFailed {
      key: "seasons".into(),
      reason: "expected value".into(),
    };
    assert!(matches!(LocalError::from(err), LocalError::DataCorrupted(_)));
  }

  #[test]
  fn test_other_storage_failures_map_to_unavailable() {
    let errors = [
      StorageError::InvalidLocation("/nope".into()),
      StorageError::DeleteFailed {
        key: "k".into(),
        reason: "busy".into(),
      },
      StorageError::EncodingFailed {
        key: "k".into(),
        reason: "bad".into(),
      },
    ];
    for err in errors {
      assert!(matches!(
        LocalError::from(err),
        LocalError::StorageNotAvailable(_)
      ));
    }
  }

  #[test]
  fn test_composite_error_is_transparent() {
    let remote = RemoteError::Status {
      url: "https://example.com/seasons.json".into(),
      status: 503,
    };
    let err = CompositeError::from(remote.clone());
    assert_eq!(err.to_string(), remote.to_string());
  }
}
