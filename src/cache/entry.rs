//! The envelope every cached payload is stored in.

use chrono::{DateTime, Utc};
use serde::{de::IgnoredAny, Deserialize, Serialize};

/// A cached payload stamped with its write time and an optional version tag.
///
/// Entries are immutable snapshots: a new save replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  pub data: T,
  pub timestamp: DateTime<Utc>,
  #[serde(default)]
  pub version: Option<String>,
}

impl<T> CacheEntry<T> {
  /// Wrap `data`, stamping it with the current time.
  pub fn new(data: T, version: Option<String>) -> Self {
    Self {
      data,
      timestamp: Utc::now(),
      version,
    }
  }

  /// Age of the entry relative to `now`. Future timestamps count as zero.
  pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
    (now - self.timestamp).max(chrono::Duration::zero())
  }
}

/// Entry header without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntryMetadata {
  pub timestamp: DateTime<Utc>,
  #[serde(default)]
  pub version: Option<String>,
}

/// Used to parse only the header of a stored entry.
#[derive(Deserialize)]
pub(crate) struct HeaderOnly {
  #[allow(dead_code)]
  data: IgnoredAny,
  timestamp: DateTime<Utc>,
  #[serde(default)]
  version: Option<String>,
}

impl From<HeaderOnly> for EntryMetadata {
  fn from(header: HeaderOnly) -> Self {
    Self {
      timestamp: header.timestamp,
      version: header.version,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  #[test]
  fn test_serialized_shape() {
    let entry = CacheEntry::new(vec![1, 2, 3], Some("v2".to_string()));
    let value = serde_json::to_value(&entry).unwrap();

    assert_eq!(value["data"], serde_json::json!([1, 2, 3]));
    assert_eq!(value["version"], "v2");
    assert!(value["timestamp"].is_string());
  }

  #[test]
  fn test_missing_version_defaults_to_none() {
    let raw = r#"{"data": ["a"], "timestamp": "2024-03-01T10:00:00Z"}"#;
    let entry: CacheEntry<Vec<String>> = serde_json::from_str(raw).unwrap();
    assert_eq!(entry.version, None);
    assert_eq!(entry.data, vec!["a".to_string()]);
  }

  #[test]
  fn test_header_ignores_payload_shape() {
    let raw = r#"{"data": {"anything": [1, {"x": null}]}, "timestamp": "2024-03-01T10:00:00Z", "version": "7"}"#;
    let header: HeaderOnly = serde_json::from_str(raw).unwrap();
    let meta = EntryMetadata::from(header);
    assert_eq!(meta.version.as_deref(), Some("7"));
  }

  #[test]
  fn test_age_never_negative() {
    let entry = CacheEntry::new((), None);
    let earlier = entry.timestamp - Duration::seconds(30);
    assert_eq!(entry.age_at(earlier), Duration::zero());
    assert_eq!(
      entry.age_at(entry.timestamp + Duration::seconds(5)),
      Duration::seconds(5)
    );
  }
}
