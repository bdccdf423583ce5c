//! Stable cache keys derived from resource identifiers.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;
use url::Url;

/// Hex characters of the sha256 digest kept in hashed keys.
const HASH_PREFIX_LEN: usize = 16;

/// Key under which an entry lives in a [`KeyValueStore`](super::storage::KeyValueStore).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

/// How an entity type turns a resource identifier into a [`CacheKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDerivation {
  /// Every resource maps to the same key.
  Fixed(&'static str),
  /// `<namespace>_<year>` when the identifier carries a year, else `<namespace>_<hash>`.
  YearOrHash(&'static str),
}

impl KeyDerivation {
  pub fn derive(self, resource: &str) -> CacheKey {
    match self {
      Self::Fixed(name) => CacheKey::fixed(name),
      Self::YearOrHash(namespace) => CacheKey::year_or_hash(namespace, resource),
    }
  }
}

impl CacheKey {
  pub fn fixed(name: &str) -> Self {
    Self(name.to_string())
  }

  /// Derive a namespaced key, preferring the canonical year segment of `resource`.
  ///
  /// Only path segments count: for an absolute URL the host, port and query
  /// are ignored. Falls back to a truncated sha256 of the full identifier,
  /// accepting the (small) collision risk of the truncation.
  pub fn year_or_hash(namespace: &str, resource: &str) -> Self {
    match extract_year(resource) {
      Some(year) => Self(format!("{}_{}", namespace, year)),
      None => Self(format!("{}_{}", namespace, hash_identifier(resource))),
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for CacheKey {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

fn year_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    // A whole path segment of four digits, optionally with a file extension.
    Regex::new(r"^[0-9]{4}(?:\.[A-Za-z0-9]+)?$").expect("year pattern is valid")
  })
}

/// First path segment of `resource` that is a 4-digit year, if any.
fn extract_year(resource: &str) -> Option<String> {
  let path = match Url::parse(resource) {
    Ok(url) => url.path().to_string(),
    // Relative identifiers: drop any query or fragment.
    Err(_) => resource
      .split(['?', '#'])
      .next()
      .unwrap_or_default()
      .to_string(),
  };

  path
    .split('/')
    .find(|segment| year_pattern().is_match(segment))
    .map(|segment| segment[..4].to_string())
}

fn hash_identifier(resource: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(resource.as_bytes());
  let digest = hex::encode(hasher.finalize());
  digest[..HASH_PREFIX_LEN].to_string()
}
