//! Cache invalidation policies.
//!
//! A policy answers one question: given the key of an entry and when it was
//! written, should the entry be treated as stale? Every variant is a pure
//! function of its inputs except [`InvalidationPolicy::VersionBased`], which
//! reads the stored version tag through a [`VersionSource`].

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::key::CacheKey;

/// Default freshness window for cached collections.
pub const DEFAULT_INVALIDATION_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Lookup of the version tag stored alongside a cache entry.
pub trait VersionSource: Send + Sync + fmt::Debug {
  /// The stored tag for `key`, or `None` if there is none.
  fn stored_version(&self, key: &CacheKey) -> Option<String>;
}

/// Mutable in-memory version tags.
#[derive(Debug, Default)]
pub struct VersionTags {
  tags: RwLock<HashMap<CacheKey, String>>,
}

impl VersionTags {
  pub fn new() -> Self {
    Self::default()
  }

  // Poisoning is ignored: every write is a single insert or remove.
  pub fn set(&self, key: CacheKey, version: impl Into<String>) {
    let mut tags = self.tags.write().unwrap_or_else(|e| e.into_inner());
    tags.insert(key, version.into());
  }

  pub fn clear(&self, key: &CacheKey) {
    let mut tags = self.tags.write().unwrap_or_else(|e| e.into_inner());
    tags.remove(key);
  }
}

impl VersionSource for VersionTags {
  fn stored_version(&self, key: &CacheKey) -> Option<String> {
    let tags = self.tags.read().unwrap_or_else(|e| e.into_inner());
    tags.get(key).cloned()
  }
}

/// How a composite policy combines its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
  /// Invalidate if any member does.
  Any,
  /// Invalidate only if every member does.
  All,
}

/// Decides whether a cached entry is stale.
#[derive(Debug, Clone)]
pub enum InvalidationPolicy {
  /// Stale once older than `interval`. `Duration::MAX` never expires.
  TimeBased { interval: Duration },
  /// Always stale.
  Always,
  /// Stale when the stored version tag differs from `current_version`.
  ///
  /// Impure: reads mutable state through `source` on every call.
  VersionBased {
    current_version: String,
    source: Arc<dyn VersionSource>,
  },
  /// A constant answer.
  Manual(bool),
  Composite {
    policies: Vec<InvalidationPolicy>,
    mode: CompositeMode,
  },
}

impl Default for InvalidationPolicy {
  fn default() -> Self {
    Self::time_based(DEFAULT_INVALIDATION_WINDOW)
  }
}

impl InvalidationPolicy {
  pub fn time_based(interval: Duration) -> Self {
    Self::TimeBased { interval }
  }

  pub fn never() -> Self {
    Self::TimeBased {
      interval: Duration::MAX,
    }
  }

  pub fn always() -> Self {
    Self::Always
  }

  pub fn version_based(current_version: impl Into<String>, source: Arc<dyn VersionSource>) -> Self {
    Self::VersionBased {
      current_version: current_version.into(),
      source,
    }
  }

  pub fn manual(invalidate: bool) -> Self {
    Self::Manual(invalidate)
  }

  pub fn any(policies: Vec<InvalidationPolicy>) -> Self {
    Self::Composite {
      policies,
      mode: CompositeMode::Any,
    }
  }

  pub fn all(policies: Vec<InvalidationPolicy>) -> Self {
    Self::Composite {
      policies,
      mode: CompositeMode::All,
    }
  }

  /// Whether the entry under `key`, written at `cached_at`, is stale now.
  pub fn should_invalidate(&self, key: &CacheKey, cached_at: DateTime<Utc>) -> bool {
    self.should_invalidate_at(key, cached_at, Utc::now())
  }

  /// Like [`should_invalidate`](Self::should_invalidate) with an explicit clock.
  pub fn should_invalidate_at(
    &self,
    key: &CacheKey,
    cached_at: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> bool {
    match self {
      Self::TimeBased { interval } => {
        // Entries from the future are never stale.
        let Ok(age) = (now - cached_at).to_std() else {
          return false;
        };
        age > *interval
      }
      Self::Always => true,
      Self::VersionBased {
        current_version,
        source,
      } => source.stored_version(key).as_deref() != Some(current_version.as_str()),
      Self::Manual(invalidate) => *invalidate,
      Self::Composite { policies, mode } => match mode {
        CompositeMode::Any => policies
          .iter()
          .any(|p| p.should_invalidate_at(key, cached_at, now)),
        CompositeMode::All => policies
          .iter()
          .all(|p| p.should_invalidate_at(key, cached_at, now)),
      },
    }
  }
}
