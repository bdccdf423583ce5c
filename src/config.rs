use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::cache::{
  FileStorage, InvalidationPolicy, KeyValueStore, StoredVersions, DEFAULT_MAX_VALUE_BYTES,
  DEFAULT_PREFIX,
};

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "PADDOCK_API_URL";

const DEFAULT_API_URL: &str = "https://api.jolpi.ca/ergast/f1/";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL that resource paths are joined onto (always ends with '/')
  #[serde(deserialize_with = "deserialize_base_url")]
  pub base_url: Url,
  pub timeout_secs: u64,
  pub user_agent: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: Url::parse(DEFAULT_API_URL).expect("default API url is valid"),
      timeout_secs: 15,
      user_agent: concat!("paddock/", env!("CARGO_PKG_VERSION")).to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// When false nothing is cached and every fetch goes to the network
  pub enabled: bool,
  /// Directory for file storage (defaults to the platform cache dir)
  pub directory: Option<PathBuf>,
  pub invalidation_minutes: u64,
  /// Version tag written with entries. Entries with another tag are stale.
  pub version: Option<String>,
  /// SQLite file for the preference store fallback
  pub preference_path: Option<PathBuf>,
  pub preference_prefix: String,
  pub max_preference_bytes: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      directory: None,
      invalidation_minutes: 30,
      version: None,
      preference_path: None,
      preference_prefix: DEFAULT_PREFIX.to_string(),
      max_preference_bytes: DEFAULT_MAX_VALUE_BYTES,
    }
  }
}

impl CacheConfig {
  pub fn directory(&self) -> Option<PathBuf> {
    self.directory.clone().or_else(FileStorage::default_dir)
  }

  pub fn preference_path(&self) -> Option<PathBuf> {
    self.preference_path.clone().or_else(|| {
      dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
        .map(|p| p.join("paddock").join("preferences.db"))
    })
  }

  pub fn invalidation_window(&self) -> Duration {
    Duration::from_secs(self.invalidation_minutes.saturating_mul(60))
  }

  /// Policy for entries in `store`: the time window, plus a version check
  /// when a version tag is configured.
  pub fn invalidation_policy(&self, store: &Arc<dyn KeyValueStore>) -> InvalidationPolicy {
    let time = InvalidationPolicy::time_based(self.invalidation_window());
    match &self.version {
      Some(version) => InvalidationPolicy::any(vec![
        time,
        InvalidationPolicy::version_based(
          version.clone(),
          Arc::new(StoredVersions::new(Arc::clone(store))),
        ),
      ]),
      None => time,
    }
  }
}

fn deserialize_base_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let s = String::deserialize(deserializer)?;
  parse_base_url(&s).map_err(serde::de::Error::custom)
}

/// Parse a base URL, adding the trailing slash `Url::join` needs to keep the last segment.
fn parse_base_url(s: &str) -> std::result::Result<Url, url::ParseError> {
  let mut url = Url::parse(s)?;
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  Ok(url)
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./paddock.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/paddock/config.yaml
  ///
  /// Without a file the defaults are used. `PADDOCK_API_URL` overrides the API URL.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    config.with_env_overrides(|name| std::env::var(name).ok())
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("paddock.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("paddock").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml_str(contents: &str) -> Result<Self> {
    // An empty document means "all defaults".
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  /// Apply environment overrides looked up through `lookup`.
  pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    if let Some(url) = lookup(API_URL_ENV) {
      self.api.base_url =
        parse_base_url(&url).map_err(|e| eyre!("Invalid {} '{}': {}", API_URL_ENV, url, e))?;
    }
    Ok(self)
  }
}
