//! File-per-key cache storage.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::StorageError;
use super::key::CacheKey;
use super::storage::KeyValueStore;

const ENTRY_EXTENSION: &str = "json";

/// Stores each entry as `<key>.json` inside a single directory.
///
/// Writes land in a temp file first and are renamed over the target, so a
/// concurrent reader sees either the previous entry or the new one.
pub struct FileStorage {
  dir: PathBuf,
  temp_counter: AtomicU64,
}

impl FileStorage {
  /// Open (creating if needed) the cache directory at `dir`.
  pub fn open(dir: &Path) -> Result<Self, StorageError> {
    fs::create_dir_all(dir).map_err(|e| {
      StorageError::InvalidLocation(format!(
        "failed to create cache directory {}: {}",
        dir.display(),
        e
      ))
    })?;

    if !dir.is_dir() {
      return Err(StorageError::InvalidLocation(format!(
        "{} is not a directory",
        dir.display()
      )));
    }

    Ok(Self {
      dir: dir.to_path_buf(),
      temp_counter: AtomicU64::new(0),
    })
  }

  /// Default location: `<platform cache dir>/paddock`.
  pub fn default_dir() -> Option<PathBuf> {
    dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .map(|p| p.join("paddock"))
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn entry_path(&self, key: &CacheKey) -> Result<PathBuf, StorageError> {
    let name = key.as_str();
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
      return Err(StorageError::InvalidLocation(format!(
        "cache key '{}' is not a valid file name",
        name
      )));
    }
    Ok(self.dir.join(format!("{}.{}", name, ENTRY_EXTENSION)))
  }

  fn temp_path(&self, key: &CacheKey) -> PathBuf {
    let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
    self
      .dir
      .join(format!(".{}.{}.{}.tmp", key, std::process::id(), n))
  }
}

impl KeyValueStore for FileStorage {
  fn name(&self) -> &'static str {
    "file"
  }

  fn save_raw(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), StorageError> {
    let path = self.entry_path(key)?;
    let temp = self.temp_path(key);

    let write = || -> io::Result<()> {
      let mut file = fs::File::create(&temp)?;
      file.write_all(bytes)?;
      file.sync_all()?;
      fs::rename(&temp, &path)
    };

    write().map_err(|e| {
      let _ = fs::remove_file(&temp);
      StorageError::InvalidLocation(format!("failed to write {}: {}", path.display(), e))
    })
  }

  fn load_raw(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StorageError> {
    let path = self.entry_path(key)?;
    match fs::read(&path) {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(StorageError::InvalidLocation(format!(
        "failed to read {}: {}",
        path.display(),
        e
      ))),
    }
  }

  fn remove(&self, key: &CacheKey) -> Result<(), StorageError> {
    let path = self.entry_path(key)?;
    match fs::remove_file(&path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(StorageError::DeleteFailed {
        key: key.to_string(),
        reason: e.to_string(),
      }),
    }
  }

  fn clear_all(&self) -> Result<(), StorageError> {
    let entries = fs::read_dir(&self.dir).map_err(|e| {
      StorageError::InvalidLocation(format!("failed to list {}: {}", self.dir.display(), e))
    })?;

    for entry in entries.filter_map(|e| e.ok()) {
      let path = entry.path();
      if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
        continue;
      }
      match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
          return Err(StorageError::DeleteFailed {
            key: path.display().to_string(),
            reason: e.to_string(),
          })
        }
      }
    }

    Ok(())
  }
}
