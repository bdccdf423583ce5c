//! Tracing setup for hosts embedding the cache.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `paddock=debug`).
pub const LOG_ENV: &str = "PADDOCK_LOG";

const LOG_FILE_PREFIX: &str = "paddock.log";

/// Install a global subscriber writing to a daily-rotated file in `log_dir`.
///
/// Keep the returned guard alive for as long as logs should be flushed.
pub fn init(log_dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter())
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_init_creates_log_dir_and_rejects_second_subscriber() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");

    let first = init(&log_dir);
    assert!(log_dir.is_dir());

    // Only one global subscriber can be installed per process.
    if first.is_ok() {
      assert!(init(&log_dir).is_err());
    }
  }
}
