//! Store configuration, deserialised from the host application's settings.

use std::path::PathBuf;

use serde::Deserialize;

/// Path value that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// Database file, or `:memory:`.
  #[serde(default = "default_path")]
  pub path:            PathBuf,
  /// How long a connection waits on a locked database before giving up with
  /// a retryable error.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,
}

impl StoreConfig {
  pub fn file(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), ..Self::default() }
  }

  pub fn in_memory() -> Self { Self::default() }

  pub fn is_in_memory(&self) -> bool { self.path.as_os_str() == IN_MEMORY }
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self { path: default_path(), busy_timeout_ms: default_busy_timeout_ms() }
  }
}

fn default_path() -> PathBuf { PathBuf::from(IN_MEMORY) }

fn default_busy_timeout_ms() -> u64 { 5_000 }
