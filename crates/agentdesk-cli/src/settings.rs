//! Layered configuration: `agentdesk.toml`, then `AGENTDESK_*` variables.
//!
//! Nested keys use a double underscore in the environment, so
//! `AGENTDESK_STORE__PATH=/var/lib/agentdesk.db` overrides `store.path`.

use std::path::{Path, PathBuf};

use agentdesk_store_sqlite::StoreConfig;
use anyhow::Context as _;
use serde::Deserialize;

const DEFAULT_STORE_PATH: &str = "agentdesk.db";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  pub store: StoreConfig,
}

impl Settings {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let raw = config::Config::builder()
      .set_default("store.path", DEFAULT_STORE_PATH)?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("AGENTDESK").separator("__"))
      .build()
      .context("failed to read config file")?;

    let mut settings: Settings = raw
      .try_deserialize()
      .context("failed to deserialise Settings")?;
    settings.store.path = expand_tilde(&settings.store.path);
    Ok(settings)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let settings = Settings::load(Path::new("/nonexistent/agentdesk.toml")).unwrap();
    assert_eq!(settings.store.path, PathBuf::from(DEFAULT_STORE_PATH));
    assert_eq!(settings.store.busy_timeout_ms, 5_000);
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/agentdesk.db")),
      PathBuf::from(home).join("agentdesk.db")
    );
    assert_eq!(expand_tilde(Path::new("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
  }
}
