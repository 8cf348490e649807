use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::PollMode;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub polling: PollingConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the API, e.g. "https://example.org/api"
  pub base_url: String,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  15
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
  /// Seconds between polls; 0 disables polling
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
  #[serde(default)]
  pub mode: PollMode,
}

fn default_interval_secs() -> u64 {
  30
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      interval_secs: default_interval_secs(),
      mode: PollMode::default(),
    }
  }
}

impl PollingConfig {
  pub fn interval(&self) -> Duration {
    Duration::from_secs(self.interval_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter when RUST_LOG is not set
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Write logs to daily files in this directory instead of stderr
  pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      directory: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./inbox-sync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/inbox-sync/config.yaml
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/inbox-sync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("inbox-sync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("inbox-sync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.api.base_url.trim().is_empty() {
      return Err(eyre!("api.base_url must not be empty"));
    }
    Ok(config)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks INBOX_SYNC_TOKEN first, then API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("INBOX_SYNC_TOKEN")
      .or_else(|_| std::env::var("API_TOKEN"))
      .map_err(|_| {
        eyre!("API token not found. Set INBOX_SYNC_TOKEN or API_TOKEN environment variable.")
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  base_url: https://example.org/api\n").unwrap();

    assert_eq!(config.api.timeout_secs, 15);
    assert_eq!(config.polling.interval(), Duration::from_secs(30));
    assert_eq!(config.polling.mode, PollMode::UnreadCount);
    assert_eq!(config.log.level, "info");
    assert!(config.log.directory.is_none());
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  base_url: https://example.org/api
  timeout_secs: 5
polling:
  interval_secs: 0
  mode: full
log:
  level: debug
  directory: /tmp/inbox-sync
"#;
    let config = Config::parse(yaml).unwrap();

    assert_eq!(config.api.timeout_secs, 5);
    assert!(config.polling.interval().is_zero());
    assert_eq!(config.polling.mode, PollMode::Full);
    assert_eq!(config.log.level, "debug");
    assert_eq!(
      config.log.directory,
      Some(PathBuf::from("/tmp/inbox-sync"))
    );
  }

  #[test]
  fn test_missing_base_url_is_rejected() {
    assert!(Config::parse("polling:\n  interval_secs: 10\n").is_err());
    assert!(Config::parse("api:\n  base_url: \"  \"\n").is_err());
  }

  #[test]
  fn test_unknown_poll_mode_is_rejected() {
    let yaml = "api:\n  base_url: https://example.org\npolling:\n  mode: sometimes\n";
    assert!(Config::parse(yaml).is_err());
  }

  #[test]
  fn test_explicit_missing_path() {
    let err = Config::load(Some(Path::new("/nonexistent/inbox-sync.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
