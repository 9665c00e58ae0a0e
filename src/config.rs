use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::constants::constants;
use crate::viewport::DeviceOverride;

const APP_NAME: &str = "fxreel";
const PREFS_FILE: &str = "prefs.toml";

/// User preferences persisted between runs. Every field is optional so an
/// old or hand-edited file still loads.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub theme_name: Option<String>,
  /// `auto`, `mobile` or `desktop`.
  pub device: Option<String>,
  /// Lifetime of a resolved thumbnail; `0` keeps results for the whole session.
  pub thumbnail_ttl_secs: Option<u64>,
}

pub fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", APP_NAME)
}

/// Directory for the rolling log file. Falls back to the system temp dir.
pub fn log_dir() -> PathBuf {
  project_dirs().map_or_else(|| std::env::temp_dir().join(APP_NAME), |dirs| dirs.data_dir().join("logs"))
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = project_dirs() {
      let config_file = proj_dirs.config_dir().join(PREFS_FILE);
      if let Ok(content) = std::fs::read_to_string(config_file) {
        return Self::parse(&content);
      }
    }
    Self::default()
  }

  /// Parse prefs, falling back to defaults on malformed input.
  pub fn parse(content: &str) -> Self {
    toml::from_str(content).unwrap_or_else(|e| {
      warn!(err = %e, "config: ignoring malformed {}", PREFS_FILE);
      Self::default()
    })
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = project_dirs() {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join(PREFS_FILE);
        if let Ok(content) = toml::to_string(self) {
          let _ = std::fs::write(config_file, content);
        }
      }
    }
  }

  pub fn device_override(&self) -> DeviceOverride {
    self.device.as_deref().map(DeviceOverride::from_config).unwrap_or_default()
  }

  pub fn thumbnail_ttl(&self) -> Option<Duration> {
    match self.thumbnail_ttl_secs.unwrap_or(constants().thumbnail_ttl_secs) {
      0 => None,
      secs => Some(Duration::from_secs(secs)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_full_prefs() {
    let config = Config::parse("theme_name = \"Humo\"\ndevice = \"mobile\"\nthumbnail_ttl_secs = 60\n");
    assert_eq!(config.theme_name.as_deref(), Some("Humo"));
    assert_eq!(config.device_override(), DeviceOverride::Mobile);
    assert_eq!(config.thumbnail_ttl(), Some(Duration::from_secs(60)));
  }

  #[test]
  fn malformed_prefs_fall_back_to_defaults() {
    assert_eq!(Config::parse("theme_name = ["), Config::default());
  }

  #[test]
  fn defaults() {
    let config = Config::default();
    assert_eq!(config.device_override(), DeviceOverride::Auto);
    assert_eq!(config.thumbnail_ttl(), Some(Duration::from_secs(constants().thumbnail_ttl_secs)));
  }

  #[test]
  fn zero_ttl_means_session_lifetime() {
    let config = Config { thumbnail_ttl_secs: Some(0), ..Config::default() };
    assert_eq!(config.thumbnail_ttl(), None);
  }

  #[test]
  fn roundtrip_through_toml() {
    let config = Config { theme_name: Some("Papel".into()), device: Some("desktop".into()), thumbnail_ttl_secs: None };
    let text = toml::to_string(&config).unwrap();
    assert_eq!(Config::parse(&text), config);
  }
}
