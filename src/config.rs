use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{
  Endpoint, HttpMethod, CATEGORIES_URL, DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT, LISTINGS_URL,
};
use crate::cache::DEFAULT_MEMORY_CAPACITY;

/// Environment variable overriding `cache.directory`.
pub const CACHE_DIR_ENV: &str = "CLASSIFIEDS_CACHE_DIR";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub endpoints: EndpointsConfig,
  pub cache: CacheConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
  pub categories: String,
  pub listings: String,
  /// Retries after the first attempt
  pub retry_count: u32,
  pub timeout_secs: u64,
}

impl Default for EndpointsConfig {
  fn default() -> Self {
    Self {
      categories: CATEGORIES_URL.to_string(),
      listings: LISTINGS_URL.to_string(),
      retry_count: DEFAULT_RETRY_COUNT,
      timeout_secs: DEFAULT_TIMEOUT.as_secs(),
    }
  }
}

impl EndpointsConfig {
  pub fn categories_endpoint(&self) -> Result<Endpoint> {
    self.endpoint(&self.categories)
  }

  pub fn listings_endpoint(&self) -> Result<Endpoint> {
    self.endpoint(&self.listings)
  }

  fn endpoint(&self, url: &str) -> Result<Endpoint> {
    Endpoint::new(
      url,
      HttpMethod::Get,
      self.retry_count,
      Duration::from_secs(self.timeout_secs),
    )
    .map_err(|e| eyre!("Invalid endpoint in config: {}", e))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// When false only the in-process tier is used
  pub enabled: bool,
  /// Directory holding the durable cache (default: platform cache dir)
  pub directory: Option<PathBuf>,
  /// Fast-tier entries, at least 1
  pub memory_capacity: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      directory: None,
      memory_capacity: DEFAULT_MEMORY_CAPACITY,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Filter directive, overridden by RUST_LOG
  pub level: String,
  pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
    }
  }
}

impl LogConfig {
  /// Directory for the log file, if one can be determined.
  pub fn resolved_directory(&self) -> Option<PathBuf> {
    self
      .directory
      .clone()
      .or_else(|| dirs::data_local_dir().map(|d| d.join("classifieds")))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path (if provided)
  /// 2. ./classifieds.yaml
  /// 3. $XDG_CONFIG_HOME/classifieds/config.yaml
  ///
  /// Defaults are used when no file is found. `CLASSIFIEDS_CACHE_DIR` is
  /// applied last.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };
    config.apply_env_overrides(|key| std::env::var(key).ok());

    Ok(config)
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.cache.memory_capacity == 0 {
      return Err(eyre!("cache.memory_capacity must be at least 1"));
    }
    Ok(())
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("classifieds.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("classifieds").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
    config
      .validate()
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  fn apply_env_overrides<F>(&mut self, lookup: F)
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
      self.cache.directory = Some(PathBuf::from(dir));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_defaults() {
    let config = Config::default();

    assert_eq!(config.endpoints.categories, CATEGORIES_URL);
    assert_eq!(config.endpoints.listings, LISTINGS_URL);
    assert_eq!(config.endpoints.retry_count, 2);
    assert_eq!(config.endpoints.timeout_secs, 30);
    assert!(config.cache.enabled);
    assert_eq!(config.cache.directory, None);
    assert_eq!(config.cache.memory_capacity, 256);
    assert_eq!(config.log.level, "info");
  }

  #[test]
  fn test_empty_yaml_is_default() {
    let config = Config::from_yaml("{}").unwrap();
    assert_eq!(config.endpoints.categories, CATEGORIES_URL);
    assert!(config.cache.enabled);
  }

  #[test]
  fn test_partial_yaml_overrides() {
    let config = Config::from_yaml(
      r#"
endpoints:
  listings: https://example.com/listing.json
  retry_count: 5
cache:
  enabled: false
  directory: /tmp/classifieds-cache
log:
  level: debug
"#,
    )
    .unwrap();

    assert_eq!(config.endpoints.categories, CATEGORIES_URL);
    assert_eq!(config.endpoints.listings, "https://example.com/listing.json");
    assert_eq!(config.endpoints.retry_count, 5);
    assert_eq!(config.endpoints.timeout_secs, 30);
    assert!(!config.cache.enabled);
    assert_eq!(
      config.cache.directory,
      Some(PathBuf::from("/tmp/classifieds-cache"))
    );
    assert_eq!(config.cache.memory_capacity, 256);
    assert_eq!(config.log.level, "debug");
  }

  #[test]
  fn test_endpoints_from_config() {
    let config = Config::from_yaml(
      r#"
endpoints:
  retry_count: 4
  timeout_secs: 5
"#,
    )
    .unwrap();

    let listings = config.endpoints.listings_endpoint().unwrap();
    assert_eq!(listings.url().as_str(), LISTINGS_URL);
    assert_eq!(listings.retry_count(), 4);
    assert_eq!(listings.timeout(), Duration::from_secs(5));
    assert_eq!(listings.method(), HttpMethod::Get);
  }

  #[test]
  fn test_invalid_endpoint_url() {
    let config = Config::from_yaml("endpoints:\n  categories: \"not a url\"\n").unwrap();
    assert!(config.endpoints.categories_endpoint().is_err());
  }

  #[test]
  fn test_zero_timeout_rejected() {
    let config = Config::from_yaml("endpoints:\n  timeout_secs: 0\n").unwrap();
    assert!(config.endpoints.listings_endpoint().is_err());
  }

  #[test]
  fn test_zero_memory_capacity_rejected() {
    assert!(Config::from_yaml("cache:\n  memory_capacity: 0\n").is_err());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "cache:\n  memory_capacity: 0").unwrap();
    assert!(Config::load(Some(file.path())).is_err());
  }

  #[test]
  fn test_malformed_yaml() {
    assert!(Config::from_yaml("cache: [").is_err());
  }

  #[test]
  fn test_cache_dir_env_override() {
    let mut config = Config::default();
    config.apply_env_overrides(|key| {
      (key == CACHE_DIR_ENV).then(|| "/var/cache/ads".to_string())
    });
    assert_eq!(config.cache.directory, Some(PathBuf::from("/var/cache/ads")));

    let mut config = Config::default();
    config.apply_env_overrides(|_| Some(String::new()));
    assert_eq!(config.cache.directory, None);
  }

  #[test]
  fn test_load_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "cache:\n  memory_capacity: 16").unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.cache.memory_capacity, 16);
  }

  #[test]
  fn test_load_missing_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load(Some(&dir.path().join("missing.yaml")));
    assert!(result.is_err());
  }
}
