use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cache::{CacheOptions, MergeStrategy};
use crate::schema::{ResourceSchema, SchemaRegistry};

/// Transport configuration stored in the cache state.
///
/// The cache never interprets this; the transport reads it for every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub base_url: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub headers: BTreeMap<String, String>,
  /// Anything else a custom transport wants to carry
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl ApiConfig {
  pub fn with_base_url(base_url: impl Into<String>) -> Self {
    Self {
      base_url: Some(base_url.into()),
      ..Self::default()
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.insert(name.into(), value.into());
    self
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub merge_strategy: MergeStrategy,
  /// Seconds a settled query stays fresh for cache-first reads
  #[serde(default = "default_stale_time_secs")]
  pub stale_time_secs: i64,
}

fn default_stale_time_secs() -> i64 {
  300
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      merge_strategy: MergeStrategy::default(),
      stale_time_secs: default_stale_time_secs(),
    }
  }
}

impl CacheConfig {
  pub fn options(&self) -> Result<CacheOptions> {
    let stale_time = Duration::try_seconds(self.stale_time_secs)
      .ok_or_else(|| eyre!("cache.stale_time_secs is out of range: {}", self.stale_time_secs))?;

    Ok(CacheOptions {
      merge_strategy: self.merge_strategy,
      stale_time,
    })
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub schemas: Vec<ResourceSchema>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jac.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jac/config.yaml
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
        "No configuration file found. Create one at ~/.config/jac/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("jac.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jac").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// The API configuration with the bearer token from the environment applied.
  pub fn api_config(&self) -> ApiConfig {
    match Self::get_api_token() {
      Some(token) => self
        .api
        .clone()
        .with_header("Authorization", format!("Bearer {}", token)),
      None => self.api.clone(),
    }
  }

  pub fn registry(&self) -> SchemaRegistry {
    self.schemas.iter().cloned().collect()
  }

  /// Get the API token from the environment, if set.
  ///
  /// Checks JAC_API_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("JAC_API_TOKEN").ok().filter(|t| !t.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const CONFIG: &str = r#"
api:
  base_url: "https://blog.example.com/api/"
  headers:
    X-Client: jac
cache:
  merge_strategy: deep
  stale_time_secs: 60
schemas:
  - type: people
    relationships:
      comments: { resource: comments, is_array: true }
  - type: comments
    relationships:
      author: { resource: people }
"#;

  #[test]
  fn test_parse_config() {
    let config = Config::parse(CONFIG).unwrap();

    assert_eq!(config.api.base_url.as_deref(), Some("https://blog.example.com/api/"));
    assert_eq!(config.api.headers["X-Client"], "jac");
    let options = config.cache.options().unwrap();
    assert_eq!(options.merge_strategy, MergeStrategy::Deep);
    assert_eq!(options.stale_time, Duration::seconds(60));

    let registry = config.registry();
    assert!(registry.contains("people"));
    assert_eq!(registry.back_reference("comments", "people").unwrap().key, "author");
  }

  #[test]
  fn test_defaults() {
    let config = Config::parse("api: {}").unwrap();
    assert_eq!(config.cache.options().unwrap(), CacheOptions::default());
    assert!(config.schemas.is_empty());
  }

  #[test]
  fn test_out_of_range_stale_time() {
    let config = Config::parse("api: {}\ncache:\n  stale_time_secs: 9223372036854775807\n").unwrap();
    let err = config.cache.options().unwrap_err();
    assert!(err.to_string().contains("out of range"));
  }

  #[test]
  fn test_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/jac.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
