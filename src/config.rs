//! Runtime configuration. The value is resolved exactly once in `main`
//! (defaults, then the TOML file, then the environment, then CLI flags) and
//! handed to the API client and both screens, so every screen talks to the
//! same host.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

/// Folder name used beneath the user's home directory for config and logs.
const DATA_DIR_NAME: &str = ".partitura-browser";
const CONFIG_FILE_NAME: &str = "config.toml";
/// Environment override for the API root.
pub const API_URL_ENV: &str = "PARTITURAS_API_URL";

/// Where the image download action sends the bundled sheet image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadTarget {
    /// Gallery when the user has a picture directory, browser otherwise.
    #[default]
    Auto,
    /// Save into the download directory and hand the file to the system opener.
    Browser,
    /// Save into the picture directory.
    Gallery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_recommendation_count")]
    pub recommendation_count: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub download_target: DownloadTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_api_base() -> String {
    "http://localhost:5000".to_string()
}
fn default_recommendation_count() -> usize {
    5
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            recommendation_count: default_recommendation_count(),
            request_timeout_secs: default_request_timeout_secs(),
            download_target: DownloadTarget::default(),
            download_dir: None,
            log_level: default_log_level(),
        }
    }
}

/// Values that win over the config file, typically gathered from the
/// environment and the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub env_api_base: Option<String>,
    pub cli_api_base: Option<String>,
    pub recommendation_count: Option<usize>,
    pub log_level: Option<String>,
}

impl Config {
    /// Read the config file at `path`, falling back to defaults when it does
    /// not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.api_base = config.api_base.trim().to_string();
        Ok(config)
    }

    /// Layer environment and CLI values on top of the file. Blank strings are
    /// treated as absent.
    pub fn apply(mut self, overrides: Overrides) -> Self {
        let api_base = overrides
            .cli_api_base
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                overrides
                    .env_api_base
                    .filter(|value| !value.trim().is_empty())
            });
        if let Some(api_base) = api_base {
            self.api_base = api_base.trim().to_string();
        }
        if let Some(count) = overrides.recommendation_count {
            self.recommendation_count = count;
        }
        if let Some(level) = overrides.log_level.filter(|value| !value.trim().is_empty()) {
            self.log_level = level;
        }
        self
    }

    /// Reject values the client cannot work with. The base is checked as-is,
    /// so surrounding whitespace is an error rather than silently passed on.
    pub fn validate(&self) -> Result<()> {
        let base = self.api_base.as_str();
        if base.trim() != base {
            return Err(anyhow!("api_base must not contain surrounding whitespace"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(anyhow!(
                "api_base must start with http:// or https:// (got '{base}')"
            ));
        }
        if self.recommendation_count == 0 {
            return Err(anyhow!("recommendation_count must be at least 1"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(data_dir()?.join(CONFIG_FILE_NAME))
    }
}

/// Resolve `~/.partitura-browser`.
pub fn data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpSheetClient;

    #[test]
    fn test_config_serde_defaults_from_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.recommendation_count, 5);
        assert_eq!(config.download_target, DownloadTarget::Auto);
    }

    #[test]
    fn test_config_partial_file_keeps_other_defaults() {
        let toml_str = r#"
api_base = "http://sheets.example:8081"
download_target = "gallery"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_base, "http://sheets.example:8081");
        assert_eq!(config.download_target, DownloadTarget::Gallery);
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "recommendation_count = \"many\"").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_padded_api_base_from_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_base = \" http://127.0.0.1:1 \"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base, "http://127.0.0.1:1");
        assert!(config.validate().is_ok());

        let client = HttpSheetClient::new(&config.api_base, config.request_timeout()).unwrap();
        assert_eq!(client.endpoint("partituras"), "http://127.0.0.1:1/partituras");
    }

    #[test]
    fn test_validate_rejects_padded_api_base() {
        let config = Config {
            api_base: " http://localhost:5000".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_beats_env_beats_file() {
        let file = Config {
            api_base: "http://file:1".to_string(),
            ..Config::default()
        };

        let only_env = file.clone().apply(Overrides {
            env_api_base: Some("http://env:2".to_string()),
            ..Overrides::default()
        });
        assert_eq!(only_env.api_base, "http://env:2");

        let both = file.clone().apply(Overrides {
            env_api_base: Some("http://env:2".to_string()),
            cli_api_base: Some("http://cli:3".to_string()),
            ..Overrides::default()
        });
        assert_eq!(both.api_base, "http://cli:3");

        let blank_env = file.apply(Overrides {
            env_api_base: Some("   ".to_string()),
            ..Overrides::default()
        });
        assert_eq!(blank_env.api_base, "http://file:1");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        config.api_base = "localhost:5000".to_string();
        assert!(config.validate().is_err());
        config.api_base = default_api_base();
        config.recommendation_count = 0;
        assert!(config.validate().is_err());
    }
}
