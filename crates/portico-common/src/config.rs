use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::expand_home;

const DEFAULT_CONFIG_FILE: &str = ".portico/config.toml";
const DEFAULT_PROVIDERS_FILE: &str = "~/.portico/providers.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PorticoConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_providers_file")]
    pub providers_file: String,
    #[serde(default = "default_cli_binary")]
    pub cli_binary: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
    #[serde(default = "default_update_timeout_ms")]
    pub update_timeout_ms: u64,
    #[serde(default)]
    pub fallback: bool,
}

impl Default for PorticoConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            providers_file: default_providers_file(),
            cli_binary: default_cli_binary(),
            cache_ttl_secs: default_cache_ttl_secs(),
            http_timeout_ms: default_http_timeout_ms(),
            health_timeout_ms: default_health_timeout_ms(),
            update_timeout_ms: default_update_timeout_ms(),
            fallback: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_providers_file() -> String {
    DEFAULT_PROVIDERS_FILE.to_string()
}

fn default_cli_binary() -> String {
    "claude".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_http_timeout_ms() -> u64 {
    2_000
}

fn default_health_timeout_ms() -> u64 {
    15_000
}

fn default_update_timeout_ms() -> u64 {
    600_000
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize default config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("config has invalid value: {0}")]
    ValidationFailed(String),
}

fn resolve_path_from(override_path: Option<String>) -> PathBuf {
    if let Some(path) = override_path {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_CONFIG_FILE)
}

impl PorticoConfig {
    pub fn resolve_path() -> PathBuf {
        resolve_path_from(env::var("PORTICO_CONFIG").ok())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, raw).map_err(|source| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    pub fn load_or_create_at(path: PathBuf) -> Result<(Self, PathBuf, bool), ConfigError> {
        if path.exists() {
            let cfg = Self::load(&path)?;
            return Ok((cfg, path, false));
        }

        let cfg = Self::default();
        cfg.save(&path)?;
        Ok((cfg, path, true))
    }

    pub fn load_or_create() -> Result<(Self, PathBuf, bool), ConfigError> {
        Self::load_or_create_at(Self::resolve_path())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "log_level cannot be empty".to_string(),
            ));
        }
        if self.cli_binary.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "cli_binary cannot be empty".to_string(),
            ));
        }
        if self.providers_file.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "providers_file cannot be empty".to_string(),
            ));
        }
        for (name, value) in [
            ("http_timeout_ms", self.http_timeout_ms),
            ("health_timeout_ms", self.health_timeout_ms),
            ("update_timeout_ms", self.update_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    pub fn providers_path(&self) -> PathBuf {
        expand_home(&self.providers_file)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_millis(self.update_timeout_ms)
    }
}
