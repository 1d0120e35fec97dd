use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::preferences::{Language, Theme};

pub const CONFIG_VERSION: u64 = 1;

pub const ENV_API_BASE_URL: &str = "TODOPLUS_API_BASE_URL";
pub const ENV_DEBUG: &str = "TODOPLUS_DEBUG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write config: {0}")]
    Write(#[from] std::io::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("config version {found} is newer than this build supports")]
    Version { found: u64 },
    #[error("no config directory on this system")]
    NoConfigDir,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("todoplus")
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: u64,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub page_size: u32,
    pub theme: Theme,
    pub language: Language,
    pub debug_logging: bool,
    /// Where the session and preference files live.
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 10,
            page_size: 20,
            theme: Theme::Light,
            language: Language::ZhCn,
            debug_logging: false,
            data_dir: default_data_dir(),
        }
    }
}

impl AppConfig {
    /// `<config dir>/todoplus/config.json`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("todoplus").join("config.json"))
    }

    /// Load from the default location with environment overrides applied.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Defaults when `path` does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::Version { found: config.version });
        }
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|u| !u.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(flag) = lookup(ENV_DEBUG) {
            self.debug_logging = matches!(flag.as_str(), "1" | "true" | "yes");
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
