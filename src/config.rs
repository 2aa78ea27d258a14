//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$SENDRIA_CONFIG` (environment variable)
//! 2. `~/.config/sendria/config.toml` (Linux/macOS)
//!    `%APPDATA%\sendria\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! `$SENDRIA_URL`, when set, replaces `server.base_url` whatever the source.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_BASE_URL;
use crate::parser::mime::DecodeOptions;
use crate::store::DEFAULT_CACHE_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Where the Sendria server lives and how to poll it.
    pub server: ServerConfig,
    /// MIME decomposition options.
    pub decode: DecodeOptions,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Number of decomposed messages kept in the LRU cache.
    pub cache_size: usize,
}

/// Server connection and polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the Sendria web interface.
    pub base_url: String,
    /// Page size used when listing messages.
    pub per_page: u32,
    /// Delay between two polls while waiting for a message.
    pub poll_interval_ms: u64,
    /// How long a wait may take before it fails.
    pub wait_timeout_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            per_page: 100,
            poll_interval_ms: 50,
            wait_timeout_ms: 3000,
        }
    }
}

impl Config {
    /// Replace `server.base_url` with `url` when it is set and non-blank.
    pub fn with_base_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.server.base_url = url.trim().to_string();
        }
        self
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
/// `$SENDRIA_URL` is applied last.
pub fn load_config() -> Config {
    read_config_file()
        .unwrap_or_default()
        .with_base_url_override(std::env::var("SENDRIA_URL").ok())
}

fn read_config_file() -> Option<Config> {
    let path = config_file_path()?;
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                Some(cfg)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                None
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            None
        }
    }
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("SENDRIA_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("sendria").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sendria")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("sendria.log")
}
