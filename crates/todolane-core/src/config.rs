//! Application configuration management.
//!
//! Configuration covers the API location, where tokens are kept, and the
//! session monitor's timing. It is stored at
//! `~/.config/todolane/config.json`; `TODOLANE_API_URL` or
//! `TODOLANE_API_HOST` in the environment override the API location.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileBackend, KeyringBackend, MemoryBackend, TokenStore};
use crate::monitor::MonitorConfig;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "todolane";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Full API base URL override
pub const ENV_API_URL: &str = "TODOLANE_API_URL";

/// Host-only override; the API listens on port 8000
pub const ENV_API_HOST: &str = "TODOLANE_API_HOST";

/// Port used when only a host is configured
const DEFAULT_API_PORT: u16 = 8000;

/// Where the token store keeps its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackendKind {
    #[default]
    Keyring,
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub token_backend: TokenBackendKind,
    pub request_timeout_secs: u64,
    pub liveness_interval_secs: u64,
    pub tick_interval_ms: u64,
    pub warning_threshold_secs: u64,
    pub log_dir: Option<PathBuf>,
    pub last_username: Option<String>,
    #[serde(skip)]
    env_api_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: format!("http://localhost:{}", DEFAULT_API_PORT),
            token_backend: TokenBackendKind::default(),
            request_timeout_secs: crate::api::gateway::DEFAULT_REQUEST_TIMEOUT_SECS,
            liveness_interval_secs: crate::monitor::DEFAULT_LIVENESS_INTERVAL_SECS,
            tick_interval_ms: crate::monitor::DEFAULT_TICK_INTERVAL_MS,
            warning_threshold_secs: crate::monitor::DEFAULT_WARNING_THRESHOLD_SECS,
            log_dir: None,
            last_username: None,
            env_api_url: None,
        }
    }
}

impl Config {
    /// Load from disk (defaults when absent) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_API_HOST).ok(),
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Environment values win over the file but are never written back.
    pub fn apply_env(&mut self, api_url: Option<String>, api_host: Option<String>) {
        let api_url = api_url.filter(|v| !v.trim().is_empty());
        let api_host = api_host.filter(|v| !v.trim().is_empty());
        self.env_api_url = api_url
            .map(|url| url.trim().to_string())
            .or_else(|| {
                api_host.map(|host| format!("http://{}:{}", host.trim(), DEFAULT_API_PORT))
            });
    }

    pub fn api_base_url(&self) -> String {
        self.env_api_url
            .clone()
            .unwrap_or_else(|| self.api_base_url.clone())
            .trim_end_matches('/')
            .to_string()
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            liveness_interval: Duration::from_secs(self.liveness_interval_secs.max(1)),
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            warning_threshold: Duration::from_secs(self.warning_threshold_secs),
        }
    }

    /// Open the configured token store.
    pub fn token_store(&self) -> Result<Arc<TokenStore>> {
        let store = match self.token_backend {
            TokenBackendKind::Keyring => TokenStore::new(KeyringBackend::default()),
            TokenBackendKind::File => TokenStore::new(FileBackend::new(self.cache_dir()?)),
            TokenBackendKind::Memory => TokenStore::new(MemoryBackend::default()),
        };
        Ok(Arc::new(store))
    }
}
