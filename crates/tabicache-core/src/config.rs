//! Application configuration management.
//!
//! This module handles loading and saving the configuration: where the
//! app's pages are served from, the sync source, the exchange rate
//! endpoint and the data directory.
//!
//! Configuration is stored at `~/.config/tabicache/config.json`. Selected
//! fields can be overridden with `TABICACHE_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "tabicache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_EXCHANGE_RATE_URL: &str = "https://open.er-api.com/v6/latest/USD";
const DEFAULT_SYNC_KEY_NAME: &str = "sync-api-key";
const DEFAULT_WARM_BATCH_DELAY_MS: u64 = 100;

pub const ENV_APP_URL: &str = "TABICACHE_APP_URL";
pub const ENV_SYNC_URL: &str = "TABICACHE_SYNC_URL";
pub const ENV_SYNC_KEY: &str = "TABICACHE_SYNC_KEY";
pub const ENV_RATE_URL: &str = "TABICACHE_RATE_URL";
pub const ENV_DATA_DIR: &str = "TABICACHE_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin the offline page cache is warmed against.
    pub app_base_url: String,
    /// PostgREST-style sync source; sync is disabled when unset.
    pub sync_url: Option<String>,
    /// Keychain account holding the sync API key.
    pub sync_key_name: String,
    pub exchange_rate_url: String,
    pub data_dir: Option<PathBuf>,
    pub warm_batch_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_base_url: DEFAULT_APP_BASE_URL.to_string(),
            sync_url: None,
            sync_key_name: DEFAULT_SYNC_KEY_NAME.to_string(),
            exchange_rate_url: DEFAULT_EXCHANGE_RATE_URL.to_string(),
            data_dir: None,
            warm_batch_delay_ms: DEFAULT_WARM_BATCH_DELAY_MS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `TABICACHE_*` overrides from a variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_APP_URL) {
            self.app_base_url = url;
        }
        if let Some(url) = lookup(ENV_SYNC_URL) {
            self.sync_url = Some(url);
        }
        if let Some(url) = lookup(ENV_RATE_URL) {
            self.exchange_rate_url = url;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn warm_batch_delay(&self) -> Duration {
        Duration::from_millis(self.warm_batch_delay_ms)
    }
}
