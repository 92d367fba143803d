//! Application configuration management.
//!
//! Configuration is stored at `~/.config/eventdesk/config.json`; the API base
//! URL can be overridden with `EVENTDESK_API_URL`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{Endpoints, DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::auth::{FileStore, KeyValueStore, KeyringStore, MemoryStore};

/// Application name used for config/cache directory paths and the keychain service
pub const APP_NAME: &str = "eventdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "EVENTDESK_API_URL";

/// Where credentials are persisted between runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub storage: StorageBackend,
    pub request_timeout_secs: Option<u64>,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
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

    /// Base URL: environment first, then config, then the built-in default
    pub fn api_base_url(&self) -> String {
        resolve_base_url(std::env::var(API_URL_ENV).ok(), self.api_base_url.as_deref())
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::from_base(&self.api_base_url())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn credential_backend(&self) -> Result<Arc<dyn KeyValueStore>> {
        Ok(match self.storage {
            StorageBackend::File => Arc::new(FileStore::new(self.cache_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStore::new(APP_NAME)),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        })
    }
}

fn resolve_base_url(env: Option<String>, configured: Option<&str>) -> String {
    env.filter(|url| !url.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
}
