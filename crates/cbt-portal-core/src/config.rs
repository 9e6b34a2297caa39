//! Application configuration management.
//!
//! Configuration is stored at `~/.config/cbt-portal/config.json` and
//! may be overridden by `CBT_*` environment variables (a `.env` file is
//! loaded by the binary before the overrides are applied).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/data directory paths
const APP_NAME: &str = "cbt-portal";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_API_VERSION: &str = "v1";

/// Per-call deadline. Matches the backend gateway timeout.
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Where the persisted session record lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "keyring" => Ok(StorageKind::Keyring),
            "memory" => Ok(StorageKind::Memory),
            other => Err(anyhow::anyhow!("Unknown session storage kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub api_version: String,
    pub timeout_ms: u64,
    /// Log every request/response/error at debug level
    pub debug: bool,
    pub session_storage: StorageKind,
    /// Share one in-flight refresh between concurrent 401s
    pub dedupe_refresh: bool,
    pub last_identifier: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            debug: false,
            session_storage: StorageKind::default(),
            dedupe_refresh: true,
            last_identifier: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Load the config file, then apply `CBT_*` overrides from the process environment.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_overrides(|key| std::env::var(key).ok());
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

    /// Apply overrides from a variable lookup. Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CBT_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(version) = lookup("CBT_API_VERSION") {
            self.api_version = version;
        }
        if let Some(raw) = lookup("CBT_API_TIMEOUT_MS") {
            match raw.parse() {
                Ok(ms) => self.timeout_ms = ms,
                Err(_) => warn!(value = %raw, "Ignoring invalid CBT_API_TIMEOUT_MS"),
            }
        }
        if let Some(raw) = lookup("CBT_DEBUG") {
            self.debug = parse_flag(&raw);
        }
        if let Some(raw) = lookup("CBT_SESSION_STORAGE") {
            match raw.parse() {
                Ok(kind) => self.session_storage = kind,
                Err(e) => warn!(error = %e, "Ignoring invalid CBT_SESSION_STORAGE"),
            }
        }
        if let Some(raw) = lookup("CBT_DEDUPE_REFRESH") {
            self.dedupe_refresh = parse_flag(&raw);
        }
    }

    /// Versioned API root, e.g. `http://localhost:8000/api/v1`
    pub fn base_url(&self) -> String {
        format!(
            "{}/api/{}",
            self.api_base_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }

    /// Full URL for an endpoint path such as `/courses`
    pub fn api_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url(), endpoint)
        } else {
            format!("{}/{}", self.base_url(), endpoint)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session file
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
