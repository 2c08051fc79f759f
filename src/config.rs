// src/config.rs

//! Settings for the scanner, read from `config.toml` in the platform config
//! directory and overridden by environment variables.
//!
//! API keys are optional: a missing key means the matching collaborator is
//! "not configured" and its stage proceeds with empty results.

use crate::core::models::ScanOptions;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the configuration directory")]
    NoConfigDir,

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiConfig,
    pub probing: ProbingConfig,
    pub http: HttpConfig,
    pub discovery: DiscoveryConfig,
    /// Stages enabled for new scans.
    pub stages: ScanOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub shodan_api_key: Option<String>,
    pub securitytrails_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbingConfig {
    /// Bound for every connect and banner read, in milliseconds.
    pub timeout_ms: u64,
    /// Maximum concurrent resolutions during subdomain brute force.
    pub brute_force_concurrency: usize,
}

impl Default for ProbingConfig {
    fn default() -> Self {
        Self { timeout_ms: 3000, brute_force_concurrency: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (compatible; VanguardRecon/0.1)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Cap on labels taken from the passive-history source.
    pub max_passive_subdomains: usize,
    pub crtsh_timeout_secs: u64,
    pub scrape_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { max_passive_subdomains: 100, crtsh_timeout_secs: 30, scrape_timeout_secs: 60 }
    }
}

impl Settings {
    /// Loads `config.toml` from the config directory, or defaults when absent.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            debug!(path = %path.display(), "Loading settings.");
            let contents = fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            debug!(path = %path.display(), "No settings file, using defaults.");
            Ok(Self::default())
        }
    }

    /// Loads settings and applies the process environment on top.
    ///
    /// - `SHODAN_API_KEY`
    /// - `SECURITYTRAILS_API_KEY`
    /// - `VANGUARD_PROBE_TIMEOUT_MS`
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut settings = Self::load()?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Applies overrides from any key/value source; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("SHODAN_API_KEY") {
            debug!("Shodan API key taken from the environment.");
            self.api.shodan_api_key = Some(key);
        }
        if let Some(key) = non_empty("SECURITYTRAILS_API_KEY") {
            debug!("SecurityTrails API key taken from the environment.");
            self.api.securitytrails_api_key = Some(key);
        }
        if let Some(ms) = non_empty("VANGUARD_PROBE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            debug!(timeout_ms = ms, "Probe timeout taken from the environment.");
            self.probing.timeout_ms = ms;
        }
    }

    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "vanguard-rs", env!("CARGO_PKG_NAME"))
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probing.timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}
