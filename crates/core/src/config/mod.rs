//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PANTRY_SW_*)
//! 2. TOML config file (if PANTRY_SW_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Paths fetched into the versioned store at install time.
pub const DEFAULT_PRECACHE_ASSETS: [&str; 4] = ["/", "/index.html", "/manifest.json", "/JP_logo.png"];

/// Default cap on a passively cached response body (5MB).
pub const DEFAULT_MAX_BYTES: usize = 5_242_880;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PANTRY_SW_*)
/// 2. TOML config file (if PANTRY_SW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via PANTRY_SW_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Name of the cache store owned by this controller version.
    ///
    /// Set via PANTRY_SW_CACHE_VERSION environment variable. Bumping it makes
    /// the next activation purge every store with a different name.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin that relative request paths and manifest entries resolve against.
    ///
    /// Set via PANTRY_SW_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Bootstrap assets pre-cached on install, in order.
    ///
    /// Set via PANTRY_SW_PRECACHE_ASSETS environment variable (`[/a,/b]`).
    #[serde(default = "default_precache_assets")]
    pub precache_assets: Vec<String>,

    /// Document served from cache when the network fails and the request misses.
    ///
    /// Set via PANTRY_SW_OFFLINE_FALLBACK environment variable.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,

    /// Whether install signals skip-waiting on its own.
    ///
    /// Set via PANTRY_SW_SKIP_WAITING_ON_INSTALL environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PANTRY_SW_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Largest response body the fetch handler copies into a store.
    ///
    /// Bigger responses still reach the page; they are just not cached.
    ///
    /// Set via PANTRY_SW_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Optional HTTP request timeout in milliseconds.
    ///
    /// Unset by default: the cache fallback only triggers on outright network
    /// failure, never on slowness. Set via PANTRY_SW_TIMEOUT_MS.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pantry-sw-cache.sqlite")
}

fn default_cache_version() -> String {
    "jemspantry-v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_precache_assets() -> Vec<String> {
    DEFAULT_PRECACHE_ASSETS.iter().map(|p| p.to_string()).collect()
}

fn default_offline_fallback() -> String {
    "/index.html".into()
}

fn default_user_agent() -> String {
    "pantry-sw/0.1".into()
}

fn default_max_bytes() -> usize {
    DEFAULT_MAX_BYTES
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            precache_assets: default_precache_assets(),
            offline_fallback: default_offline_fallback(),
            skip_waiting_on_install: true,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PANTRY_SW_`
    /// 2. TOML file from `PANTRY_SW_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PANTRY_SW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PANTRY_SW_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
