//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_version` or `user_agent` is empty
    /// - `origin` is not an absolute http(s) URL
    /// - a `precache_assets` entry or `offline_fallback` is not an absolute path
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is set below 100ms or above 5 minutes
    ///
    /// Returns `ConfigError::Missing` if `precache_assets` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must not be empty".into() });
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") && origin.has_host() => {}
            Ok(origin) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("unsupported origin: {origin}"),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() }),
        }

        if self.precache_assets.is_empty() {
            return Err(ConfigError::Missing {
                field: "precache_assets".into(),
                hint: "Set PANTRY_SW_PRECACHE_ASSETS, e.g. [/,/index.html]".into(),
            });
        }
        if let Some(path) = self.precache_assets.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "precache_assets".into(),
                reason: format!("path must start with '/': {path}"),
            });
        }

        if !self.offline_fallback.starts_with('/') {
            return Err(ConfigError::Invalid { field: "offline_fallback".into(), reason: "must start with '/'".into() });
        }
        if !self.precache_assets.contains(&self.offline_fallback) {
            tracing::warn!(
                offline_fallback = %self.offline_fallback,
                "offline_fallback is not pre-cached; it is only available once fetched online"
            );
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if let Some(timeout_ms) = self.timeout_ms {
            if timeout_ms < 100 {
                return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
            }
            if timeout_ms > 300_000 {
                return Err(ConfigError::Invalid {
                    field: "timeout_ms".into(),
                    reason: "must not exceed 5 minutes (300000ms)".into(),
                });
            }
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}
