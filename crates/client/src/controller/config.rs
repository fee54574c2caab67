//! Per-version controller settings.

use pantry_core::config::{DEFAULT_MAX_BYTES, DEFAULT_PRECACHE_ASSETS};
use pantry_core::{AppConfig, CacheRequest, Error};
use url::Url;

use crate::fetch::resolve;

/// Everything one controller version needs, threaded in explicitly so tests
/// (and updates) can run several versions side by side.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Name of the cache store this version owns.
    pub version: String,
    /// Origin that manifest paths resolve against.
    pub origin: Url,
    /// Bootstrap assets, in order.
    pub precache_assets: Vec<String>,
    /// Root document served when offline and the request misses.
    pub offline_fallback: String,
    /// Whether install signals skip-waiting by itself.
    pub skip_waiting_on_install: bool,
    /// Largest network body copied into the store by the fetch handler.
    pub max_entry_bytes: usize,
}

impl ControllerConfig {
    /// A config with the default manifest and offline document.
    pub fn new(version: impl Into<String>, origin: Url) -> Self {
        Self {
            version: version.into(),
            origin,
            precache_assets: DEFAULT_PRECACHE_ASSETS.iter().map(|p| p.to_string()).collect(),
            offline_fallback: "/index.html".to_string(),
            skip_waiting_on_install: true,
            max_entry_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {}", config.origin, e)))?;
        Ok(Self {
            version: config.cache_version.clone(),
            origin,
            precache_assets: config.precache_assets.clone(),
            offline_fallback: config.offline_fallback.clone(),
            skip_waiting_on_install: config.skip_waiting_on_install,
            max_entry_bytes: config.max_bytes,
        })
    }

    /// Same settings under a different version name.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self { version: version.into(), ..self.clone() }
    }

    /// Resolve a path or URL against the origin into a GET request.
    pub fn request_for(&self, target: &str) -> Result<CacheRequest, Error> {
        let url = resolve(&self.origin, target).map_err(|e| Error::InvalidUrl(format!("{target}: {e}")))?;
        Ok(CacheRequest::get(url.as_str()))
    }

    /// GET requests for every manifest entry, in manifest order.
    pub fn precache_requests(&self) -> Result<Vec<CacheRequest>, Error> {
        self.precache_assets.iter().map(|path| self.request_for(path)).collect()
    }

    pub fn offline_request(&self) -> Result<CacheRequest, Error> {
        self.request_for(&self.offline_fallback)
    }
}
