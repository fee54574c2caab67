//! The cache controller: install, activate, fetch and message handlers.
//!
//! ### Lifecycle
//! - `install` opens the versioned store and pre-caches the manifest. It never
//!   fails: a broken manifest is logged and installation proceeds.
//! - `activate` deletes every store not named after this version and claims
//!   open clients.
//!
//! ### Fetch
//! - GET only; other methods pass through untouched.
//! - Network first. A 200 response is copied into the store by a detached
//!   task that the response never waits on. Bodies over `max_entry_bytes`
//!   still reach the page but are not copied.
//! - On network failure: cached entry for the request, else the cached offline
//!   document, else no response.
//!
//! The controller holds no phase state. Hosts decide when each handler runs
//! and await the futures returned by `install` and `activate` before moving
//! the lifecycle on.

mod config;
mod message;

pub use config::ControllerConfig;
pub use message::ClientMessage;

use std::sync::Arc;

use futures_util::future::{join_all, try_join_all};
use pantry_core::{CacheRequest, CacheStorage, CachedResponse, Error};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::fetch::Fetcher;

/// Lifecycle side channel a host hands to the handlers.
pub trait LifecycleScope: Send + Sync {
    /// Ask the host to activate this version without waiting for clients to close.
    fn skip_waiting(&self);

    /// Ask the host to route already-open clients through this version.
    fn claim_clients(&self);
}

/// Where a fetch response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflineFallback,
    /// Not intercepted; the host fetched it directly.
    Passthrough,
    /// Offline with nothing cached.
    None,
}

/// Result of the fetch handler.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The request was not intercepted.
    Passthrough,
    /// The controller produced the response (or decided there is none).
    Respond(Responded),
}

/// An intercepted request's answer.
#[derive(Debug)]
pub struct Responded {
    pub response: Option<CachedResponse>,
    pub source: ResponseSource,
    /// Detached cache write, if one was started. Dropping it does not cancel it.
    pub cache_write: Option<JoinHandle<()>>,
}

impl FetchOutcome {
    fn respond(response: Option<CachedResponse>, source: ResponseSource) -> Self {
        FetchOutcome::Respond(Responded { response, source, cache_write: None })
    }
}

/// One version of the cache controller.
pub struct CacheController {
    config: ControllerConfig,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
}

impl CacheController {
    pub fn new(config: ControllerConfig, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { config, storage, fetcher }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Install handler.
    ///
    /// Returns the number of manifest entries cached; 0 when pre-caching failed.
    pub async fn install(&self, scope: &dyn LifecycleScope) -> usize {
        tracing::info!(version = %self.config.version, "installing cache controller");

        let cached = match self.precache().await {
            Ok(count) => {
                tracing::info!(version = %self.config.version, count, "cached bootstrap assets");
                count
            }
            Err(e) => {
                tracing::error!(version = %self.config.version, error = %e, "failed to cache bootstrap assets");
                0
            }
        };

        if self.config.skip_waiting_on_install {
            scope.skip_waiting();
        }

        cached
    }

    /// Open the store and add every manifest entry in one batch.
    ///
    /// Mirrors `Cache.addAll`: one failed fetch or non-2xx response aborts the
    /// whole batch and nothing from it is written.
    async fn precache(&self) -> Result<usize, Error> {
        self.storage.open(&self.config.version).await?;

        let requests = self.config.precache_requests()?;
        let entries = try_join_all(requests.into_iter().map(|request| async move {
            let response = self.fetcher.fetch(&request).await?;
            if !response.is_ok() {
                return Err(Error::HttpError(format!("{} returned status {}", request.url, response.status)));
            }
            Ok((request, response))
        }))
        .await?;

        let count = entries.len();
        self.storage.put_all(&self.config.version, entries).await?;
        Ok(count)
    }

    /// Activate handler.
    ///
    /// Deletes every store not named after this version and claims clients.
    /// Every deletion is attempted; the first failure is returned. Clients are
    /// claimed either way.
    pub async fn activate(&self, scope: &dyn LifecycleScope) -> Result<Vec<String>, Error> {
        tracing::info!(version = %self.config.version, "activating cache controller");

        let purge = self.purge_stale_stores().await;
        scope.claim_clients();
        purge
    }

    async fn purge_stale_stores(&self) -> Result<Vec<String>, Error> {
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| *name != self.config.version)
            .collect();

        let results = join_all(stale.iter().map(|name| async move {
            tracing::info!(store = %name, "deleting old cache");
            self.storage.delete(name).await
        }))
        .await;

        let mut deleted = Vec::with_capacity(stale.len());
        let mut first_error = None;
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(true) => deleted.push(name),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(store = %name, error = %e, "failed to delete old cache");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    /// Fetch handler.
    pub async fn handle_fetch(&self, request: &CacheRequest) -> FetchOutcome {
        if !request.is_get() {
            return FetchOutcome::Passthrough;
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                let cache_write = self.should_cache(&response).then(|| self.spawn_cache_write(request, &response));
                FetchOutcome::Respond(Responded {
                    response: Some(response),
                    source: ResponseSource::Network,
                    cache_write,
                })
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failed, trying cache");
                self.fallback(request).await
            }
        }
    }

    /// Only a 200 within the entry size cap is copied into the store.
    fn should_cache(&self, response: &CachedResponse) -> bool {
        if response.status != 200 {
            return false;
        }
        if response.body.len() > self.config.max_entry_bytes {
            tracing::debug!(
                url = %response.url,
                bytes = response.body.len(),
                limit = self.config.max_entry_bytes,
                "response too large to cache"
            );
            return false;
        }
        true
    }

    /// Copy a response into the current store on a detached task.
    ///
    /// Must be called from within a tokio runtime.
    fn spawn_cache_write(&self, request: &CacheRequest, response: &CachedResponse) -> JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        let version = self.config.version.clone();
        let request = request.clone();
        let response = response.clone();

        tokio::spawn(async move {
            if let Err(e) = storage.put(&version, &request, &response).await {
                tracing::debug!(url = %request.url, error = %e, "passive cache write failed");
            }
        })
    }

    async fn fallback(&self, request: &CacheRequest) -> FetchOutcome {
        if let Some(cached) = self.lookup(request).await {
            tracing::info!(url = %request.url, "serving from cache");
            return FetchOutcome::respond(Some(cached), ResponseSource::Cache);
        }

        let offline = match self.config.offline_request() {
            Ok(offline) => offline,
            Err(e) => {
                tracing::warn!(error = %e, "offline fallback is not a valid URL");
                return FetchOutcome::respond(None, ResponseSource::None);
            }
        };

        match self.lookup(&offline).await {
            Some(page) => FetchOutcome::respond(Some(page), ResponseSource::OfflineFallback),
            None => FetchOutcome::respond(None, ResponseSource::None),
        }
    }

    /// Lookup in the current store; storage errors count as a miss.
    async fn lookup(&self, request: &CacheRequest) -> Option<CachedResponse> {
        match self.storage.match_request(&self.config.version, request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Message handler. Returns whether the payload was recognized.
    pub fn handle_message(&self, scope: &dyn LifecycleScope, payload: &serde_json::Value) -> bool {
        match ClientMessage::parse(payload) {
            Some(ClientMessage::SkipWaiting) => {
                tracing::debug!(version = %self.config.version, "skip waiting requested by client");
                scope.skip_waiting();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pantry_core::MemoryStorage;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use url::Url;

    /// Scripted network: known URLs answer with a status, everything else fails.
    #[derive(Default)]
    struct StubFetcher {
        routes: Mutex<HashMap<String, (u16, String)>>,
        offline: AtomicBool,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn route(&self, url: &str, status: u16, body: &str) {
            self.routes.lock().unwrap().insert(url.to_string(), (status, body.to_string()));
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Network("offline".into()));
            }
            match self.routes.lock().unwrap().get(&request.url) {
                Some((status, body)) => Ok(CachedResponse::new(&request.url, *status, body.as_str())),
                None => Err(Error::Network(format!("no route to {}", request.url))),
            }
        }
    }

    /// Memory storage with switchable faults.
    #[derive(Default)]
    struct FaultyStorage {
        inner: MemoryStorage,
        fail_put: AtomicBool,
        fail_match: AtomicBool,
        undeletable: Mutex<HashSet<String>>,
    }

    impl FaultyStorage {
        fn fault(what: &str) -> Error {
            Error::CorruptEntry(format!("{what} failed: disk I/O error"))
        }
    }

    #[async_trait]
    impl CacheStorage for FaultyStorage {
        async fn open(&self, name: &str) -> Result<(), Error> {
            self.inner.open(name).await
        }

        async fn has(&self, name: &str) -> Result<bool, Error> {
            self.inner.has(name).await
        }

        async fn keys(&self) -> Result<Vec<String>, Error> {
            self.inner.keys().await
        }

        async fn delete(&self, name: &str) -> Result<bool, Error> {
            if self.undeletable.lock().unwrap().contains(name) {
                return Err(Self::fault("delete"));
            }
            self.inner.delete(name).await
        }

        async fn match_request(&self, name: &str, request: &CacheRequest) -> Result<Option<CachedResponse>, Error> {
            if self.fail_match.load(Ordering::SeqCst) {
                return Err(Self::fault("match"));
            }
            self.inner.match_request(name, request).await
        }

        async fn put(&self, name: &str, request: &CacheRequest, response: &CachedResponse) -> Result<(), Error> {
            if self.fail_put.load(Ordering::SeqCst) {
                return Err(Self::fault("put"));
            }
            self.inner.put(name, request, response).await
        }

        async fn put_all(&self, name: &str, entries: Vec<(CacheRequest, CachedResponse)>) -> Result<(), Error> {
            self.inner.put_all(name, entries).await
        }

        async fn requests(&self, name: &str) -> Result<Vec<CacheRequest>, Error> {
            self.inner.requests(name).await
        }
    }

    #[derive(Default)]
    struct RecordingScope {
        skip_waiting: AtomicBool,
        claimed: AtomicBool,
    }

    impl LifecycleScope for RecordingScope {
        fn skip_waiting(&self) {
            self.skip_waiting.store(true, Ordering::SeqCst);
        }

        fn claim_clients(&self) {
            self.claimed.store(true, Ordering::SeqCst);
        }
    }

    const ORIGIN: &str = "http://localhost:8080";

    fn url(path: &str) -> String {
        format!("{ORIGIN}{path}")
    }

    fn controller(version: &str, storage: &MemoryStorage, fetcher: &Arc<StubFetcher>) -> CacheController {
        let config = ControllerConfig::new(version, Url::parse(ORIGIN).unwrap());
        CacheController::new(config, Arc::new(storage.clone()), fetcher.clone())
    }

    fn faulty_controller(storage: &Arc<FaultyStorage>, fetcher: &Arc<StubFetcher>) -> CacheController {
        let config = ControllerConfig::new("v1", Url::parse(ORIGIN).unwrap());
        CacheController::new(config, storage.clone(), fetcher.clone())
    }

    fn serve_manifest(fetcher: &StubFetcher) {
        fetcher.route(&url("/"), 200, "<html>root</html>");
        fetcher.route(&url("/index.html"), 200, "<html>index</html>");
        fetcher.route(&url("/manifest.json"), 200, "{}");
        fetcher.route(&url("/JP_logo.png"), 200, "png");
    }

    fn responded(outcome: FetchOutcome) -> Responded {
        match outcome {
            FetchOutcome::Respond(responded) => responded,
            FetchOutcome::Passthrough => panic!("expected a response override"),
        }
    }

    #[tokio::test]
    async fn test_install_precaches_manifest_and_skips_waiting() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        serve_manifest(&fetcher);
        let scope = RecordingScope::default();

        let cached = controller("v1", &storage, &fetcher).install(&scope).await;

        assert_eq!(cached, 4);
        assert!(scope.skip_waiting.load(Ordering::SeqCst));
        assert_eq!(storage.requests("v1").await.unwrap().len(), 4);
        let index = storage.match_request("v1", &CacheRequest::get(url("/index.html"))).await.unwrap();
        assert_eq!(index.unwrap().text(), "<html>index</html>");
    }

    #[tokio::test]
    async fn test_install_survives_missing_asset() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route(&url("/"), 200, "root");
        fetcher.route(&url("/index.html"), 200, "index");
        // /manifest.json and /JP_logo.png are unreachable.
        let scope = RecordingScope::default();

        let cached = controller("v1", &storage, &fetcher).install(&scope).await;

        assert_eq!(cached, 0);
        assert!(storage.has("v1").await.unwrap());
        assert!(storage.requests("v1").await.unwrap().is_empty());
        assert!(scope.skip_waiting.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_install_survives_total_outage() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.set_offline(true);
        let scope = RecordingScope::default();

        let cached = controller("v1", &storage, &fetcher).install(&scope).await;

        assert_eq!(cached, 0);
        assert_eq!(storage.keys().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_install_rejects_non_ok_asset_batch() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        serve_manifest(&fetcher);
        fetcher.route(&url("/JP_logo.png"), 404, "missing");

        let cached = controller("v1", &storage, &fetcher).install(&RecordingScope::default()).await;

        assert_eq!(cached, 0);
        assert!(storage.requests("v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_without_skip_waiting() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        serve_manifest(&fetcher);
        let mut config = ControllerConfig::new("v1", Url::parse(ORIGIN).unwrap());
        config.skip_waiting_on_install = false;
        let controller = CacheController::new(config, Arc::new(storage.clone()), fetcher.clone());
        let scope = RecordingScope::default();

        controller.install(&scope).await;

        assert!(!scope.skip_waiting.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_activate_purges_stale_versions() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        let root = CacheRequest::get(url("/"));
        let root_v1 = CachedResponse::new(url("/"), 200, "v1 root");
        storage.put("v0", &root, &CachedResponse::new(url("/"), 200, "v0 root")).await.unwrap();
        storage.put("v1", &root, &root_v1).await.unwrap();
        storage.open("scratch").await.unwrap();
        let scope = RecordingScope::default();

        let deleted = controller("v1", &storage, &fetcher).activate(&scope).await.unwrap();

        assert_eq!(deleted, vec!["v0".to_string(), "scratch".to_string()]);
        assert_eq!(storage.keys().await.unwrap(), vec!["v1".to_string()]);
        assert_eq!(storage.match_request("v1", &root).await.unwrap(), Some(root_v1));
        assert!(scope.claimed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_repeated_cycles_keep_single_store() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        serve_manifest(&fetcher);

        for _ in 0..3 {
            let controller = controller("v1", &storage, &fetcher);
            let scope = RecordingScope::default();
            controller.install(&scope).await;
            controller.activate(&scope).await.unwrap();
        }

        assert_eq!(storage.keys().await.unwrap(), vec!["v1".to_string()]);
        assert_eq!(storage.requests("v1").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_non_get_passes_through() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        let controller = controller("v1", &storage, &fetcher);

        for method in ["POST", "PUT", "DELETE", "HEAD", "PATCH"] {
            let outcome = controller.handle_fetch(&CacheRequest::new(method, url("/api/items"))).await;
            assert!(matches!(outcome, FetchOutcome::Passthrough));
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_network_200_is_cached() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route(&url("/recipes"), 200, "fresh");
        let controller = controller("v1", &storage, &fetcher);
        let request = CacheRequest::get(url("/recipes"));

        let responded = responded(controller.handle_fetch(&request).await);
        assert_eq!(responded.source, ResponseSource::Network);
        assert_eq!(responded.response.as_ref().unwrap().text(), "fresh");

        responded.cache_write.expect("200 responses start a cache write").await.unwrap();
        let cached = storage.match_request("v1", &request).await.unwrap().unwrap();
        assert_eq!(cached.status, 200);
        assert_eq!(cached.text(), "fresh");
    }

    #[tokio::test]
    async fn test_network_200_overwrites_previous_entry() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        let request = CacheRequest::get(url("/recipes"));
        storage.put("v1", &request, &CachedResponse::new(url("/recipes"), 200, "stale")).await.unwrap();
        fetcher.route(&url("/recipes"), 200, "fresh");

        let responded = responded(controller("v1", &storage, &fetcher).handle_fetch(&request).await);
        responded.cache_write.unwrap().await.unwrap();

        assert_eq!(storage.match_request("v1", &request).await.unwrap().unwrap().text(), "fresh");
    }

    #[tokio::test]
    async fn test_non_200_passed_through_uncached() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route(&url("/missing"), 404, "not found");
        fetcher.route(&url("/created"), 201, "created");
        let controller = controller("v1", &storage, &fetcher);

        for (path, status) in [("/missing", 404), ("/created", 201)] {
            let request = CacheRequest::get(url(path));
            let responded = responded(controller.handle_fetch(&request).await);
            assert_eq!(responded.source, ResponseSource::Network);
            assert_eq!(responded.response.unwrap().status, status);
            assert!(responded.cache_write.is_none());
            assert!(storage.match_request("v1", &request).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_offline_serves_cached_entry() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route(&url("/recipes"), 200, "online copy");
        let controller = controller("v1", &storage, &fetcher);
        let request = CacheRequest::get(url("/recipes"));

        let first = responded(controller.handle_fetch(&request).await);
        first.cache_write.unwrap().await.unwrap();

        fetcher.set_offline(true);
        let second = responded(controller.handle_fetch(&request).await);
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.response.unwrap().text(), "online copy");
        assert!(second.cache_write.is_none());
    }

    #[tokio::test]
    async fn test_offline_miss_falls_back_to_root_document() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        storage
            .put("v1", &CacheRequest::get(url("/index.html")), &CachedResponse::new(url("/index.html"), 200, "shell"))
            .await
            .unwrap();
        fetcher.set_offline(true);

        let outcome = controller("v1", &storage, &fetcher).handle_fetch(&CacheRequest::get(url("/never-seen"))).await;
        let responded = responded(outcome);

        assert_eq!(responded.source, ResponseSource::OfflineFallback);
        assert_eq!(responded.response.unwrap().text(), "shell");
    }

    #[tokio::test]
    async fn test_offline_miss_without_root_document_is_empty() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.set_offline(true);

        let outcome = controller("v1", &storage, &fetcher).handle_fetch(&CacheRequest::get(url("/never-seen"))).await;
        let responded = responded(outcome);

        assert_eq!(responded.source, ResponseSource::None);
        assert!(responded.response.is_none());
    }

    #[tokio::test]
    async fn test_fallback_ignores_other_versions() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        let request = CacheRequest::get(url("/recipes"));
        storage.put("v0", &request, &CachedResponse::new(url("/recipes"), 200, "old")).await.unwrap();
        fetcher.set_offline(true);

        let responded = responded(controller("v1", &storage, &fetcher).handle_fetch(&request).await);

        assert_eq!(responded.source, ResponseSource::None);
    }

    #[tokio::test]
    async fn test_message_skip_waiting() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        let controller = controller("v1", &storage, &fetcher);

        let scope = RecordingScope::default();
        assert!(controller.handle_message(&scope, &json!({ "type": "SKIP_WAITING" })));
        assert!(scope.skip_waiting.load(Ordering::SeqCst));

        let scope = RecordingScope::default();
        assert!(!controller.handle_message(&scope, &json!({ "type": "RELOAD" })));
        assert!(!controller.handle_message(&scope, &json!(null)));
        assert!(!controller.handle_message(&scope, &json!(42)));
        assert!(!scope.skip_waiting.load(Ordering::SeqCst));
        assert!(!scope.claimed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_oversize_200_reaches_page_uncached() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        let shell = CacheRequest::get(url("/index.html"));
        storage.put("v1", &shell, &CachedResponse::new(url("/index.html"), 200, "shell")).await.unwrap();
        let big = "x".repeat(64);
        fetcher.route(&url("/big.png"), 200, &big);
        let mut config = ControllerConfig::new("v1", Url::parse(ORIGIN).unwrap());
        config.max_entry_bytes = 16;
        let controller = CacheController::new(config, Arc::new(storage.clone()), fetcher.clone());
        let request = CacheRequest::get(url("/big.png"));

        let responded = responded(controller.handle_fetch(&request).await);

        assert_eq!(responded.source, ResponseSource::Network);
        let response = responded.response.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.len(), 64);
        assert!(responded.cache_write.is_none());
        assert!(storage.match_request("v1", &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_body_at_cap_is_cached() {
        let storage = MemoryStorage::new();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route(&url("/logo.png"), 200, &"x".repeat(16));
        let mut config = ControllerConfig::new("v1", Url::parse(ORIGIN).unwrap());
        config.max_entry_bytes = 16;
        let controller = CacheController::new(config, Arc::new(storage.clone()), fetcher.clone());
        let request = CacheRequest::get(url("/logo.png"));

        let responded = responded(controller.handle_fetch(&request).await);
        responded.cache_write.expect("body within the cap is cached").await.unwrap();

        assert!(storage.match_request("v1", &request).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_activate_attempts_every_deletion_and_claims() {
        let storage = Arc::new(FaultyStorage::default());
        for name in ["v0", "locked", "scratch", "v1"] {
            storage.open(name).await.unwrap();
        }
        storage.undeletable.lock().unwrap().insert("locked".to_string());
        let fetcher = Arc::new(StubFetcher::default());
        let scope = RecordingScope::default();

        let result = faulty_controller(&storage, &fetcher).activate(&scope).await;

        assert!(matches!(result, Err(Error::CorruptEntry(_))));
        assert_eq!(storage.keys().await.unwrap(), vec!["locked".to_string(), "v1".to_string()]);
        assert!(scope.claimed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_cache_write_still_returns_network_response() {
        let storage = Arc::new(FaultyStorage::default());
        storage.fail_put.store(true, Ordering::SeqCst);
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route(&url("/recipes"), 200, "fresh");
        let request = CacheRequest::get(url("/recipes"));

        let responded = responded(faulty_controller(&storage, &fetcher).handle_fetch(&request).await);

        assert_eq!(responded.source, ResponseSource::Network);
        assert_eq!(responded.response.unwrap().text(), "fresh");
        responded.cache_write.expect("write is still attempted").await.unwrap();
        assert!(storage.inner.match_request("v1", &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_error_counts_as_miss() {
        let storage = Arc::new(FaultyStorage::default());
        let shell = CacheRequest::get(url("/index.html"));
        storage.put("v1", &shell, &CachedResponse::new(url("/index.html"), 200, "shell")).await.unwrap();
        storage.fail_match.store(true, Ordering::SeqCst);
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.set_offline(true);

        let outcome = faulty_controller(&storage, &fetcher).handle_fetch(&CacheRequest::get(url("/recipes"))).await;
        let responded = responded(outcome);

        assert_eq!(responded.source, ResponseSource::None);
        assert!(responded.response.is_none());
    }
}
