//! Scripted network and storage for host and tool tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pantry_client::Fetcher;
use pantry_core::{CacheRequest, CacheStorage, CachedResponse, Error, MemoryStorage};

pub const ORIGIN: &str = "http://localhost:8080";

/// Known URLs answer with a fixed status and body; anything else fails like
/// an unreachable host.
#[derive(Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, (u16, String)>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl StubFetcher {
    /// A fetcher that serves the default bootstrap manifest.
    pub fn serving_manifest() -> Arc<Self> {
        let fetcher = Self::default();
        for path in ["/", "/index.html", "/manifest.json", "/JP_logo.png"] {
            fetcher.route(path, 200, &format!("asset {path}"));
        }
        Arc::new(fetcher)
    }

    pub fn route(&self, path: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(format!("{ORIGIN}{path}"), (status, body.to_string()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Requests seen so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
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

/// Memory storage whose `delete` fails for chosen store names.
#[derive(Default)]
pub struct LockedStorage {
    pub inner: MemoryStorage,
    locked: Mutex<HashSet<String>>,
}

impl LockedStorage {
    pub fn lock(&self, name: &str) {
        self.locked.lock().unwrap().insert(name.to_string());
    }
}

#[async_trait]
impl CacheStorage for LockedStorage {
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
        if self.locked.lock().unwrap().contains(name) {
            return Err(Error::CorruptEntry(format!("cannot delete {name}: database is locked")));
        }
        self.inner.delete(name).await
    }

    async fn match_request(&self, name: &str, request: &CacheRequest) -> Result<Option<CachedResponse>, Error> {
        self.inner.match_request(name, request).await
    }

    async fn put(&self, name: &str, request: &CacheRequest, response: &CachedResponse) -> Result<(), Error> {
        self.inner.put(name, request, response).await
    }

    async fn put_all(&self, name: &str, entries: Vec<(CacheRequest, CachedResponse)>) -> Result<(), Error> {
        self.inner.put_all(name, entries).await
    }

    async fn requests(&self, name: &str) -> Result<Vec<CacheRequest>, Error> {
        self.inner.requests(name).await
    }
}

/// Decode the JSON text content a tool returned.
pub fn tool_output<T: serde::de::DeserializeOwned>(result: &rmcp::model::CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
