//! In-memory [`CacheStorage`] for tests and ephemeral hosts.
//!
//! Uses a Vec of named stores behind a tokio RwLock so enumeration keeps
//! creation order without an extra index.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::storage::CacheStorage;
use super::types::{CacheRequest, CachedResponse};
use crate::Error;

#[derive(Debug, Default)]
struct MemoryStore {
    name: String,
    entries: Vec<(CacheRequest, CachedResponse)>,
}

impl MemoryStore {
    fn upsert(&mut self, request: CacheRequest, response: CachedResponse) {
        match self.entries.iter_mut().find(|(r, _)| *r == request) {
            Some(entry) => entry.1 = response,
            None => self.entries.push((request, response)),
        }
    }
}

/// Process-local cache storage. Cloning shares the same stores.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    stores: Arc<RwLock<Vec<MemoryStore>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn store_mut<'a>(stores: &'a mut Vec<MemoryStore>, name: &str) -> &'a mut MemoryStore {
    match stores.iter().position(|s| s.name == name) {
        Some(idx) => &mut stores[idx],
        None => {
            stores.push(MemoryStore { name: name.to_string(), entries: Vec::new() });
            let last = stores.len() - 1;
            &mut stores[last]
        }
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        store_mut(&mut stores, name);
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.stores.read().await.iter().any(|s| s.name == name))
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.stores.read().await.iter().map(|s| s.name.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut stores = self.stores.write().await;
        let before = stores.len();
        stores.retain(|s| s.name != name);
        Ok(stores.len() != before)
    }

    async fn match_request(&self, name: &str, request: &CacheRequest) -> Result<Option<CachedResponse>, Error> {
        let stores = self.stores.read().await;
        Ok(stores
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.entries.iter().find(|(r, _)| r == request))
            .map(|(_, response)| response.clone()))
    }

    async fn put(&self, name: &str, request: &CacheRequest, response: &CachedResponse) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        store_mut(&mut stores, name).upsert(request.clone(), response.clone());
        Ok(())
    }

    async fn put_all(&self, name: &str, entries: Vec<(CacheRequest, CachedResponse)>) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        let store = store_mut(&mut stores, name);
        for (request, response) in entries {
            store.upsert(request, response);
        }
        Ok(())
    }

    async fn requests(&self, name: &str) -> Result<Vec<CacheRequest>, Error> {
        let stores = self.stores.read().await;
        Ok(stores
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.entries.iter().map(|(r, _)| r.clone()).collect())
            .unwrap_or_default())
    }
}
