//! Cache storage abstraction.
//!
//! Mirrors the browser `CacheStorage` surface the controller relies on: named
//! stores that map request identities to response snapshots. Stores are created
//! implicitly by writes, so `open` is only needed to make an empty store
//! enumerable.

use async_trait::async_trait;

use super::types::{CacheRequest, CachedResponse};
use crate::Error;

/// Named, persistent request -> response stores.
///
/// Implementations must be safe to share between concurrently running
/// handlers. No cross-call locking is implied: concurrent `put`s for the same
/// key resolve last-write-wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the store if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Whether a store with this name exists.
    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// All store names, in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a store and every entry in it.
    ///
    /// Returns false if no such store existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Look up a request in a store. A missing store is a miss.
    async fn match_request(&self, name: &str, request: &CacheRequest) -> Result<Option<CachedResponse>, Error>;

    /// Store a response for a request, replacing any existing entry.
    async fn put(&self, name: &str, request: &CacheRequest, response: &CachedResponse) -> Result<(), Error>;

    /// Store a batch of entries atomically: either all are written or none are.
    async fn put_all(&self, name: &str, entries: Vec<(CacheRequest, CachedResponse)>) -> Result<(), Error>;

    /// Requests currently held by a store, in insertion order.
    async fn requests(&self, name: &str) -> Result<Vec<CacheRequest>, Error>;
}
