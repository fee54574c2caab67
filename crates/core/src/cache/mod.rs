//! Versioned request/response cache stores.
//!
//! This module provides named cache stores keyed by request identity, with
//! two interchangeable backends behind the [`CacheStorage`] trait:
//!
//! - SQLite via tokio-rusqlite, persistent across restarts (WAL mode,
//!   automatic schema migrations)
//! - In-memory, for tests and throwaway hosts

pub mod connection;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod storage;
pub mod stores;
pub mod types;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryStorage;
pub use storage::CacheStorage;
pub use types::{CacheRequest, CachedResponse};
