//! Core types and shared functionality for pantry-sw.
//!
//! This crate provides:
//! - Named cache stores with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheRequest, CacheStorage, CachedResponse, MemoryStorage};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
