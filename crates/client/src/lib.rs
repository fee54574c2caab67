//! Client code for pantry-sw.
//!
//! This crate provides the network fetch layer and the cache controller that
//! sits between pages and the network.

pub mod controller;
pub mod fetch;

pub use controller::{
    CacheController, ClientMessage, ControllerConfig, FetchOutcome, LifecycleScope, Responded, ResponseSource,
};

pub use fetch::{FetchConfig, Fetcher, HttpFetcher};
