//! Hosting runtime for cache controllers.
//!
//! Plays the role a browser plays for a service worker: it drives the
//! install -> waiting -> active lifecycle, awaits the work each lifecycle
//! handler returns before advancing, routes fetches to the active controller
//! and messages to the waiting (or active) one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pantry_client::{CacheController, ControllerConfig, FetchOutcome, Fetcher, LifecycleScope, ResponseSource};
use pantry_core::{CacheRequest, CacheStorage, CachedResponse, Error};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Lifecycle signals raised by one controller's handlers.
#[derive(Debug, Default)]
struct Signals {
    skip_waiting: AtomicBool,
    claim_clients: AtomicBool,
}

impl LifecycleScope for Signals {
    fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    fn claim_clients(&self) {
        self.claim_clients.store(true, Ordering::SeqCst);
    }
}

/// A controller plus the signals its handlers raised.
struct Worker {
    controller: Arc<CacheController>,
    signals: Signals,
}

#[derive(Default)]
struct HostState {
    active: Option<Worker>,
    waiting: Option<Worker>,
    clients_claimed: bool,
}

/// Where a registered version ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Active,
    Waiting,
}

/// Outcome of [`ServiceHost::register`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Registration {
    pub version: String,
    pub phase: Phase,
    /// Bootstrap assets cached during install.
    pub precached: usize,
}

/// Outcome of [`ServiceHost::post_message`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageDelivery {
    /// Version the message was delivered to, if any worker exists.
    pub delivered_to: Option<String>,
    pub recognized: bool,
    /// Whether a waiting worker was promoted to active as a result.
    pub activated: bool,
}

/// Response delivered to a page.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub source: ResponseSource,
    pub response: Option<CachedResponse>,
}

/// Snapshot of the host's lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HostStatus {
    pub active_version: Option<String>,
    pub waiting_version: Option<String>,
    pub clients_claimed: bool,
    pub stores: Vec<String>,
}

/// Drives controller lifecycles over shared storage and network.
pub struct ServiceHost {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: RwLock<HostState>,
}

impl ServiceHost {
    pub fn new(storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { storage, fetcher, state: RwLock::new(HostState::default()) }
    }

    /// Register a controller version: install it, then activate it right away
    /// if nothing is active or it asked to skip waiting; otherwise park it as
    /// the waiting worker, replacing any previous one.
    pub async fn register(&self, config: ControllerConfig) -> Registration {
        let version = config.version.clone();
        let controller = CacheController::new(config, Arc::clone(&self.storage), Arc::clone(&self.fetcher));
        let worker = Worker { controller: Arc::new(controller), signals: Signals::default() };

        let precached = worker.controller.install(&worker.signals).await;

        let mut state = self.state.write().await;
        let phase = if state.active.is_none() || worker.signals.skip_waiting.load(Ordering::SeqCst) {
            if let Some(replaced) = state.waiting.take() {
                tracing::debug!(version = %replaced.controller.version(), "discarding waiting worker");
            }
            Self::activate(&mut state, worker).await;
            Phase::Active
        } else {
            if let Some(replaced) = state.waiting.replace(worker) {
                tracing::debug!(version = %replaced.controller.version(), "replacing waiting worker");
            }
            tracing::info!(version = %version, "installed; waiting for clients to release the active version");
            Phase::Waiting
        };

        Registration { version, phase, precached }
    }

    /// Bring up the configured version at process start.
    ///
    /// A version whose store already exists was installed by an earlier run,
    /// so install is skipped and the worker goes straight to activation.
    /// Anything else is a fresh [`register`](Self::register).
    pub async fn start(&self, config: ControllerConfig) -> Registration {
        let installed = match self.storage.has(&config.version).await {
            Ok(installed) => installed,
            Err(e) => {
                tracing::warn!(version = %config.version, error = %e, "could not inspect stores; reinstalling");
                false
            }
        };
        if !installed {
            return self.register(config).await;
        }

        let version = config.version.clone();
        tracing::info!(version = %version, "store already present; skipping install");
        let controller = CacheController::new(config, Arc::clone(&self.storage), Arc::clone(&self.fetcher));
        let worker = Worker { controller: Arc::new(controller), signals: Signals::default() };

        let mut state = self.state.write().await;
        Self::activate(&mut state, worker).await;
        Registration { version, phase: Phase::Active, precached: 0 }
    }

    /// Run the activate handler and promote the worker once it settles.
    ///
    /// A failed purge is logged; the worker still becomes active.
    async fn activate(state: &mut HostState, worker: Worker) {
        let version = worker.controller.version().to_string();
        match worker.controller.activate(&worker.signals).await {
            Ok(deleted) => tracing::info!(version = %version, purged = deleted.len(), "activated"),
            Err(e) => tracing::error!(version = %version, error = %e, "activate handler failed"),
        }

        if worker.signals.claim_clients.load(Ordering::SeqCst) {
            state.clients_claimed = true;
        }
        if let Some(previous) = state.active.replace(worker) {
            tracing::debug!(version = %previous.controller.version(), "retired previous worker");
        }
    }

    /// Dispatch a page request.
    ///
    /// Intercepted requests resolve to whatever the controller produced.
    /// Requests the controller passes through (or any request when no worker
    /// is active) go straight to the network, and a network failure there is
    /// returned as an error, as the page would see it.
    pub async fn fetch(&self, request: &CacheRequest) -> Result<PageResponse, Error> {
        let controller = {
            let state = self.state.read().await;
            state.active.as_ref().map(|w| Arc::clone(&w.controller))
        };

        if let Some(controller) = controller
            && let FetchOutcome::Respond(responded) = controller.handle_fetch(request).await
        {
            return Ok(PageResponse { source: responded.source, response: responded.response });
        }

        let response = self.fetcher.fetch(request).await?;
        Ok(PageResponse { source: ResponseSource::Passthrough, response: Some(response) })
    }

    /// Deliver a client message to the waiting worker, or the active one if
    /// nothing is waiting. A waiting worker that signals skip-waiting is
    /// activated before this returns.
    pub async fn post_message(&self, payload: &serde_json::Value) -> MessageDelivery {
        let mut state = self.state.write().await;

        if let Some(waiting) = state.waiting.as_ref() {
            let version = waiting.controller.version().to_string();
            let recognized = waiting.controller.handle_message(&waiting.signals, payload);
            let promote = waiting.signals.skip_waiting.load(Ordering::SeqCst);
            if promote && let Some(worker) = state.waiting.take() {
                Self::activate(&mut state, worker).await;
            }
            return MessageDelivery { delivered_to: Some(version), recognized, activated: promote };
        }

        match state.active.as_ref() {
            Some(active) => MessageDelivery {
                delivered_to: Some(active.controller.version().to_string()),
                recognized: active.controller.handle_message(&active.signals, payload),
                activated: false,
            },
            None => MessageDelivery { delivered_to: None, recognized: false, activated: false },
        }
    }

    pub async fn status(&self) -> Result<HostStatus, Error> {
        let (active_version, waiting_version, clients_claimed) = {
            let state = self.state.read().await;
            (
                state.active.as_ref().map(|w| w.controller.version().to_string()),
                state.waiting.as_ref().map(|w| w.controller.version().to_string()),
                state.clients_claimed,
            )
        };

        Ok(HostStatus { active_version, waiting_version, clients_claimed, stores: self.storage.keys().await? })
    }

    /// Requests held by a store, for inspection.
    pub async fn store_requests(&self, name: &str) -> Result<Vec<CacheRequest>, Error> {
        self.storage.requests(name).await
    }

    /// The active controller's config, which new versions inherit.
    pub async fn active_config(&self) -> Option<ControllerConfig> {
        let state = self.state.read().await;
        state.active.as_ref().map(|w| w.controller.config().clone())
    }
}
