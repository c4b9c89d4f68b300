//! Worker lifecycle: install, activate, and per-request fetch handling.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::future::join_all;
use reqwest::Url;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;

use super::http::{Request, Response};
use super::network::Network;
use super::storage::CacheStorage;
use super::strategy::{self, AssetClass};
use crate::config::WorkerConfig;
use crate::error::{Error, Result};

/// Static assets fetched concurrently during install.
const PRECACHE_CONCURRENCY: usize = 4;

/// Name of the cache bucket a worker writes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CacheGeneration {
    name: String,
}

impl CacheGeneration {
    /// `{prefix}-{version}-{created in epoch millis}`.
    #[must_use]
    pub fn new(prefix: &str, version: &str, created: DateTime<Utc>) -> Self {
        Self {
            name: format!("{prefix}-{version}-{}", created.timestamp_millis()),
        }
    }

    /// A generation stamped with the current time.
    #[must_use]
    pub fn now(prefix: &str, version: &str) -> Self {
        Self::new(prefix, version, Utc::now())
    }

    /// The cache bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CacheGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Replaced by a newer worker.
    Redundant,
}

impl WorkerState {
    /// Lowercase name, as used in lifecycle errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the install step.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub generation: CacheGeneration,
    /// Asset paths stored in the new generation.
    pub cached: Vec<String>,
    /// Asset paths that could not be stored, with the reason.
    pub failed: Vec<(String, String)>,
    /// Whether the worker asked to supersede the previous one immediately.
    pub skip_waiting: bool,
}

/// Outcome of the activate step.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    /// The generation that survived.
    pub kept: CacheGeneration,
    /// Stale generations removed.
    pub deleted: Vec<String>,
    /// Stale generations whose deletion failed.
    pub failed: Vec<String>,
    /// Whether open clients were taken over.
    pub claimed: bool,
}

/// Offline cache manager for one cache generation.
///
/// Requests are classified by [`strategy::classify`] and served network first
/// (dynamic assets) or cache first (static assets). Storage failures are
/// logged and never reach the caller; only a transport failure with nothing
/// cached to stand in for it does.
pub struct ServiceWorker<S, N> {
    origin: Url,
    storage: Arc<S>,
    network: Arc<N>,
    config: WorkerConfig,
    generation: CacheGeneration,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
    /// Cleared once the worker is being replaced; no cache writes start after.
    writable: StdRwLock<bool>,
    pending: TaskTracker,
}

impl<S, N> fmt::Debug for ServiceWorker<S, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("origin", &self.origin.as_str())
            .field("generation", &self.generation.name())
            .field("scope", &self.config.scope)
            .finish_non_exhaustive()
    }
}

impl<S, N> ServiceWorker<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    /// Creates a worker for `origin` whose generation is stamped now.
    pub fn new(origin: Url, storage: Arc<S>, network: Arc<N>, config: WorkerConfig) -> Self {
        let generation = CacheGeneration::now(&config.cache_prefix, &config.version);
        Self {
            origin,
            storage,
            network,
            config,
            generation,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
            writable: StdRwLock::new(true),
            pending: TaskTracker::new(),
        }
    }

    /// Overrides the generation name.
    #[must_use]
    pub fn with_generation(mut self, generation: CacheGeneration) -> Self {
        self.generation = generation;
        self
    }

    /// The cache generation this worker writes to.
    #[must_use]
    pub const fn generation(&self) -> &CacheGeneration {
        &self.generation
    }

    /// Origin that static asset paths are resolved against.
    #[must_use]
    pub const fn origin(&self) -> &Url {
        &self.origin
    }

    /// Path prefix the worker controls.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.config.scope
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether install asked to take over without waiting.
    #[must_use]
    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::Acquire)
    }

    /// Whether activate claimed open clients.
    #[must_use]
    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::Acquire)
    }

    /// Creates the generation and precaches the static assets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] unless the worker is freshly parsed.
    /// Per-asset failures are reported, not returned.
    pub async fn install(&self) -> Result<InstallReport> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)
            .await?;
        log::info!("Installing worker, cache generation {}", self.generation);

        if let Err(e) = self.storage.open(self.generation.name()).await {
            log::warn!("Failed to open cache {}: {e}", self.generation);
        }

        let assets = self.config.static_asset_paths();
        log::info!("Caching {} static assets", assets.len());

        let outcomes: Vec<(String, Result<()>)> = futures::stream::iter(assets)
            .map(|path| async move {
                let outcome = self.precache(&path).await;
                (path, outcome)
            })
            .buffer_unordered(PRECACHE_CONCURRENCY)
            .collect()
            .await;

        let mut cached = Vec::new();
        let mut failed = Vec::new();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(()) => cached.push(path),
                Err(e) => {
                    log::warn!("Failed to cache {path}: {e}");
                    failed.push((path, e.to_string()));
                }
            }
        }

        self.skip_waiting.store(true, Ordering::Release);
        self.set_state(WorkerState::Installed).await;
        log::info!(
            "Installed {}: {} cached, {} failed",
            self.generation,
            cached.len(),
            failed.len()
        );

        Ok(InstallReport {
            generation: self.generation.clone(),
            cached,
            failed,
            skip_waiting: true,
        })
    }

    /// Deletes every other generation and takes control of open clients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] unless install has completed.
    pub async fn activate(&self) -> Result<ActivationReport> {
        self.transition(WorkerState::Installed, WorkerState::Activating)
            .await?;
        log::info!("Activating worker {}", self.generation);

        let stale: Vec<String> = match self.storage.keys().await {
            Ok(keys) => keys
                .into_iter()
                .filter(|name| name != self.generation.name())
                .collect(),
            Err(e) => {
                log::warn!("Failed to list caches: {e}");
                Vec::new()
            }
        };

        let results = join_all(stale.iter().map(|name| async move {
            log::info!("Deleting old cache {name}");
            (name.clone(), self.storage.delete(name).await)
        }))
        .await;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (name, result) in results {
            match result {
                Ok(_) => deleted.push(name),
                Err(e) => {
                    log::warn!("Failed to delete cache {name}: {e}");
                    failed.push(name);
                }
            }
        }

        self.clients_claimed.store(true, Ordering::Release);
        self.set_state(WorkerState::Activated).await;

        Ok(ActivationReport {
            kept: self.generation.clone(),
            deleted,
            failed,
            claimed: true,
        })
    }

    /// Answers an intercepted request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCachedResponse`] when a network-first request fails
    /// in transit with no cached fallback, or the transport error when a
    /// cache-first miss cannot be fetched.
    pub async fn fetch(&self, request: &Request) -> Result<Response> {
        match strategy::classify(request.path(), &self.config.scope) {
            AssetClass::Dynamic => self.network_first(request).await,
            AssetClass::Static => self.cache_first(request).await,
        }
    }

    /// Waits for background cache writes started so far.
    pub async fn settle(&self) {
        self.pending.close();
        self.pending.wait().await;
        self.pending.reopen();
    }

    /// Stops new cache writes and waits for those already started.
    ///
    /// The worker keeps answering requests, straight from the network and
    /// its caches, without storing anything.
    pub(crate) async fn freeze(&self) {
        *self.writable.write().unwrap_or_else(PoisonError::into_inner) = false;
        self.settle().await;
    }

    async fn network_first(&self, request: &Request) -> Result<Response> {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store_in_background(request.clone(), response.clone());
                }
                Ok(response)
            }
            Err(e) => {
                log::debug!("Network failed for {}: {e}", request.path());

                if let Some(cached) = self.cached(request).await {
                    log::info!("Serving cached version (offline): {}", request.path());
                    return Ok(cached);
                }

                if strategy::is_document(request.path(), &self.config.scope) {
                    let root = request.with_path(&strategy::root_document(&self.config.scope));
                    if let Some(cached) = self.cached(&root).await {
                        log::info!("Serving cached root document for {}", request.path());
                        return Ok(cached);
                    }
                }

                Err(Error::NoCachedResponse {
                    url: request.cache_key(),
                })
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<Response> {
        if let Some(cached) = self.cached(request).await {
            return Ok(cached);
        }

        let response = self.network.fetch(request).await?;
        if response.is_cacheable() {
            self.store(request, &response).await;
        }
        Ok(response)
    }

    async fn precache(&self, path: &str) -> Result<()> {
        let url = self
            .origin
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
        let request = Request::new(url).reload();

        let response = self.network.fetch(&request).await?;
        if !response.is_cacheable() {
            return Err(Error::BadStatus {
                url: request.cache_key(),
                status: response.status,
            });
        }
        self.storage
            .put(self.generation.name(), &request, &response)
            .await
    }

    async fn cached(&self, request: &Request) -> Option<Response> {
        match self.storage.match_request(request).await {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("Cache lookup failed for {}: {e}", request.path());
                None
            }
        }
    }

    /// Tracks `write` so [`Self::settle`] waits for it, or returns `None`
    /// once the worker is frozen.
    fn track_write<F: Future>(&self, write: F) -> Option<TrackedFuture<F>> {
        let writable = self.writable.read().unwrap_or_else(PoisonError::into_inner);
        (*writable).then(|| self.pending.track_future(write))
    }

    async fn store(&self, request: &Request, response: &Response) {
        let put = self.storage.put(self.generation.name(), request, response);
        let Some(write) = self.track_write(put) else {
            log::debug!("Not caching {}: worker is being replaced", request.path());
            return;
        };
        if let Err(e) = write.await {
            log::warn!("Failed to cache {}: {e}", request.path());
        }
    }

    fn store_in_background(&self, request: Request, response: Response) {
        let storage = Arc::clone(&self.storage);
        let cache = self.generation.name().to_string();
        let write = self.track_write(async move {
            if let Err(e) = storage.put(&cache, &request, &response).await {
                log::warn!("Failed to cache {}: {e}", request.path());
            }
        });
        if let Some(write) = write {
            tokio::spawn(write);
        }
    }

    async fn transition(&self, from: WorkerState, to: WorkerState) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::Lifecycle {
                expected: from.as_str(),
                found: state.as_str(),
            });
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.write().await = to;
    }
}

/// A worker that went through install and activate.
#[derive(Debug)]
pub struct Registered<S, N> {
    /// The new controller.
    pub worker: Arc<ServiceWorker<S, N>>,
    pub install: InstallReport,
    pub activation: ActivationReport,
}

/// Holds the worker that controls requests, if any.
pub struct Registration<S, N> {
    network: Arc<N>,
    active: RwLock<Option<Arc<ServiceWorker<S, N>>>>,
}

impl<S, N> fmt::Debug for Registration<S, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").finish_non_exhaustive()
    }
}

impl<S, N> Registration<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    /// Creates a registration with no active worker.
    pub fn new(network: Arc<N>) -> Self {
        Self {
            network,
            active: RwLock::new(None),
        }
    }

    /// Installs and activates `worker`, then makes it the controller.
    ///
    /// The current controller stops writing to its cache before the new
    /// worker's activation purges it, and is marked redundant once replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] if `worker` was already installed.
    pub async fn register(&self, worker: ServiceWorker<S, N>) -> Result<Registered<S, N>> {
        let install = worker.install().await?;
        if !install.skip_waiting {
            log::debug!("Worker {} is waiting for clients to close", install.generation);
        }

        if let Some(current) = self.controller().await {
            current.freeze().await;
        }
        let activation = worker.activate().await?;

        let worker = Arc::new(worker);
        let previous = self.active.write().await.replace(Arc::clone(&worker));
        if let Some(previous) = previous {
            log::info!("Worker {} superseded by {}", previous.generation, worker.generation);
            previous.freeze().await;
            previous.set_state(WorkerState::Redundant).await;
        }
        Ok(Registered {
            worker,
            install,
            activation,
        })
    }

    /// The worker currently controlling requests.
    pub async fn controller(&self) -> Option<Arc<ServiceWorker<S, N>>> {
        self.active.read().await.clone()
    }

    /// Routes `request` through the controller, or straight to the network
    /// when there is none.
    ///
    /// # Errors
    ///
    /// See [`ServiceWorker::fetch`] and [`Network::fetch`].
    pub async fn fetch(&self, request: &Request) -> Result<Response> {
        match self.controller().await {
            Some(worker) => worker.fetch(request).await,
            None => self.network.fetch(request).await,
        }
    }

    /// The network used when no worker is in control.
    #[must_use]
    pub fn network(&self) -> &N {
        &self.network
    }
}
