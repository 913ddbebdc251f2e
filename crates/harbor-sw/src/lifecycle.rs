//! Version lifecycle.
//!
//! ```text
//! Installing ──ok──→ Installed (waiting) ──skip/release──→ Activating ──→ Activated
//!     │                   │                                                  │
//!     └──fail──→ Redundant ←──── superseded by a newer install / activation ─┘
//! ```
//!
//! [`Registration`] is the pure slot machine; [`LifecycleController`] drives
//! it and performs the cache work each transition needs.
//!
//! A new version skips the wait when nothing is active or no page is open.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use harbor_net::{Fetcher, Request};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheManager};
use crate::clients::Clients;
use crate::config::EngineConfig;
use crate::error::{SwError, SwResult};
use crate::events::WorkerEvent;
use crate::strategy::FetchStrategies;

// ==================== Types ====================

/// Unique identifier for an installed version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Lifecycle state of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Precaching the install manifest.
    Installing,
    /// Installed and waiting for activation.
    Installed,
    /// Deleting stale caches and claiming clients.
    Activating,
    /// Serving fetches.
    Activated,
    /// Failed or superseded. Terminal.
    Redundant,
}

impl WorkerState {
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Activated => write!(f, "activated"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// A recorded state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub worker_id: WorkerId,
    pub version: String,
    pub state: WorkerState,
}

// ==================== Worker Version ====================

/// One installed engine version.
#[derive(Clone)]
pub struct WorkerVersion {
    pub id: WorkerId,
    pub state: WorkerState,
    pub state_changed_at: Instant,
    strategies: Arc<FetchStrategies>,
}

impl fmt::Debug for WorkerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerVersion")
            .field("id", &self.id)
            .field("version", &self.version())
            .field("state", &self.state)
            .finish()
    }
}

impl WorkerVersion {
    pub fn new(strategies: Arc<FetchStrategies>) -> Self {
        Self {
            id: WorkerId::next(),
            state: WorkerState::Installing,
            state_changed_at: Instant::now(),
            strategies,
        }
    }

    pub fn version(&self) -> &str {
        &self.strategies.namespaces().version
    }

    pub fn strategies(&self) -> &Arc<FetchStrategies> {
        &self.strategies
    }

    fn set_state(&mut self, state: WorkerState) -> Transition {
        self.state = state;
        self.state_changed_at = Instant::now();
        Transition {
            worker_id: self.id,
            version: self.version().to_string(),
            state,
        }
    }
}

// ==================== Registration ====================

/// Redundant ids remembered for [`Registration::state_of`].
pub const REDUNDANT_HISTORY: usize = 32;

/// Slots of the lifecycle state machine.
#[derive(Debug, Default)]
pub struct Registration {
    installing: Option<WorkerVersion>,
    waiting: Option<WorkerVersion>,
    activating: Option<WorkerVersion>,
    active: Option<WorkerVersion>,
    redundant: VecDeque<WorkerId>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installing(&self) -> Option<&WorkerVersion> {
        self.installing.as_ref()
    }

    pub fn waiting(&self) -> Option<&WorkerVersion> {
        self.waiting.as_ref()
    }

    pub fn active(&self) -> Option<&WorkerVersion> {
        self.active.as_ref()
    }

    /// Current state of a version. `None` for unknown ids and for redundant
    /// ones older than the last [`REDUNDANT_HISTORY`].
    pub fn state_of(&self, id: WorkerId) -> Option<WorkerState> {
        [
            &self.installing,
            &self.waiting,
            &self.activating,
            &self.active,
        ]
        .into_iter()
        .flatten()
        .find(|w| w.id == id)
        .map(|w| w.state)
        .or_else(|| self.redundant.contains(&id).then_some(WorkerState::Redundant))
    }

    /// Whether a version still in a live slot owns namespace `name`.
    pub fn uses_namespace(&self, name: &str) -> bool {
        [
            &self.installing,
            &self.waiting,
            &self.activating,
            &self.active,
        ]
        .into_iter()
        .flatten()
        .any(|w| w.strategies.namespaces().allow_list().iter().any(|n| n == name))
    }

    /// Start installing; a previous installing version becomes redundant.
    pub fn begin_install(&mut self, mut worker: WorkerVersion) -> Vec<Transition> {
        let mut transitions = Vec::new();
        if let Some(old) = self.installing.take() {
            transitions.push(self.retire(old));
        }
        transitions.push(worker.set_state(WorkerState::Installing));
        self.installing = Some(worker);
        transitions
    }

    /// Installation of `id` failed.
    pub fn install_failed(&mut self, id: WorkerId) -> Vec<Transition> {
        match self.installing.take() {
            Some(worker) if worker.id == id => vec![self.retire(worker)],
            other => {
                self.installing = other;
                Vec::new()
            }
        }
    }

    /// Move `id` from installing to waiting. Empty if `id` was superseded.
    pub fn install_complete(&mut self, id: WorkerId) -> Vec<Transition> {
        let mut worker = match self.installing.take() {
            Some(worker) if worker.id == id => worker,
            other => {
                self.installing = other;
                return Vec::new();
            }
        };

        let mut transitions = Vec::new();
        if let Some(old) = self.waiting.take() {
            transitions.push(self.retire(old));
        }
        transitions.push(worker.set_state(WorkerState::Installed));
        self.waiting = Some(worker);
        transitions
    }

    /// Move the waiting version into the activating slot.
    pub fn begin_activation(&mut self) -> Option<Transition> {
        let mut worker = self.waiting.take()?;
        let transition = worker.set_state(WorkerState::Activating);
        self.activating = Some(worker);
        Some(transition)
    }

    /// Promote the activating version; the previous active one becomes redundant.
    pub fn finish_activation(&mut self) -> Vec<Transition> {
        let Some(mut worker) = self.activating.take() else {
            return Vec::new();
        };

        let mut transitions = Vec::new();
        if let Some(old) = self.active.take() {
            transitions.push(self.retire(old));
        }
        transitions.push(worker.set_state(WorkerState::Activated));
        self.active = Some(worker);
        transitions
    }

    fn retire(&mut self, mut worker: WorkerVersion) -> Transition {
        if self.redundant.len() == REDUNDANT_HISTORY {
            self.redundant.pop_front();
        }
        self.redundant.push_back(worker.id);
        worker.set_state(WorkerState::Redundant)
    }
}

// ==================== Controller ====================

fn superseded(strategies: &FetchStrategies) -> SwError {
    SwError::State(format!(
        "version {} was superseded during install",
        strategies.namespaces().version
    ))
}

/// Drives installs and activations against the cache.
pub struct LifecycleController {
    cache: CacheManager,
    fetcher: Arc<dyn Fetcher>,
    registration: RwLock<Registration>,
    clients: Arc<RwLock<Clients>>,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl LifecycleController {
    pub fn new(
        cache: CacheManager,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<RwLock<Clients>>,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            registration: RwLock::new(Registration::new()),
            clients,
            events,
        }
    }

    /// Install a version.
    ///
    /// The whole manifest is fetched before anything is stored; one failure
    /// makes the version redundant and leaves the active version serving.
    /// The new version activates right away when there is no active version
    /// or the active one controls no pages; otherwise it waits.
    pub async fn install(&self, config: EngineConfig) -> SwResult<WorkerId> {
        config.validate()?;
        let strategies = Arc::new(FetchStrategies::new(
            Arc::new(config),
            self.cache.clone(),
            Arc::clone(&self.fetcher),
        ));
        let worker = WorkerVersion::new(Arc::clone(&strategies));
        let id = worker.id;

        info!(version = %worker.version(), "Installing");
        {
            let mut registration = self.registration.write().await;
            let transitions = registration.begin_install(worker);
            self.emit(transitions);
        }

        let precached = self.precache(id, &strategies).await;

        let mut registration = self.registration.write().await;
        if let Err(e) = precached {
            warn!(version = %strategies.namespaces().version, error = %e, "Install failed");
            let transitions = registration.install_failed(id);
            self.emit(transitions);
            self.discard_static(&registration, &strategies).await;
            return Err(e);
        }

        let transitions = registration.install_complete(id);
        if transitions.is_empty() {
            self.discard_static(&registration, &strategies).await;
            return Err(superseded(&strategies));
        }
        self.emit(transitions);

        // Nothing to release when no page is controlled.
        if registration.active().is_none() || self.clients.read().await.is_empty() {
            self.activate_locked(&mut registration).await;
        }
        Ok(id)
    }

    /// Activate the waiting version now. False if nothing was waiting.
    pub async fn skip_waiting(&self) -> bool {
        let mut registration = self.registration.write().await;
        self.activate_locked(&mut registration).await
    }

    /// The previous controller let go of its pages.
    pub async fn release_controller(&self) -> bool {
        debug!("Previous controller released");
        self.skip_waiting().await
    }

    /// Strategies of the active version.
    pub async fn active(&self) -> Option<Arc<FetchStrategies>> {
        self.registration
            .read()
            .await
            .active()
            .map(|w| Arc::clone(w.strategies()))
    }

    pub async fn active_id(&self) -> Option<WorkerId> {
        self.registration.read().await.active().map(|w| w.id)
    }

    pub async fn active_version(&self) -> Option<String> {
        self.registration
            .read()
            .await
            .active()
            .map(|w| w.version().to_string())
    }

    pub async fn has_waiting(&self) -> bool {
        self.registration.read().await.waiting().is_some()
    }

    pub async fn state_of(&self, id: WorkerId) -> Option<WorkerState> {
        self.registration.read().await.state_of(id)
    }

    async fn precache(&self, id: WorkerId, strategies: &FetchStrategies) -> SwResult<()> {
        let config = strategies.config();
        let mut fetched = Vec::with_capacity(config.precache_manifest.len());

        for path in &config.precache_manifest {
            let url = config.resolve(path).map_err(|e| SwError::InstallFailed {
                url: path.clone(),
                reason: e.to_string(),
            })?;
            let request = Request::get(url);

            let response =
                strategies
                    .network(&request)
                    .await
                    .map_err(|e| SwError::InstallFailed {
                        url: request.url.to_string(),
                        reason: e.to_string(),
                    })?;
            if !response.ok() {
                return Err(SwError::InstallFailed {
                    url: request.url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }

            fetched.push((CacheKey::for_request(&request), response));
        }

        // A newer install took over while fetching; leave its namespace alone.
        if !self.is_installing(id).await {
            return Err(superseded(strategies));
        }
        let handle = self.cache.open(&strategies.namespaces().static_assets).await?;
        for (key, response) in fetched {
            handle.put(key, &response).await?;
        }
        debug!(
            namespace = %handle.name(),
            count = config.precache_manifest.len(),
            "Precached install manifest"
        );
        Ok(())
    }

    async fn is_installing(&self, id: WorkerId) -> bool {
        self.registration.read().await.installing().map(|w| w.id) == Some(id)
    }

    /// Drop the static namespace of a version that will never activate,
    /// unless a live version shares its name.
    async fn discard_static(&self, registration: &Registration, strategies: &FetchStrategies) {
        let name = &strategies.namespaces().static_assets.name;
        if registration.uses_namespace(name) {
            return;
        }
        match self.cache.delete(name).await {
            Ok(true) => debug!(namespace = %name, "Discarded precache of abandoned install"),
            Ok(false) => {}
            Err(e) => warn!(namespace = %name, error = %e, "Failed to discard precache"),
        }
    }

    async fn activate_locked(&self, registration: &mut Registration) -> bool {
        let Some(transition) = registration.begin_activation() else {
            return false;
        };
        let worker_id = transition.worker_id;
        let version = transition.version.clone();
        self.emit(vec![transition]);

        let allow_list: Vec<String> = match registration.activating.as_ref() {
            Some(worker) => worker.strategies().namespaces().allow_list(),
            None => Vec::new(),
        };
        match self.cache.delete_stale(&allow_list).await {
            Ok(deleted) if !deleted.is_empty() => {
                info!(%version, deleted = ?deleted, "Removed stale caches")
            }
            Ok(_) => {}
            Err(e) => warn!(%version, error = %e, "Stale cache cleanup failed"),
        }

        let claimed = self.clients.write().await.claim(worker_id);
        for client_id in claimed {
            let _ = self.events.send(WorkerEvent::ControllerChange {
                client_id,
                worker_id,
            });
        }

        let transitions = registration.finish_activation();
        self.emit(transitions);
        info!(%version, "Activated");
        true
    }

    fn emit(&self, transitions: Vec<Transition>) {
        for t in transitions {
            debug!(version = %t.version, state = %t.state, "State change");
            let _ = self.events.send(WorkerEvent::StateChange {
                worker_id: t.worker_id,
                version: t.version,
                state: t.state,
            });
        }
    }
}
