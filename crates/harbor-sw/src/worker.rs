//! The engine facade hosts talk to.

use std::sync::Arc;

use harbor_net::{Fetcher, Request, Response};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use url::Url;

use crate::background::{BackgroundHooks, Notification};
use crate::cache::{CacheManager, CacheStorage};
use crate::clients::{Client, Clients};
use crate::config::EngineConfig;
use crate::control::{ControlChannel, ControlEnvelope, ControlMessage, VersionReply};
use crate::error::{SwError, SwResult};
use crate::events::WorkerEvent;
use crate::lifecycle::{LifecycleController, WorkerId, WorkerState};
use crate::strategy::FetchStrategies;

/// Interception engine for one origin.
pub struct OfflineWorker {
    cache: CacheManager,
    fetcher: Arc<dyn Fetcher>,
    lifecycle: Arc<LifecycleController>,
    control: ControlChannel,
    clients: Arc<RwLock<Clients>>,
    background: BackgroundHooks,
}

impl OfflineWorker {
    /// Create an engine and the receiver for its events.
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cache = CacheManager::new(storage);
        let clients = Arc::new(RwLock::new(Clients::new()));
        let lifecycle = Arc::new(LifecycleController::new(
            cache.clone(),
            Arc::clone(&fetcher),
            Arc::clone(&clients),
            event_tx.clone(),
        ));

        (
            Self {
                control: ControlChannel::new(Arc::clone(&lifecycle), cache.clone()),
                background: BackgroundHooks::new(Arc::clone(&clients), event_tx),
                cache,
                fetcher,
                lifecycle,
                clients,
            },
            event_rx,
        )
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    // ==================== Lifecycle ====================

    /// Install a version. See [`LifecycleController::install`].
    pub async fn install(&self, config: EngineConfig) -> SwResult<WorkerId> {
        self.lifecycle.install(config).await
    }

    pub async fn skip_waiting(&self) -> bool {
        self.lifecycle.skip_waiting().await
    }

    pub async fn release_controller(&self) -> bool {
        self.lifecycle.release_controller().await
    }

    pub async fn active_version(&self) -> Option<String> {
        self.lifecycle.active_version().await
    }

    pub async fn state_of(&self, id: WorkerId) -> Option<WorkerState> {
        self.lifecycle.state_of(id).await
    }

    // ==================== Fetch ====================

    /// Supply a response for a page request.
    ///
    /// Non-GET requests, and any request while no version is active, go
    /// straight to the network.
    pub async fn handle_fetch(&self, request: Request) -> SwResult<Response> {
        let strategies = match self.lifecycle.active().await {
            Some(strategies) if strategies.classifier().should_intercept(&request) => strategies,
            _ => {
                trace!(url = %request.url, method = %request.method, "Passing through");
                return self.fetcher.fetch(&request).await.map_err(SwError::from);
            }
        };
        strategies.handle(&request).await
    }

    /// Handle a fetch on its own task.
    pub fn spawn_fetch(self: &Arc<Self>, request: Request) -> JoinHandle<SwResult<Response>> {
        let worker = Arc::clone(self);
        tokio::spawn(async move { worker.handle_fetch(request).await })
    }

    /// Strategies of the active version.
    pub async fn active_strategies(&self) -> Option<Arc<FetchStrategies>> {
        self.lifecycle.active().await
    }

    // ==================== Control ====================

    /// Dispatch a control message; `GET_VERSION` returns its reply.
    pub async fn post_message(&self, message: ControlMessage) -> SwResult<Option<VersionReply>> {
        let (envelope, rx) = ControlEnvelope::with_reply(message);
        self.control.dispatch(envelope).await?;
        Ok(rx.await.ok())
    }

    /// Dispatch a JSON control message.
    pub async fn post_json(&self, json: &str) -> SwResult<Option<VersionReply>> {
        self.post_message(ControlMessage::from_json(json)?).await
    }

    /// Start a task that handles control messages in order.
    pub fn control_sender(&self) -> mpsc::UnboundedSender<ControlEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.control.clone().run(rx));
        tx
    }

    // ==================== Clients ====================

    /// A page opened; it is controlled by the active version, if any.
    pub async fn connect_client(&self, url: Url) -> Client {
        let controller = self.lifecycle.active_id().await;
        self.clients.write().await.connect(url, controller)
    }

    /// A page closed. Closing the last page releases the controller.
    pub async fn client_closed(&self, id: &str) {
        let now_empty = {
            let mut clients = self.clients.write().await;
            clients.remove(id);
            clients.is_empty()
        };
        if now_empty && self.lifecycle.has_waiting().await {
            debug!("Last client closed, activating waiting version");
            self.lifecycle.release_controller().await;
        }
    }

    pub async fn client(&self, id: &str) -> Option<Client> {
        self.clients.read().await.get(id).cloned()
    }

    // ==================== Background ====================

    /// Push event.
    pub async fn push(&self, data: Option<&[u8]>) -> SwResult<Notification> {
        let strategies = self.require_active().await?;
        self.background.push(strategies.config(), data)
    }

    /// Notification click, with the chosen action if any.
    pub async fn notification_click(
        &self,
        notification: &Notification,
        action: Option<&str>,
    ) -> SwResult<Option<Client>> {
        let strategies = self.require_active().await?;
        let controller = self.lifecycle.active_id().await;
        self.background
            .notification_click(strategies.config(), controller, notification, action)
            .await
    }

    /// Background sync event.
    pub async fn sync(&self, tag: &str) -> SwResult<()> {
        let strategies = self.require_active().await?;
        self.background.sync(strategies.config(), tag).await
    }

    async fn require_active(&self) -> SwResult<Arc<FetchStrategies>> {
        self.lifecycle
            .active()
            .await
            .ok_or_else(|| SwError::State("no active version".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::testing::{config, fetcher, manifest_fetcher, url, ScriptedFetcher};
    use bytes::Bytes;

    fn worker(fetcher: Arc<ScriptedFetcher>) -> OfflineWorker {
        OfflineWorker::new(Arc::new(MemoryCacheStorage::new()), fetcher).0
    }

    #[tokio::test]
    async fn test_passthrough_without_active_version() {
        let fetcher = Arc::new(fetcher());
        fetcher.route("/css/style.css", 200, "text/css", "a");
        let worker = worker(fetcher.clone());

        worker.handle_fetch(Request::get(url("/css/style.css"))).await.unwrap();
        worker.handle_fetch(Request::get(url("/css/style.css"))).await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert!(worker.cache().namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_bypasses_engine() {
        let fetcher = Arc::new(manifest_fetcher());
        let worker = worker(fetcher.clone());
        worker.install(config("v1")).await.unwrap();
        fetcher.route("/api/orders", 201, "application/json", "{}");

        let response = worker
            .handle_fetch(Request::post(url("/api/orders"), Bytes::from("{}")))
            .await
            .unwrap();

        assert_eq!(response.status.as_u16(), 201);
        assert!(!worker.cache().has("api-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_last_client_closing_activates_waiting() {
        let fetcher = Arc::new(manifest_fetcher());
        let worker = worker(fetcher);
        worker.install(config("v1")).await.unwrap();
        let page = worker.connect_client(url("/")).await;

        let v2 = worker.install(config("v2")).await.unwrap();
        assert_eq!(worker.state_of(v2).await, Some(WorkerState::Installed));
        assert_eq!(worker.active_version().await.as_deref(), Some("v1"));

        worker.client_closed(&page.id).await;
        assert_eq!(worker.state_of(v2).await, Some(WorkerState::Activated));
    }

    #[tokio::test]
    async fn test_background_hooks_need_active_version() {
        let worker = worker(Arc::new(fetcher()));
        assert!(matches!(worker.push(None).await, Err(SwError::State(_))));
        assert!(matches!(worker.sync("background-sync").await, Err(SwError::State(_))));
    }
}
