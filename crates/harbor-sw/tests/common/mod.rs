//! Scripted origin shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use harbor_net::testing::ScriptedFetcher;
use harbor_net::Url;
use harbor_sw::{EngineConfig, MemoryCacheStorage, OfflineWorker, WorkerEvent};
use tokio::sync::mpsc;

pub const ORIGIN: &str = "https://shop.example/";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn config(version: &str) -> EngineConfig {
    EngineConfig {
        network_timeout_ms: None,
        ..EngineConfig::for_version(version, Url::parse(ORIGIN).unwrap())
    }
}

/// Origin serving the default install manifest.
pub fn site_network() -> Arc<ScriptedFetcher> {
    let network = Arc::new(ScriptedFetcher::new(Url::parse(ORIGIN).unwrap()));
    network.serve("/", "text/html", "<h1>Home</h1>");
    network.serve("/index.html", "text/html", "<h1>Home</h1>");
    network.serve("/css/style.css", "text/css", "body { margin: 0 }");
    network.serve("/js/app.js", "application/javascript", "console.log('app')");
    network.serve("/manifest.json", "application/manifest+json", "{}");
    network
}

pub struct Site {
    pub network: Arc<ScriptedFetcher>,
    pub storage: Arc<MemoryCacheStorage>,
    pub worker: Arc<OfflineWorker>,
    pub events: mpsc::UnboundedReceiver<WorkerEvent>,
}

/// A worker with `version` installed and active.
pub async fn installed(version: &str) -> Site {
    let network = site_network();
    let storage = Arc::new(MemoryCacheStorage::new());
    let (worker, events) = OfflineWorker::new(storage.clone(), network.clone());
    worker.install(config(version)).await.unwrap();
    network.reset_calls();
    Site {
        network,
        storage,
        worker: Arc::new(worker),
        events,
    }
}

pub fn drain(events: &mut mpsc::UnboundedReceiver<WorkerEvent>) -> Vec<WorkerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
