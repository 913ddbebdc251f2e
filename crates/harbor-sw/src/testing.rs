//! Shared fixtures for unit tests.

use std::time::Duration;

use async_trait::async_trait;
use harbor_net::{Fetcher, NetError, Request, Response};
use url::Url;

pub(crate) use harbor_net::testing::ScriptedFetcher;

use crate::config::EngineConfig;

pub(crate) const ORIGIN: &str = "https://shop.example/";

pub(crate) fn config(version: &str) -> EngineConfig {
    EngineConfig {
        network_timeout_ms: None,
        ..EngineConfig::for_version(version, Url::parse(ORIGIN).unwrap())
    }
}

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// An origin with no routes.
pub(crate) fn fetcher() -> ScriptedFetcher {
    ScriptedFetcher::new(Url::parse(ORIGIN).unwrap())
}

/// An origin serving every path of the default install manifest.
pub(crate) fn manifest_fetcher() -> ScriptedFetcher {
    let fetcher = fetcher();
    for path in EngineConfig::default().precache_manifest {
        fetcher.serve(&path, "text/html", &format!("precached {path}"));
    }
    fetcher
}

/// A network that never answers in time.
pub(crate) struct StalledFetcher;

#[async_trait]
impl Fetcher for StalledFetcher {
    async fn fetch(&self, _request: &Request) -> Result<Response, NetError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(NetError::RequestFailed("unreachable".to_string()))
    }
}
