//! Caching strategies, one per [`RequestClass`].
//!
//! | Class       | Order                                   | Terminal tier        |
//! |-------------|-----------------------------------------|----------------------|
//! | StaticAsset | cache → network                         | placeholder (images) |
//! | ApiEndpoint | network → cache                         | 503 JSON envelope    |
//! | Navigation  | network → exact match → root document   | offline page         |
//! | Dynamic     | network → cache                         | propagated failure   |
//!
//! Cache read errors count as misses and cache write errors are logged and
//! dropped; neither ever reaches the caller.

use std::sync::Arc;

use harbor_common::with_timeout;
use harbor_net::{Fetcher, NetError, Request, Response};
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheManager};
use crate::classify::{Classifier, RequestClass};
use crate::config::EngineConfig;
use crate::error::{SwError, SwResult};
use crate::namespace::{CacheNamespace, NamespaceSet};
use crate::synth;

/// The strategies of one engine version.
pub struct FetchStrategies {
    config: Arc<EngineConfig>,
    namespaces: NamespaceSet,
    classifier: Classifier,
    cache: CacheManager,
    fetcher: Arc<dyn Fetcher>,
}

impl FetchStrategies {
    pub fn new(config: Arc<EngineConfig>, cache: CacheManager, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            namespaces: NamespaceSet::from_config(&config),
            classifier: Classifier::new(Arc::clone(&config)),
            config,
            cache,
            fetcher,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn namespaces(&self) -> &NamespaceSet {
        &self.namespaces
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Serve an intercepted GET request.
    ///
    /// Errors only for the propagated-failure tiers: non-image static assets
    /// and dynamic resources that are neither online nor cached.
    pub async fn handle(&self, request: &Request) -> SwResult<Response> {
        let class = self.classifier.classify(request);
        debug!(url = %request.url, %class, version = %self.namespaces.version, "Handling fetch");

        match class {
            RequestClass::StaticAsset => self.cache_first(request).await,
            RequestClass::ApiEndpoint => Ok(self.api_network_first(request).await),
            RequestClass::Navigation => Ok(self.navigation_network_first(request).await),
            RequestClass::Dynamic => self.dynamic_network_first(request).await,
        }
    }

    /// Cache first, then network. Offline images get a placeholder.
    pub async fn cache_first(&self, request: &Request) -> SwResult<Response> {
        let key = CacheKey::for_request(request);
        if let Some(hit) = self.lookup(&self.namespaces.all(), &key).await {
            return Ok(hit);
        }

        match self.network(request).await {
            Ok(response) => {
                if response.ok() {
                    self.store(&self.namespaces.static_assets, key, &response)
                        .await;
                }
                Ok(response)
            }
            Err(e) if self.classifier.is_image(request.url.path()) => {
                warn!(url = %request.url, error = %e, "Image unavailable, serving placeholder");
                Ok(synth::placeholder_image(&request.url))
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Static asset unavailable");
                Err(SwError::Network(e))
            }
        }
    }

    /// Network first, cache fallback, then the 503 envelope.
    /// Sensitive endpoints are never written to the cache.
    pub async fn api_network_first(&self, request: &Request) -> Response {
        let key = CacheKey::for_request(request);

        match self.network(request).await {
            Ok(response) => {
                if !response.ok() {
                    return response;
                }
                if self.classifier.is_sensitive(request.url.path()) {
                    debug!(url = %request.url, "Sensitive endpoint, not caching");
                } else {
                    self.store(&self.namespaces.api, key, &response).await;
                }
                response
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "API request failed, trying cache");
                match self.lookup(&[&self.namespaces.api], &key).await {
                    Some(hit) => hit,
                    None => synth::offline_json(&request.url),
                }
            }
        }
    }

    /// Network first, then exact match, root document, offline page.
    pub async fn navigation_network_first(&self, request: &Request) -> Response {
        let key = CacheKey::for_request(request);

        match self.network(request).await {
            Ok(response) => {
                if response.ok() {
                    self.store(&self.namespaces.dynamic, key, &response).await;
                }
                response
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Navigation failed, trying cache");
                let namespaces = self.namespaces.all();

                if let Some(hit) = self.lookup(&namespaces, &key).await {
                    return hit;
                }

                if let Ok(root) = self.config.resolve(&self.config.root_document) {
                    if let Some(hit) = self.lookup(&namespaces, &CacheKey::get(&root)).await {
                        debug!(url = %request.url, root = %root, "Serving cached root document");
                        return hit;
                    }
                }

                synth::offline_page(&request.url)
            }
        }
    }

    /// Network first, cache fallback, otherwise the failure propagates.
    pub async fn dynamic_network_first(&self, request: &Request) -> SwResult<Response> {
        let key = CacheKey::for_request(request);

        match self.network(request).await {
            Ok(response) => {
                if response.ok() {
                    self.store(&self.namespaces.dynamic, key, &response).await;
                }
                Ok(response)
            }
            Err(e) => match self.lookup(&self.namespaces.all(), &key).await {
                Some(hit) => Ok(hit),
                None => {
                    warn!(url = %request.url, error = %e, "Dynamic resource unavailable");
                    Err(SwError::Network(e))
                }
            },
        }
    }

    pub(crate) async fn network(&self, request: &Request) -> Result<Response, NetError> {
        match self.config.network_timeout() {
            Some(timeout) => with_timeout(timeout, || self.fetcher.fetch(request))
                .await
                .map_err(|_| NetError::Timeout(timeout))?,
            None => self.fetcher.fetch(request).await,
        }
    }

    async fn lookup(&self, namespaces: &[&CacheNamespace], key: &CacheKey) -> Option<Response> {
        match self.cache.match_any(namespaces, key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(url = %key.url, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, namespace: &CacheNamespace, key: CacheKey, response: &Response) {
        if let Err(e) = self.cache.put(namespace, key, response).await {
            warn!(namespace = %namespace, error = %e, "Cache write failed");
        }
    }
}
