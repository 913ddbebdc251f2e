//! Cache storage and namespace management.
//!
//! ```text
//! CacheManager
//!     └── CacheStorage (trait; MemoryCacheStorage in-process)
//!             └── namespace name → (method, url) → CachedEntry
//! ```
//!
//! Entries carry no size or age policy: they live until their namespace is
//! deleted on a version bump or by an explicit clear. Writes to the same key
//! race and the last one wins.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use harbor_net::{Request, Response, ResponseSource};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SwError, SwResult};
use crate::namespace::CacheNamespace;

// ==================== Entries ====================

/// Lookup key of a cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    pub fn new(method: &http::Method, url: &Url) -> Self {
        Self {
            method: method.as_str().to_string(),
            url: url.as_str().to_string(),
        }
    }

    /// GET key for a URL.
    pub fn get(url: &Url) -> Self {
        Self::new(&http::Method::GET, url)
    }

    pub fn for_request(request: &Request) -> Self {
        Self::new(&request.method, &request.url)
    }
}

/// A stored response snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    /// Request method.
    pub method: String,

    /// Request URL.
    pub url: String,

    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: Vec<(String, String)>,

    /// Response body.
    pub body: Bytes,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CachedEntry {
    /// Snapshot a response. Takes a duplicate so the caller keeps the original.
    pub fn snapshot(key: &CacheKey, response: &Response) -> Self {
        let copy = response.duplicate();
        let headers = copy
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            method: key.method.clone(),
            url: key.url.clone(),
            status: copy.status.as_u16(),
            headers,
            body: copy.bytes(),
            cached_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
        }
    }

    /// Rebuild a response served from cache.
    pub fn to_response(&self) -> SwResult<Response> {
        let url = Url::parse(&self.url).map_err(|e| SwError::Cache(e.to_string()))?;
        let status = StatusCode::from_u16(self.status).map_err(|e| SwError::Cache(e.to_string()))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(n), Ok(v)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                headers.append(n, v);
            }
        }

        Ok(Response::new(url, status, headers, self.body.clone())
            .with_source(ResponseSource::Cache))
    }
}

// ==================== Storage ====================

/// Key-value cache storage capability.
///
/// `put` creates the namespace when it does not exist yet.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the namespace if absent.
    async fn open(&self, name: &str) -> SwResult<()>;

    async fn has(&self, name: &str) -> SwResult<bool>;

    /// Delete a namespace with all its entries.
    async fn delete(&self, name: &str) -> SwResult<bool>;

    /// Names of all existing namespaces.
    async fn keys(&self) -> SwResult<Vec<String>>;

    async fn match_entry(&self, name: &str, key: &CacheKey) -> SwResult<Option<CachedEntry>>;

    async fn put(&self, name: &str, key: CacheKey, entry: CachedEntry) -> SwResult<()>;
}

/// In-process cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<HashMap<String, HashMap<CacheKey, CachedEntry>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a namespace.
    pub async fn len(&self, name: &str) -> usize {
        self.caches
            .read()
            .await
            .get(name)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> SwResult<()> {
        self.caches
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn has(&self, name: &str) -> SwResult<bool> {
        Ok(self.caches.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> SwResult<bool> {
        Ok(self.caches.write().await.remove(name).is_some())
    }

    async fn keys(&self) -> SwResult<Vec<String>> {
        Ok(self.caches.read().await.keys().cloned().collect())
    }

    async fn match_entry(&self, name: &str, key: &CacheKey) -> SwResult<Option<CachedEntry>> {
        Ok(self
            .caches
            .read()
            .await
            .get(name)
            .and_then(|cache| cache.get(key))
            .cloned())
    }

    async fn put(&self, name: &str, key: CacheKey, entry: CachedEntry) -> SwResult<()> {
        self.caches
            .write()
            .await
            .entry(name.to_string())
            .or_default()
            .insert(key, entry);
        Ok(())
    }
}

// ==================== Manager ====================

/// An opened namespace.
#[derive(Clone)]
pub struct CacheHandle {
    storage: Arc<dyn CacheStorage>,
    name: String,
}

impl CacheHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn match_entry(&self, key: &CacheKey) -> SwResult<Option<Response>> {
        match self.storage.match_entry(&self.name, key).await? {
            Some(entry) => entry.to_response().map(Some),
            None => Ok(None),
        }
    }

    pub async fn put(&self, key: CacheKey, response: &Response) -> SwResult<()> {
        let entry = CachedEntry::snapshot(&key, response);
        self.storage.put(&self.name, key, entry).await
    }
}

/// Namespace-level operations over a [`CacheStorage`].
#[derive(Clone)]
pub struct CacheManager {
    storage: Arc<dyn CacheStorage>,
}

impl CacheManager {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self { storage }
    }

    /// Open a namespace, creating it if needed. Idempotent.
    pub async fn open(&self, namespace: &CacheNamespace) -> SwResult<CacheHandle> {
        self.storage.open(&namespace.name).await?;
        Ok(CacheHandle {
            storage: Arc::clone(&self.storage),
            name: namespace.name.clone(),
        })
    }

    /// Look up a key in one namespace.
    pub async fn match_entry(
        &self,
        namespace: &CacheNamespace,
        key: &CacheKey,
    ) -> SwResult<Option<Response>> {
        match self.storage.match_entry(&namespace.name, key).await? {
            Some(entry) => {
                debug!(namespace = %namespace, url = %key.url, "Cache hit");
                entry.to_response().map(Some)
            }
            None => Ok(None),
        }
    }

    /// Look up a key across namespaces, first hit wins.
    pub async fn match_any(
        &self,
        namespaces: &[&CacheNamespace],
        key: &CacheKey,
    ) -> SwResult<Option<Response>> {
        for namespace in namespaces {
            if let Some(response) = self.match_entry(namespace, key).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    /// Store a snapshot of `response`; the caller keeps the original.
    pub async fn put(
        &self,
        namespace: &CacheNamespace,
        key: CacheKey,
        response: &Response,
    ) -> SwResult<()> {
        debug!(
            namespace = %namespace,
            url = %key.url,
            status = %response.status,
            "Caching response"
        );
        let entry = CachedEntry::snapshot(&key, response);
        self.storage.put(&namespace.name, key, entry).await
    }

    /// Delete every namespace not named in `allowed`. Returns the deleted names.
    pub async fn delete_stale(&self, allowed: &[String]) -> SwResult<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if allowed.contains(&name) {
                continue;
            }
            if self.storage.delete(&name).await? {
                info!(namespace = %name, "Deleted stale cache");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Delete one namespace. False if it did not exist.
    pub async fn delete(&self, name: &str) -> SwResult<bool> {
        self.storage.delete(name).await
    }

    /// Delete every namespace. Returns how many were removed.
    pub async fn clear_all(&self) -> SwResult<usize> {
        let mut count = 0;
        for name in self.storage.keys().await? {
            match self.storage.delete(&name).await {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => warn!(namespace = %name, error = %e, "Failed to delete cache"),
            }
        }
        info!(count, "Cleared all caches");
        Ok(count)
    }

    /// Names of all existing namespaces.
    pub async fn namespaces(&self) -> SwResult<Vec<String>> {
        self.storage.keys().await
    }

    pub async fn has(&self, name: &str) -> SwResult<bool> {
        self.storage.has(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::CachePurpose;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn response(u: &str, body: &'static str) -> Response {
        Response::with_content_type(url(u), StatusCode::OK, "text/css", body)
    }

    fn manager() -> CacheManager {
        CacheManager::new(Arc::new(MemoryCacheStorage::new()))
    }

    fn ns(name: &str) -> CacheNamespace {
        CacheNamespace::new(name, "v1", CachePurpose::Static)
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let cache = manager();
        let static_ns = ns("static");

        cache.open(&static_ns).await.unwrap();
        let handle = cache.open(&static_ns).await.unwrap();

        assert_eq!(handle.name(), "static-v1");
        assert_eq!(cache.namespaces().await.unwrap(), vec!["static-v1"]);
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let cache = manager();
        let static_ns = ns("static");
        let original = response("https://example.com/css/style.css", "body{}");
        let key = CacheKey::get(&original.url);

        cache.put(&static_ns, key.clone(), &original).await.unwrap();

        // The original stays readable after the put.
        assert_eq!(original.text().unwrap(), "body{}");

        let hit = cache.match_entry(&static_ns, &key).await.unwrap().unwrap();
        assert_eq!(hit.source, ResponseSource::Cache);
        assert_eq!(hit.header("content-type"), Some("text/css"));
        assert_eq!(hit.text().unwrap(), "body{}");
    }

    #[tokio::test]
    async fn test_key_includes_method() {
        let cache = manager();
        let static_ns = ns("static");
        let u = url("https://example.com/a.js");

        cache
            .put(&static_ns, CacheKey::get(&u), &response(u.as_str(), "a"))
            .await
            .unwrap();

        let head = CacheKey::new(&http::Method::HEAD, &u);
        assert!(cache.match_entry(&static_ns, &head).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = manager();
        let dynamic = ns("dynamic");
        let u = "https://example.com/feed";
        let key = CacheKey::get(&url(u));

        cache.put(&dynamic, key.clone(), &response(u, "old")).await.unwrap();
        cache.put(&dynamic, key.clone(), &response(u, "new")).await.unwrap();

        let hit = cache.match_entry(&dynamic, &key).await.unwrap().unwrap();
        assert_eq!(hit.text().unwrap(), "new");
    }

    #[tokio::test]
    async fn test_match_any_respects_order() {
        let cache = manager();
        let first = ns("static");
        let second = ns("dynamic");
        let u = "https://example.com/";
        let key = CacheKey::get(&url(u));

        cache.put(&second, key.clone(), &response(u, "second")).await.unwrap();
        cache.put(&first, key.clone(), &response(u, "first")).await.unwrap();

        let hit = cache.match_any(&[&first, &second], &key).await.unwrap().unwrap();
        assert_eq!(hit.text().unwrap(), "first");
    }

    #[tokio::test]
    async fn test_delete_stale() {
        let cache = manager();
        for name in ["static-v1", "dynamic-v1", "static-v2"] {
            cache
                .open(&CacheNamespace {
                    name: name.to_string(),
                    purpose: CachePurpose::Static,
                })
                .await
                .unwrap();
        }

        let mut deleted = cache.delete_stale(&["static-v2".to_string()]).await.unwrap();
        deleted.sort();

        assert_eq!(deleted, vec!["dynamic-v1", "static-v1"]);
        assert_eq!(cache.namespaces().await.unwrap(), vec!["static-v2"]);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let cache = manager();
        cache.open(&ns("static")).await.unwrap();
        cache.open(&ns("api")).await.unwrap();

        assert_eq!(cache.clear_all().await.unwrap(), 2);
        assert!(cache.namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_creates_namespace_lazily() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let cache = CacheManager::new(storage.clone());
        let api = ns("api");
        let u = "https://example.com/api/items";

        assert!(!cache.has("api-v1").await.unwrap());
        cache
            .put(&api, CacheKey::get(&url(u)), &response(u, "[]"))
            .await
            .unwrap();

        assert!(cache.has("api-v1").await.unwrap());
        assert_eq!(storage.len("api-v1").await, 1);
    }

    #[test]
    fn test_entry_roundtrips_through_json() {
        let original = response("https://example.com/css/style.css", "body{}");
        let key = CacheKey::get(&original.url);
        let entry = CachedEntry::snapshot(&key, &original);

        let json = serde_json::to_string(&entry).unwrap();
        let back: CachedEntry = serde_json::from_str(&json).unwrap();
        let rebuilt = back.to_response().unwrap();

        assert_eq!(rebuilt.status, StatusCode::OK);
        assert_eq!(rebuilt.text().unwrap(), "body{}");
    }
}
