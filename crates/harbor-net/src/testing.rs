//! Scripted origin for tests of code built on [`Fetcher`].
//!
//! Enabled by the `testing` feature. Routes are keyed by path relative to
//! one origin; unknown paths answer 404 and the whole origin can be taken
//! offline, which makes every fetch fail with [`NetError::Offline`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use http::StatusCode;
use url::Url;

use crate::{Fetcher, NetError, Request, Response};

#[derive(Debug, Clone)]
struct Route {
    status: StatusCode,
    content_type: &'static str,
    body: String,
}

/// Network double with a call counter and an offline switch.
#[derive(Debug)]
pub struct ScriptedFetcher {
    origin: Url,
    routes: Mutex<HashMap<String, Route>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            routes: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Answer `path` with a 200.
    pub fn serve(&self, path: &str, content_type: &'static str, body: &str) {
        self.route(path, 200, content_type, body);
    }

    /// Answer `path` with the given status.
    ///
    /// # Panics
    ///
    /// If `path` does not resolve against the origin or `status` is not a
    /// valid HTTP status.
    pub fn route(&self, path: &str, status: u16, content_type: &'static str, body: &str) {
        let route = Route {
            status: StatusCode::from_u16(status).expect("valid status code"),
            content_type,
            body: body.to_string(),
        };
        self.routes().insert(self.key(path), route);
    }

    /// Forget `path`; it answers 404 afterwards.
    pub fn unserve(&self, path: &str) {
        self.routes().remove(&self.key(path));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fetches attempted so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    fn key(&self, path: &str) -> String {
        self.origin
            .join(path)
            .expect("path resolves against the origin")
            .to_string()
    }

    fn routes(&self) -> MutexGuard<'_, HashMap<String, Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetError::Offline);
        }
        // Let concurrent fetches interleave.
        tokio::task::yield_now().await;

        let route = self.routes().get(request.url.as_str()).cloned();
        Ok(match route {
            Some(route) => Response::with_content_type(
                request.url.clone(),
                route.status,
                route.content_type,
                route.body,
            ),
            None => Response::with_content_type(
                request.url.clone(),
                StatusCode::NOT_FOUND,
                "text/plain",
                "not found",
            ),
        })
    }
}
