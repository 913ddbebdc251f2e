//! # Harbor Service Worker
//!
//! Request-interception caching engine: every page request passes through
//! it and is answered from the network, a versioned cache, or a synthesized
//! offline response.
//!
//! ## Features
//!
//! - **Classification**: API, static asset, navigation, dynamic
//! - **Strategies**: cache-first and three network-first variants
//! - **Versioned caches**: stale namespaces deleted on activation
//! - **Offline fallbacks**: placeholder image, offline page, 503 JSON
//! - **Lifecycle**: installing → installed → activating → activated → redundant
//! - **Control channel**: `SKIP_WAITING`, `GET_VERSION`, `CLEAR_CACHE`
//! - **Background hooks**: push notifications, notification clicks, sync
//!
//! ## Architecture
//!
//! ```text
//! OfflineWorker
//!     ├── LifecycleController
//!     │       └── Registration (installing / waiting / activating / active)
//!     │               └── FetchStrategies (per version)
//!     │                       ├── Classifier
//!     │                       ├── CacheManager ── CacheStorage
//!     │                       └── Fetcher
//!     ├── ControlChannel
//!     ├── Clients
//!     └── BackgroundHooks
//! ```

pub mod background;
pub mod cache;
pub mod classify;
pub mod clients;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod namespace;
pub mod strategy;
pub mod synth;
pub mod worker;

#[cfg(test)]
mod testing;

pub use background::{Notification, NotificationAction, PushPayload};
pub use cache::{CacheHandle, CacheKey, CacheManager, CacheStorage, CachedEntry, MemoryCacheStorage};
pub use classify::{Classifier, RequestClass};
pub use clients::{Client, ClientType, Clients};
pub use config::EngineConfig;
pub use control::{ControlChannel, ControlEnvelope, ControlMessage, VersionReply};
pub use error::{SwError, SwResult};
pub use events::WorkerEvent;
pub use lifecycle::{LifecycleController, Registration, WorkerId, WorkerState, WorkerVersion};
pub use namespace::{CacheNamespace, CachePurpose, NamespaceSet};
pub use strategy::FetchStrategies;
pub use synth::OfflineEnvelope;
pub use worker::OfflineWorker;
