//! Push, notification click and background sync hooks.
//!
//! These run outside the fetch path and never touch in-flight strategies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::clients::{Client, Clients};
use crate::config::EngineConfig;
use crate::error::{SwError, SwResult};
use crate::events::WorkerEvent;
use crate::lifecycle::WorkerId;

pub const ACTION_OPEN: &str = "open";
pub const ACTION_CLOSE: &str = "close";

/// Push message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub url: String,
}

impl Default for PushPayload {
    fn default() -> Self {
        Self {
            title: "Harbor".to_string(),
            body: String::new(),
            url: "/".to_string(),
        }
    }
}

impl PushPayload {
    /// Parse push data. Missing data gives the default payload.
    pub fn parse(data: Option<&[u8]>) -> SwResult<Self> {
        match data {
            None => Ok(Self::default()),
            Some(bytes) if bytes.is_empty() => Ok(Self::default()),
            Some(bytes) => serde_json::from_slice(bytes)
                .map_err(|e| SwError::InvalidMessage(format!("push payload: {e}"))),
        }
    }
}

/// A notification button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub tag: String,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    /// URL to open on click, from the push payload.
    pub url: String,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    pub fn from_payload(payload: PushPayload, icon: Option<String>) -> Self {
        Self {
            tag: format!("push-{}", payload.url),
            title: payload.title,
            body: payload.body,
            icon,
            url: payload.url,
            actions: vec![
                NotificationAction {
                    action: ACTION_OPEN.to_string(),
                    title: "Open".to_string(),
                },
                NotificationAction {
                    action: ACTION_CLOSE.to_string(),
                    title: "Close".to_string(),
                },
            ],
        }
    }
}

/// Background event handlers.
#[derive(Clone)]
pub struct BackgroundHooks {
    clients: Arc<RwLock<Clients>>,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl BackgroundHooks {
    pub fn new(clients: Arc<RwLock<Clients>>, events: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self { clients, events }
    }

    /// Show a notification for a push message.
    pub fn push(&self, config: &EngineConfig, data: Option<&[u8]>) -> SwResult<Notification> {
        let payload = PushPayload::parse(data)?;
        let notification = Notification::from_payload(payload, config.notification_icon.clone());
        info!(title = %notification.title, "Showing push notification");
        let _ = self
            .events
            .send(WorkerEvent::ShowNotification(notification.clone()));
        Ok(notification)
    }

    /// Handle a click. `close` only dismisses; anything else opens the URL.
    pub async fn notification_click(
        &self,
        config: &EngineConfig,
        controller: Option<WorkerId>,
        notification: &Notification,
        action: Option<&str>,
    ) -> SwResult<Option<Client>> {
        if action == Some(ACTION_CLOSE) {
            debug!(tag = %notification.tag, "Notification closed");
            let _ = self.events.send(WorkerEvent::NotificationClosed {
                tag: notification.tag.clone(),
            });
            return Ok(None);
        }

        let url = resolve_target(config, &notification.url)?;
        let client = self.clients.write().await.open_window(url.clone(), controller);
        info!(url = %url, client = %client.id, "Opened window from notification");
        let _ = self.events.send(WorkerEvent::WindowOpened {
            client_id: client.id.clone(),
            url,
        });
        Ok(Some(client))
    }

    /// Background sync hook.
    pub async fn sync(&self, config: &EngineConfig, tag: &str) -> SwResult<()> {
        if tag != config.sync_tag {
            debug!(tag, "Ignoring unknown sync tag");
            return Ok(());
        }
        self.do_background_sync(tag).await;
        Ok(())
    }

    // TODO: replay requests queued while offline once the outbox store exists.
    async fn do_background_sync(&self, tag: &str) {
        info!(tag, "Background sync");
        let _ = self.events.send(WorkerEvent::SyncCompleted {
            tag: tag.to_string(),
        });
    }
}

/// Resolve a notification URL against the origin. Absolute URLs pass through.
fn resolve_target(config: &EngineConfig, target: &str) -> SwResult<Url> {
    config.resolve(target).map_err(|e| {
        warn!(target, error = %e, "Bad notification URL");
        SwError::InvalidMessage(format!("notification url {target:?}: {e}"))
    })
}
