//! Page → engine control messages.
//!
//! Wire format: `{"type": "SKIP_WAITING"}`, `{"type": "GET_VERSION"}`,
//! `{"type": "CLEAR_CACHE"}`. Only `GET_VERSION` replies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cache::CacheManager;
use crate::error::{SwError, SwResult};
use crate::lifecycle::LifecycleController;

/// A control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting version now.
    SkipWaiting,
    /// Reply with the active version.
    GetVersion,
    /// Delete every cache namespace.
    ClearCache,
}

impl ControlMessage {
    pub fn from_json(json: &str) -> SwResult<Self> {
        serde_json::from_str(json).map_err(|e| SwError::InvalidMessage(e.to_string()))
    }
}

/// Reply to `GET_VERSION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    pub version: String,
}

/// A message plus its optional reply port.
#[derive(Debug)]
pub struct ControlEnvelope {
    pub message: ControlMessage,
    pub reply: Option<oneshot::Sender<VersionReply>>,
}

impl ControlEnvelope {
    pub fn new(message: ControlMessage) -> Self {
        Self {
            message,
            reply: None,
        }
    }

    /// Envelope with a reply port and the receiving end.
    pub fn with_reply(message: ControlMessage) -> (Self, oneshot::Receiver<VersionReply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                message,
                reply: Some(tx),
            },
            rx,
        )
    }
}

/// Dispatches control messages.
#[derive(Clone)]
pub struct ControlChannel {
    lifecycle: Arc<LifecycleController>,
    cache: CacheManager,
}

impl ControlChannel {
    pub fn new(lifecycle: Arc<LifecycleController>, cache: CacheManager) -> Self {
        Self { lifecycle, cache }
    }

    /// Handle one message.
    pub async fn dispatch(&self, envelope: ControlEnvelope) -> SwResult<()> {
        debug!(message = ?envelope.message, "Control message");

        match envelope.message {
            ControlMessage::SkipWaiting => {
                if !self.lifecycle.skip_waiting().await {
                    debug!("SKIP_WAITING with no waiting version");
                }
            }
            ControlMessage::GetVersion => {
                let Some(reply) = envelope.reply else {
                    warn!("GET_VERSION without a reply port");
                    return Ok(());
                };
                // No active version means nobody answers; the port is dropped.
                if let Some(version) = self.lifecycle.active_version().await {
                    let _ = reply.send(VersionReply { version });
                }
            }
            ControlMessage::ClearCache => {
                let count = self.cache.clear_all().await?;
                info!(count, "CLEAR_CACHE handled");
            }
        }
        Ok(())
    }

    /// Parse a JSON message and dispatch it.
    pub async fn dispatch_json(
        &self,
        json: &str,
        reply: Option<oneshot::Sender<VersionReply>>,
    ) -> SwResult<()> {
        let message = ControlMessage::from_json(json)?;
        self.dispatch(ControlEnvelope { message, reply }).await
    }

    /// Handle messages in arrival order until every sender is dropped.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<ControlEnvelope>) {
        while let Some(envelope) = rx.recv().await {
            if let Err(e) = self.dispatch(envelope).await {
                warn!(error = %e, "Control message failed");
            }
        }
        debug!("Control channel closed");
    }
}
