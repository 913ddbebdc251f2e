//! Events the engine reports to its host.

use url::Url;

use crate::background::Notification;
use crate::lifecycle::{WorkerId, WorkerState};

/// Engine events, delivered over an unbounded channel.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A version changed lifecycle state.
    StateChange {
        worker_id: WorkerId,
        version: String,
        state: WorkerState,
    },
    /// A page is now controlled by a different version.
    ControllerChange {
        client_id: String,
        worker_id: WorkerId,
    },
    /// Show a user-visible notification.
    ShowNotification(Notification),
    /// A notification was dismissed without opening anything.
    NotificationClosed { tag: String },
    /// A window was opened from a notification click.
    WindowOpened { client_id: String, url: Url },
    /// The background sync hook ran.
    SyncCompleted { tag: String },
}
