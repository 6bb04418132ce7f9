//! Notifications and the client-window collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// Action id that opens or focuses the site.
pub const ACTION_EXPLORE: &str = "explore";
/// Action id that only dismisses the notification.
pub const ACTION_CLOSE: &str = "close";

/// Vibration pattern in milliseconds: buzz, pause, buzz.
const VIBRATE_PATTERN: [u32; 3] = [200, 100, 200];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// A user-visible notification, shaped like the Notifications API options bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub tag: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// Builds the push notification with the fixed `explore` / `close` actions.
    pub fn for_push(title: &str, body: &str, icon: &str, tag: &str) -> Self {
        let action = |id: &str, label: &str| NotificationAction {
            action: id.to_owned(),
            title: label.to_owned(),
            icon: icon.to_owned(),
        };

        Self {
            title: title.to_owned(),
            body: body.to_owned(),
            icon: icon.to_owned(),
            badge: icon.to_owned(),
            vibrate: VIBRATE_PATTERN.to_vec(),
            tag: tag.to_owned(),
            require_interaction: false,
            actions: vec![action(ACTION_EXPLORE, "View"), action(ACTION_CLOSE, "Close")],
        }
    }
}

/// A click on a notification or one of its action buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationClick {
    /// The action button pressed; `None` for a click on the notification body.
    #[serde(default)]
    pub action: Option<String>,
    /// Tag of the clicked notification.
    #[serde(default)]
    pub tag: Option<String>,
}

impl NotificationClick {
    pub fn dismisses_only(&self) -> bool {
        self.action.as_deref() == Some(ACTION_CLOSE)
    }
}

/// The pages and notification surface the gateway controls.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Takes control of every open page without waiting for a reload.
    async fn claim(&self);

    async fn show_notification(&self, notification: &Notification);

    async fn close_notification(&self, tag: &str);

    /// Focuses an open page at `url`. Returns `false` if none is open.
    async fn focus(&self, url: &Url) -> bool;

    async fn open_window(&self, url: &Url);
}

/// [`Clients`] for a headless host: every interaction becomes a log line.
#[derive(Debug, Default)]
pub struct LoggingClients;

#[async_trait]
impl Clients for LoggingClients {
    async fn claim(&self) {
        tracing::info!("claimed all clients");
    }

    async fn show_notification(&self, notification: &Notification) {
        match serde_json::to_string(notification) {
            Ok(json) => tracing::info!(notification = %json, "showing notification"),
            Err(e) => tracing::warn!(error = %e, title = %notification.title, "showing notification"),
        }
    }

    async fn close_notification(&self, tag: &str) {
        tracing::info!(tag, "closing notification");
    }

    async fn focus(&self, url: &Url) -> bool {
        tracing::debug!(%url, "no window to focus");
        false
    }

    async fn open_window(&self, url: &Url) {
        tracing::info!(%url, "opening window");
    }
}
