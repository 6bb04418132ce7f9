//! Event dispatch.
//!
//! Every stimulus the gateway reacts to is an [`Event`]. An [`EventHandler`]
//! has one method per event kind, and a [`Dispatcher`] matches on the event
//! and delegates, returning an [`EventOutcome`] the host can act on. Nothing
//! registers itself globally: the host owns the dispatcher and decides where
//! events come from.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use offline_gateway::cache::MemoryStorage;
//! use offline_gateway::config::GatewayConfig;
//! use offline_gateway::events::{Dispatcher, Event, LoggingClients};
//! use offline_gateway::gateway::Gateway;
//! use offline_gateway::network::HttpFetcher;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::default();
//! let network = Arc::new(HttpFetcher::new(&config)?);
//! let gateway = Gateway::new(config, Arc::new(MemoryStorage::new()), network, Arc::new(LoggingClients));
//! let dispatcher = Dispatcher::new(Arc::new(gateway));
//!
//! dispatcher.dispatch(Event::Install).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::gateway::{GatewayError, InstallReport};
use crate::http::{Request, Response};

mod notification;

pub use notification::{
    ACTION_CLOSE, ACTION_EXPLORE, Clients, LoggingClients, Notification, NotificationAction,
    NotificationClick,
};

/// Structured control messages from pages.
///
/// Wire format is `{"action": "skipWaiting"}` / `{"action": "clearCache"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlMessage {
    SkipWaiting,
    ClearCache,
    /// Any action this gateway does not know; logged and ignored.
    #[serde(other)]
    Unknown,
}

/// A background-sync registration tag, as sent by a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTag {
    pub tag: String,
}

#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Message(ControlMessage),
    /// Push delivery with its text payload, if any.
    Push(Option<String>),
    NotificationClick(NotificationClick),
    Sync(String),
    PeriodicSync(String),
}

impl Event {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Fetch(_) => "fetch",
            Self::Message(_) => "message",
            Self::Push(_) => "push",
            Self::NotificationClick(_) => "notificationclick",
            Self::Sync(_) => "sync",
            Self::PeriodicSync(_) => "periodicsync",
        }
    }
}

/// What the gateway decided about one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The gateway produced the response.
    Respond(Response),
    /// The gateway declined; the request goes to the network untouched.
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Installed(InstallReport),
    /// Activation finished; lists the generations that were deleted.
    Activated(Vec<String>),
    Fetched(FetchOutcome),
    /// The event was consumed and has nothing to report.
    Handled,
}

/// One method per event kind.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_install(&self) -> Result<InstallReport, GatewayError>;

    async fn on_activate(&self) -> Result<Vec<String>, GatewayError>;

    /// Never fails: every handled request resolves to some response.
    async fn on_fetch(&self, request: Request) -> FetchOutcome;

    async fn on_message(&self, message: ControlMessage) -> Result<(), GatewayError>;

    async fn on_push(&self, payload: Option<String>) -> Result<(), GatewayError>;

    async fn on_notification_click(&self, click: NotificationClick) -> Result<(), GatewayError>;

    async fn on_sync(&self, tag: &str) -> Result<(), GatewayError>;

    async fn on_periodic_sync(&self, tag: &str) -> Result<(), GatewayError>;
}

/// Routes events to an [`EventHandler`].
pub struct Dispatcher<H: ?Sized> {
    handler: Arc<H>,
}

impl<H: ?Sized> Clone for Dispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<H: EventHandler + ?Sized> Dispatcher<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Delivers `event` to the matching handler method.
    ///
    /// # Errors
    ///
    /// Propagates the handler's [`GatewayError`]. Fetch events never fail.
    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome, GatewayError> {
        tracing::debug!(event = event.kind(), "dispatching event");

        let outcome = match event {
            Event::Install => EventOutcome::Installed(self.handler.on_install().await?),
            Event::Activate => EventOutcome::Activated(self.handler.on_activate().await?),
            Event::Fetch(request) => EventOutcome::Fetched(self.handler.on_fetch(request).await),
            Event::Message(message) => {
                self.handler.on_message(message).await?;
                EventOutcome::Handled
            }
            Event::Push(payload) => {
                self.handler.on_push(payload).await?;
                EventOutcome::Handled
            }
            Event::NotificationClick(click) => {
                self.handler.on_notification_click(click).await?;
                EventOutcome::Handled
            }
            Event::Sync(tag) => {
                self.handler.on_sync(&tag).await?;
                EventOutcome::Handled
            }
            Event::PeriodicSync(tag) => {
                self.handler.on_periodic_sync(&tag).await?;
                EventOutcome::Handled
            }
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::http::StatusCode;

    #[test]
    fn control_messages_parse_from_action_tag() {
        let msg: ControlMessage = serde_json::from_str(r#"{"action":"skipWaiting"}"#).unwrap();
        assert_eq!(msg, ControlMessage::SkipWaiting);
        let msg: ControlMessage = serde_json::from_str(r#"{"action":"clearCache"}"#).unwrap();
        assert_eq!(msg, ControlMessage::ClearCache);
        let msg: ControlMessage = serde_json::from_str(r#"{"action":"reboot"}"#).unwrap();
        assert_eq!(msg, ControlMessage::Unknown);
        assert!(serde_json::from_str::<ControlMessage>(r#"{"verb":"clearCache"}"#).is_err());
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn on_install(&self) -> Result<InstallReport, GatewayError> {
            self.record("install");
            Ok(InstallReport::default())
        }

        async fn on_activate(&self) -> Result<Vec<String>, GatewayError> {
            self.record("activate");
            Ok(vec!["site-v1".into()])
        }

        async fn on_fetch(&self, request: Request) -> FetchOutcome {
            self.record(format!("fetch {}", request.path()));
            FetchOutcome::Respond(Response::new(StatusCode::Ok))
        }

        async fn on_message(&self, message: ControlMessage) -> Result<(), GatewayError> {
            self.record(format!("message {message:?}"));
            Ok(())
        }

        async fn on_push(&self, payload: Option<String>) -> Result<(), GatewayError> {
            self.record(format!("push {}", payload.unwrap_or_default()));
            Ok(())
        }

        async fn on_notification_click(&self, click: NotificationClick) -> Result<(), GatewayError> {
            self.record(format!("click {}", click.action.unwrap_or_default()));
            Ok(())
        }

        async fn on_sync(&self, tag: &str) -> Result<(), GatewayError> {
            self.record(format!("sync {tag}"));
            Ok(())
        }

        async fn on_periodic_sync(&self, tag: &str) -> Result<(), GatewayError> {
            self.record(format!("periodicsync {tag}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatcher_delegates_each_kind() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(Arc::clone(&recorder));

        let request = Request::get("http://localhost/about").unwrap();
        let events = vec![
            Event::Install,
            Event::Activate,
            Event::Fetch(request),
            Event::Message(ControlMessage::ClearCache),
            Event::Push(Some("hi".into())),
            Event::NotificationClick(NotificationClick {
                action: Some(ACTION_EXPLORE.into()),
                tag: None,
            }),
            Event::Sync("sync-messages".into()),
            Event::PeriodicSync("update-content".into()),
        ];

        let mut outcomes = Vec::new();
        for event in events {
            outcomes.push(dispatcher.dispatch(event).await.unwrap());
        }

        assert_eq!(outcomes[0], EventOutcome::Installed(InstallReport::default()));
        assert_eq!(outcomes[1], EventOutcome::Activated(vec!["site-v1".into()]));
        assert!(matches!(outcomes[2], EventOutcome::Fetched(FetchOutcome::Respond(_))));
        assert!(outcomes[3..].iter().all(|o| *o == EventOutcome::Handled));

        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "install",
                "activate",
                "fetch /about",
                "message ClearCache",
                "push hi",
                "click explore",
                "sync sync-messages",
                "periodicsync update-content",
            ]
        );
    }
}
