//! The offline cache gateway.
//!
//! A [`Gateway`] owns the generation naming and eviction policy on top of a
//! [`CacheStorage`], talks to the network through a [`Fetch`] collaborator,
//! and resolves every intercepted request to a response.
//!
//! ## Lifecycle
//!
//! ```text
//! parsed ──install()──▶ installing ──▶ installed ──activate()──▶ activating ──▶ active
//! ```
//!
//! - Install opens the current generation and requests every manifest entry.
//!   Individual failures are recorded in the [`InstallReport`], never fatal.
//! - With `skip_waiting` configured (or a `skipWaiting` message received)
//!   activation follows immediately; otherwise the gateway waits in `installed`.
//! - Activation deletes every generation that is not current or runtime, then
//!   claims all clients.
//! - Only an `active` gateway handles fetches; earlier, requests pass through.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use url::Url;

use crate::cache::{CacheError, CacheStorage};
use crate::config::{CacheNames, ConfigError, GatewayConfig};
use crate::events::{
    Clients, ControlMessage, EventHandler, FetchOutcome, Notification, NotificationClick,
};
use crate::http::{Method, Request};
use crate::network::Fetch;

mod background;
pub mod route;
mod strategy;

use background::Background;
pub use route::{PassReason, RequestClass, Route, Strategy};

/// Background-sync tag for queued outbound messages.
pub const SYNC_MESSAGES: &str = "sync-messages";
/// Periodic-sync tag that refreshes pre-warmed routes.
pub const UPDATE_CONTENT: &str = "update-content";

/// Errors surfaced by lifecycle and control operations.
///
/// Fetch handling has no error type: it always yields a response.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: LifecycleState,
    },

    #[error("cache storage error: {0}")]
    Cache(#[from] CacheError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
        })
    }
}

/// Result of one best-effort precache pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// URLs stored in the current generation.
    pub cached: Vec<String>,
    /// URLs that could not be stored, with the reason.
    pub failed: Vec<(String, String)>,
}

pub struct Gateway {
    config: Arc<GatewayConfig>,
    names: CacheNames,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Fetch>,
    clients: Arc<dyn Clients>,
    state: watch::Sender<LifecycleState>,
    skip_requested: AtomicBool,
    background: Background,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Fetch>,
        clients: Arc<dyn Clients>,
    ) -> Self {
        let names = config.cache_names();
        let (state, _) = watch::channel(LifecycleState::Parsed);
        Self {
            config: Arc::new(config),
            names,
            storage,
            network,
            clients,
            state,
            skip_requested: AtomicBool::new(false),
            background: Background::default(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn cache_names(&self) -> &CacheNames {
        &self.names
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watches lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Detached revalidations still tracked.
    pub fn pending_background(&self) -> usize {
        self.background.pending()
    }

    /// Waits for every detached revalidation spawned so far.
    pub async fn drain_background(&self) {
        self.background.drain().await;
    }

    fn transition(&self, next: LifecycleState) {
        tracing::info!(from = %self.state(), to = %next, "lifecycle transition");
        self.state.send_replace(next);
    }

    /// Creates the current generation and precaches the manifests.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InvalidTransition`] unless the gateway is freshly parsed;
    /// [`GatewayError::Cache`] if the generation cannot be opened. Failed
    /// manifest items are reported, not returned as errors.
    pub async fn install(&self) -> Result<InstallReport, GatewayError> {
        let state = self.state();
        if state != LifecycleState::Parsed {
            return Err(GatewayError::InvalidTransition {
                action: "install",
                state,
            });
        }

        let mut urls = Vec::new();
        for path in &self.config.static_assets {
            urls.push(self.config.resolve(path)?);
        }
        for resource in &self.config.external_resources {
            let url = Url::parse(resource).map_err(|e| ConfigError::Invalid {
                field: "external_resources".into(),
                reason: format!("{resource:?}: {e}"),
            })?;
            urls.push(url);
        }
        for route in &self.config.dynamic_routes {
            urls.push(self.config.resolve(route)?);
        }

        self.transition(LifecycleState::Installing);

        if let Err(e) = self.storage.open(&self.names.current).await {
            self.transition(LifecycleState::Parsed);
            return Err(e.into());
        }

        let report = self.precache(urls).await;
        tracing::info!(
            cache = %self.names.current,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "installation complete"
        );
        self.transition(LifecycleState::Installed);

        if self.config.skip_waiting || self.skip_requested.load(Ordering::SeqCst) {
            self.activate().await?;
        }

        Ok(report)
    }

    /// Fetches every URL concurrently into the current generation.
    async fn precache(&self, urls: Vec<Url>) -> InstallReport {
        let results = join_all(urls.into_iter().map(|url| self.precache_one(url))).await;

        let mut report = InstallReport::default();
        for result in results {
            match result {
                Ok(url) => report.cached.push(url),
                Err((url, reason)) => {
                    tracing::warn!(%url, %reason, "failed to precache");
                    report.failed.push((url, reason));
                }
            }
        }
        report
    }

    async fn precache_one(&self, url: Url) -> Result<String, (String, String)> {
        let key = url.to_string();
        let request = Request::new(Method::Get, url);

        let response = match self.network.fetch(&request).await {
            Ok(response) if response.is_cacheable() => response,
            Ok(response) => return Err((key, format!("status {}", response.status()))),
            Err(e) => return Err((key, e.to_string())),
        };

        self.storage
            .put(&self.names.current, &request, response)
            .await
            .map_err(|e| (key.clone(), e.to_string()))?;
        Ok(key)
    }

    /// Deletes superseded generations and takes control of all clients.
    ///
    /// Returns the deleted generation names. Only one caller moves the
    /// gateway out of `Installed`; activating while that is in progress, or
    /// once active, is a no-op.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InvalidTransition`] before install has finished;
    /// [`GatewayError::Cache`] if listing or deleting generations fails.
    pub async fn activate(&self) -> Result<Vec<String>, GatewayError> {
        let mut observed = LifecycleState::Installed;
        let claimed = self.state.send_if_modified(|state| {
            observed = *state;
            if *state == LifecycleState::Installed {
                *state = LifecycleState::Activating;
                true
            } else {
                false
            }
        });
        if !claimed {
            return match observed {
                LifecycleState::Activating | LifecycleState::Active => {
                    tracing::debug!(state = %observed, "activation already handled");
                    Ok(Vec::new())
                }
                state => Err(GatewayError::InvalidTransition {
                    action: "activate",
                    state,
                }),
            };
        }
        tracing::info!(
            from = %LifecycleState::Installed,
            to = %LifecycleState::Activating,
            "lifecycle transition"
        );

        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if self.names.is_live(&name) {
                continue;
            }
            tracing::info!(cache = %name, "deleting old cache");
            if self.storage.delete(&name).await? {
                deleted.push(name);
            }
        }

        self.transition(LifecycleState::Active);
        self.clients.claim().await;
        Ok(deleted)
    }

    /// Leaves the waiting phase: activates now if installed, or right after install if still installing.
    pub async fn skip_waiting(&self) -> Result<(), GatewayError> {
        self.skip_requested.store(true, Ordering::SeqCst);
        if self.state() == LifecycleState::Installed {
            self.activate().await?;
        }
        Ok(())
    }

    /// Deletes every cache generation, live ones included.
    pub async fn clear_caches(&self) -> Result<Vec<String>, GatewayError> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if self.storage.delete(&name).await? {
                deleted.push(name);
            }
        }
        tracing::info!(count = deleted.len(), "cleared all caches");
        Ok(deleted)
    }

    /// Resolves one intercepted request.
    pub async fn handle_fetch(&self, request: Request) -> FetchOutcome {
        if self.state() != LifecycleState::Active {
            tracing::debug!(url = %request.url(), state = %self.state(), "not active, passing through");
            return FetchOutcome::PassThrough;
        }

        match route::route(&self.config, &request) {
            Route::PassThrough(reason) => {
                tracing::debug!(url = %request.url(), ?reason, "passing through");
                FetchOutcome::PassThrough
            }
            Route::Handle { strategy, .. } => {
                let response = match strategy {
                    Strategy::CacheFirst => self.cache_first(&request).await,
                    Strategy::NetworkFirst => self.network_first(&request).await,
                    Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
                };
                FetchOutcome::Respond(response)
            }
        }
    }

    /// Shows the push notification.
    pub async fn push(&self, payload: Option<String>) {
        let body = payload
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.config.notification_body.clone());
        let notification = Notification::for_push(
            &self.config.site_name,
            &body,
            &self.config.notification_icon,
            &self.config.notification_tag,
        );
        self.clients.show_notification(&notification).await;
    }

    /// Closes the clicked notification and, unless it was dismissed, brings up the site root.
    pub async fn notification_click(&self, click: NotificationClick) -> Result<(), GatewayError> {
        let tag = click
            .tag
            .as_deref()
            .unwrap_or(&self.config.notification_tag);
        self.clients.close_notification(tag).await;

        if click.dismisses_only() {
            return Ok(());
        }

        let root = self.config.resolve("/")?;
        if !self.clients.focus(&root).await {
            self.clients.open_window(&root).await;
        }
        Ok(())
    }

    /// Re-fetches the pre-warmed routes into the current generation.
    pub async fn refresh_routes(&self) -> Result<InstallReport, GatewayError> {
        let mut urls = Vec::with_capacity(self.config.dynamic_routes.len());
        for route in &self.config.dynamic_routes {
            urls.push(self.config.resolve(route)?);
        }
        let report = self.precache(urls).await;
        tracing::info!(cached = report.cached.len(), failed = report.failed.len(), "content updated");
        Ok(report)
    }
}

#[async_trait]
impl EventHandler for Gateway {
    async fn on_install(&self) -> Result<InstallReport, GatewayError> {
        self.install().await
    }

    async fn on_activate(&self) -> Result<Vec<String>, GatewayError> {
        self.activate().await
    }

    async fn on_fetch(&self, request: Request) -> FetchOutcome {
        self.handle_fetch(request).await
    }

    async fn on_message(&self, message: ControlMessage) -> Result<(), GatewayError> {
        tracing::info!(?message, "message received");
        match message {
            ControlMessage::SkipWaiting => self.skip_waiting().await,
            ControlMessage::ClearCache => self.clear_caches().await.map(|_| ()),
            ControlMessage::Unknown => {
                tracing::warn!("ignoring unknown control message");
                Ok(())
            }
        }
    }

    async fn on_push(&self, payload: Option<String>) -> Result<(), GatewayError> {
        self.push(payload).await;
        Ok(())
    }

    async fn on_notification_click(&self, click: NotificationClick) -> Result<(), GatewayError> {
        self.notification_click(click).await
    }

    async fn on_sync(&self, tag: &str) -> Result<(), GatewayError> {
        if tag == SYNC_MESSAGES {
            tracing::info!(tag, "no queued messages to sync");
        } else {
            tracing::warn!(tag, "ignoring unknown sync tag");
        }
        Ok(())
    }

    async fn on_periodic_sync(&self, tag: &str) -> Result<(), GatewayError> {
        if tag == UPDATE_CONTENT {
            self.refresh_routes().await.map(|_| ())
        } else {
            tracing::warn!(tag, "ignoring unknown periodic sync tag");
            Ok(())
        }
    }
}
