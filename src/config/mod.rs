//! Gateway configuration with layered loading.
//!
//! Everything the gateway treats as fixed for the lifetime of a deployment
//! lives here: the generation version, the install-time manifests, and the
//! path prefixes that drive request classification. A [`GatewayConfig`] is
//! built once, validated, and handed to the gateway behind an `Arc`; nothing
//! mutates it afterwards.
//!
//! Sources, highest precedence first:
//!
//! 1. Environment variables (`OFFLINE_GATEWAY_*`)
//! 2. TOML config file (explicit path, or `OFFLINE_GATEWAY_CONFIG_FILE`)
//! 3. Built-in defaults

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Environment prefix for every configuration key.
pub const ENV_PREFIX: &str = "OFFLINE_GATEWAY_";

/// Names of the two live cache generations for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheNames {
    /// The eagerly populated generation created at install.
    pub current: String,
    /// The lazily populated runtime cache.
    pub runtime: String,
}

impl CacheNames {
    /// Returns `true` if `name` is one of the live generations.
    pub fn is_live(&self, name: &str) -> bool {
        name == self.current || name == self.runtime
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Origin the gateway fronts. Requests on any other origin are cross-origin.
    #[serde(default = "default_origin")]
    pub origin: Url,

    /// Prefix shared by every cache generation name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Deployment version. Bumping it supersedes every older generation.
    #[serde(default = "default_version")]
    pub version: String,

    /// Root-relative asset paths cached on install.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Cross-origin resource URLs cached on install and served through the gateway.
    #[serde(default = "default_external_resources")]
    pub external_resources: Vec<String>,

    /// Same-origin page routes pre-warmed on install.
    #[serde(default = "default_dynamic_routes")]
    pub dynamic_routes: Vec<String>,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    /// Page served to HTML requests when both cache and network fail.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Activate straight after install instead of waiting for a `skipWaiting` message.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Notification title.
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Notification body used when a push arrives without a payload.
    #[serde(default = "default_notification_body")]
    pub notification_body: String,

    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    #[serde(default = "default_notification_tag")]
    pub notification_tag: String,

    /// Socket address the host proxy binds to.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path prefix of the host proxy's control endpoints.
    #[serde(default = "default_control_prefix")]
    pub control_prefix: String,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Origin used when none is configured.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:5000/";

// A literal; `test_default_config` covers the parse.
static PARSED_DEFAULT_ORIGIN: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_ORIGIN).expect("DEFAULT_ORIGIN is a valid URL"));

fn default_origin() -> Url {
    PARSED_DEFAULT_ORIGIN.clone()
}

fn default_cache_prefix() -> String {
    "thegranito".into()
}

fn default_version() -> String {
    "2.0".into()
}

fn default_static_assets() -> Vec<String> {
    [
        "/",
        "/static/css/style.css",
        "/static/js/script.js",
        "/static/images/logo.png",
        "/static/images/profile.jpg",
        "/static/images/icon-192x192.png",
        "/static/images/icon-512x512.png",
        "/offline.html",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_external_resources() -> Vec<String> {
    [
        "https://cdn.jsdelivr.net/npm/bootstrap@5.1.3/dist/css/bootstrap.min.css",
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0/css/all.min.css",
        "https://unpkg.com/aos@2.3.1/dist/aos.css",
        "https://cdn.jsdelivr.net/npm/bootstrap@5.1.3/dist/js/bootstrap.bundle.min.js",
        "https://unpkg.com/aos@2.3.1/dist/aos.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_dynamic_routes() -> Vec<String> {
    ["/about", "/projects", "/contact", "/blog"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_static_prefix() -> String {
    "/static/".into()
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_true() -> bool {
    true
}

fn default_site_name() -> String {
    "TheGranito Portfolio".into()
}

fn default_notification_body() -> String {
    "New notification from TheGranito".into()
}

fn default_notification_icon() -> String {
    "/static/images/icon-192x192.png".into()
}

fn default_notification_tag() -> String {
    "thegranito-notification".into()
}

fn default_listen() -> String {
    "127.0.0.1:8080".into()
}

fn default_control_prefix() -> String {
    "/__gateway".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_user_agent() -> String {
    "offline-gateway/0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            version: default_version(),
            static_assets: default_static_assets(),
            external_resources: default_external_resources(),
            dynamic_routes: default_dynamic_routes(),
            api_prefix: default_api_prefix(),
            static_prefix: default_static_prefix(),
            offline_page: default_offline_page(),
            skip_waiting: true,
            site_name: default_site_name(),
            notification_body: default_notification_body(),
            notification_icon: default_notification_icon(),
            notification_tag: default_notification_tag(),
            listen: default_listen(),
            control_prefix: default_control_prefix(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// `file` wins over `OFFLINE_GATEWAY_CONFIG_FILE` when both are given.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// if validation fails after loading.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match file {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Ok(path) = std::env::var(format!("{ENV_PREFIX}CONFIG_FILE")) {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Generation names derived from prefix and version.
    pub fn cache_names(&self) -> CacheNames {
        CacheNames {
            current: format!("{}-v{}", self.cache_prefix, self.version),
            runtime: format!("{}-runtime-v{}", self.cache_prefix, self.version),
        }
    }

    /// Timeout as Duration for use with reqwest.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolves a root-relative path against the origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the joined URL is malformed.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        self.origin.join(path).map_err(|e| ConfigError::Invalid {
            field: "path".into(),
            reason: format!("{path:?} does not resolve against the origin: {e}"),
        })
    }

    /// Returns `true` if `url` is exactly one of the allow-listed external resources.
    pub fn is_external_resource(&self, url: &Url) -> bool {
        self.external_resources.iter().any(|r| r == url.as_str())
    }
}
