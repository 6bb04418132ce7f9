//! Request classification and strategy selection.
//!
//! Routing is a pure function of the request and the configuration. Rules are
//! evaluated in order and the first one that applies wins:
//!
//! | # | Condition                                         | Outcome                    |
//! |---|---------------------------------------------------|----------------------------|
//! | 1 | method is not `GET`                               | pass through               |
//! | 2 | cross-origin and not an allow-listed resource     | pass through               |
//! | 3 | path starts with the API prefix                   | network-first              |
//! | 4 | `Accept` mentions `text/html`                     | cache-first                |
//! | 5 | path starts with the static-asset prefix          | cache-first                |
//! | 6 | anything else                                     | stale-while-revalidate     |

use std::fmt;

use crate::config::GatewayConfig;
use crate::http::{Method, Request};

/// What kind of resource a request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    StaticAsset,
    HtmlPage,
    ApiCall,
    Other,
}

/// How a handled request is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CacheFirst => "cache-first",
            Self::NetworkFirst => "network-first",
            Self::StaleWhileRevalidate => "stale-while-revalidate",
        })
    }
}

/// Why a request was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    NotGet,
    CrossOrigin,
}

/// Routing decision for one intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    PassThrough(PassReason),
    Handle {
        class: RequestClass,
        strategy: Strategy,
    },
}

impl RequestClass {
    /// Tags a request. Order matters: an API path that accepts HTML is still an API call.
    pub fn of(config: &GatewayConfig, request: &Request) -> Self {
        let path = request.path();
        if path.starts_with(&config.api_prefix) {
            Self::ApiCall
        } else if request.accepts_html() {
            Self::HtmlPage
        } else if path.starts_with(&config.static_prefix) {
            Self::StaticAsset
        } else {
            Self::Other
        }
    }

    pub fn strategy(self) -> Strategy {
        match self {
            Self::ApiCall => Strategy::NetworkFirst,
            Self::HtmlPage | Self::StaticAsset => Strategy::CacheFirst,
            Self::Other => Strategy::StaleWhileRevalidate,
        }
    }
}

/// Applies the routing table to `request`.
pub fn route(config: &GatewayConfig, request: &Request) -> Route {
    if request.method() != &Method::Get {
        return Route::PassThrough(PassReason::NotGet);
    }

    let same_origin = request.url().origin() == config.origin.origin();
    if !same_origin && !config.is_external_resource(request.url()) {
        return Route::PassThrough(PassReason::CrossOrigin);
    }

    let class = RequestClass::of(config, request);
    Route::Handle {
        class,
        strategy: class.strategy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig::default()
    }

    fn get(path: &str) -> Request {
        Request::get(&format!("http://127.0.0.1:5000{path}")).unwrap()
    }

    fn html(path: &str) -> Request {
        get(path).header("Accept", "text/html,application/xhtml+xml")
    }

    #[test]
    fn non_get_passes_through() {
        let req = Request::new(Method::Post, get("/contact").url().clone());
        assert_eq!(route(&config(), &req), Route::PassThrough(PassReason::NotGet));
    }

    #[test]
    fn foreign_origin_passes_through() {
        let req = Request::get("https://www.google-analytics.com/collect").unwrap();
        assert_eq!(route(&config(), &req), Route::PassThrough(PassReason::CrossOrigin));
    }

    #[test]
    fn allow_listed_cdn_resource_is_handled() {
        let req = Request::get("https://unpkg.com/aos@2.3.1/dist/aos.css").unwrap();
        assert_eq!(
            route(&config(), &req),
            Route::Handle {
                class: RequestClass::Other,
                strategy: Strategy::StaleWhileRevalidate
            }
        );
    }

    #[test]
    fn api_prefix_is_network_first_even_for_html() {
        let req = html("/api/stats");
        assert_eq!(
            route(&config(), &req),
            Route::Handle {
                class: RequestClass::ApiCall,
                strategy: Strategy::NetworkFirst
            }
        );
    }

    #[test]
    fn html_navigation_is_cache_first() {
        assert_eq!(RequestClass::of(&config(), &html("/projects")), RequestClass::HtmlPage);
        assert_eq!(RequestClass::HtmlPage.strategy(), Strategy::CacheFirst);
    }

    #[test]
    fn static_prefix_is_cache_first() {
        let req = get("/static/css/style.css");
        assert_eq!(RequestClass::of(&config(), &req), RequestClass::StaticAsset);
        assert_eq!(RequestClass::StaticAsset.strategy(), Strategy::CacheFirst);
    }

    #[test]
    fn everything_else_is_stale_while_revalidate() {
        let req = get("/manifest.json");
        assert_eq!(RequestClass::of(&config(), &req), RequestClass::Other);
        assert_eq!(Strategy::StaleWhileRevalidate.to_string(), "stale-while-revalidate");
    }

    #[test]
    fn same_host_different_port_is_cross_origin() {
        let req = Request::get("http://127.0.0.1:5001/static/css/style.css").unwrap();
        assert_eq!(route(&config(), &req), Route::PassThrough(PassReason::CrossOrigin));
    }
}
