//! Caching strategies.
//!
//! Each strategy resolves to a [`Response`] under every combination of cache
//! hit/miss and network success/failure. Network failures are absorbed here
//! and turned into a cached copy or a synthesized response:
//!
//! - `503 Service Unavailable`: offline, nothing cached to fall back on
//! - `408 Request Timeout`: a non-HTML request whose fetch failed
//!
//! Lazily cached entries always go to the runtime generation, and only
//! complete 2xx responses are stored.

use std::sync::Arc;

use super::Gateway;
use crate::http::{Method, Request, Response, StatusCode};

impl Gateway {
    /// Looks in the current generation, then the runtime cache. Read errors count as a miss.
    async fn lookup(&self, request: &Request) -> Option<Response> {
        for name in [&self.names.current, &self.names.runtime] {
            match self.storage.match_in(name, request).await {
                Ok(Some(response)) => return Some(response),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(cache = %name, url = %request.url(), error = %e, "cache read failed");
                }
            }
        }
        None
    }

    /// Stores a copy in the runtime cache if the response is a complete success.
    async fn store(&self, request: &Request, response: &Response) {
        if !response.is_cacheable() {
            tracing::debug!(url = %request.url(), status = response.status().as_u16(), "not caching");
            return;
        }
        if let Err(e) = self
            .storage
            .put(&self.names.runtime, request, response.clone())
            .await
        {
            tracing::warn!(url = %request.url(), error = %e, "cache write failed");
        }
    }

    /// Response for a request that neither the cache nor the network could serve.
    async fn offline_fallback(&self, request: &Request) -> Response {
        if !request.accepts_html() {
            return Response::new(StatusCode::RequestTimeout).body("Network error");
        }

        match self.config.resolve(&self.config.offline_page) {
            Ok(url) => {
                if let Some(cached) = self.lookup(&Request::new(Method::Get, url)).await {
                    return cached;
                }
            }
            Err(e) => tracing::warn!(error = %e, "offline page does not resolve"),
        }

        Response::new(StatusCode::ServiceUnavailable).body("Offline - Please check your connection")
    }

    /// Cache, then network (storing successes), then offline fallback.
    pub(super) async fn cache_first(&self, request: &Request) -> Response {
        if let Some(cached) = self.lookup(request).await {
            tracing::debug!(url = %request.url(), "cache hit");
            return cached;
        }

        tracing::debug!(url = %request.url(), "cache miss, fetching");
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store(request, &response).await;
                response
            }
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "fetch failed");
                self.offline_fallback(request).await
            }
        }
    }

    /// Network (storing successes), then cache, then a JSON 503.
    pub(super) async fn network_first(&self, request: &Request) -> Response {
        tracing::debug!(url = %request.url(), "network first");
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store(request, &response).await;
                response
            }
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "network failed, trying cache");
                match self.lookup(request).await {
                    Some(cached) => cached,
                    None => Response::new(StatusCode::ServiceUnavailable)
                        .json_body(&serde_json::json!({ "error": "Offline" })),
                }
            }
        }
    }

    /// Cached copy now plus a detached refresh; without a copy, wait for the network.
    pub(super) async fn stale_while_revalidate(&self, request: Request) -> Response {
        if let Some(cached) = self.lookup(&request).await {
            tracing::debug!(url = %request.url(), "serving stale, revalidating");
            self.revalidate_in_background(request);
            return cached;
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                self.store(&request, &response).await;
                response
            }
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "fetch failed with nothing cached");
                self.offline_fallback(&request).await
            }
        }
    }

    fn revalidate_in_background(&self, request: Request) {
        let storage = Arc::clone(&self.storage);
        let network = Arc::clone(&self.network);
        let runtime = self.names.runtime.clone();

        self.background.spawn(async move {
            match network.fetch(&request).await {
                Ok(response) if response.is_cacheable() => {
                    if let Err(e) = storage.put(&runtime, &request, response).await {
                        tracing::warn!(url = %request.url(), error = %e, "revalidated copy not stored");
                    }
                }
                Ok(response) => {
                    tracing::debug!(
                        url = %request.url(),
                        status = response.status().as_u16(),
                        "revalidation not cacheable, keeping stale copy"
                    );
                }
                Err(e) => {
                    tracing::warn!(url = %request.url(), error = %e, "background fetch failed");
                }
            }
        });
    }
}
