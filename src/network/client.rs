//! [`Fetch`] over `reqwest`.

use async_trait::async_trait;
use reqwest::Client;

use super::{Fetch, FetchError};
use crate::config::GatewayConfig;
use crate::http::{Request, Response, StatusCode};

/// Request headers describing the inbound connection rather than the resource.
const SKIPPED_REQUEST_HEADERS: [&str; 5] = [
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
];

/// Maximum number of redirects followed per fetch.
const MAX_REDIRECTS: usize = 5;

/// HTTP client used as the gateway's network collaborator.
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    /// Builds a client with the configured user agent and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the TLS backend cannot be initialized.
    pub fn new(config: &GatewayConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .use_rustls_tls()
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else if err.is_builder() {
            FetchError::InvalidRequest(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

        let mut builder = self.http.request(method, request.url().clone());
        for (name, value) in request.headers().iter() {
            if SKIPPED_REQUEST_HEADERS
                .iter()
                .any(|skip| name.eq_ignore_ascii_case(skip))
            {
                continue;
            }
            builder = builder.header(name, value);
        }
        if !request.body().is_empty() {
            builder = builder.body(request.body().clone());
        }

        let upstream = builder.send().await?;
        let status = StatusCode::from_u16(upstream.status().as_u16());
        let mut response = Response::new(status);
        for (name, value) in upstream.headers() {
            if let Ok(value) = value.to_str() {
                response.add_header(name.as_str(), value);
            }
        }
        let body = upstream.bytes().await?;

        tracing::debug!(url = %request.url(), status = status.as_u16(), bytes = body.len(), "network response");

        let response = response.body_bytes(body);
        Ok(response)
    }
}
