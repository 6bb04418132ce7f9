//! Network fetch collaborator.
//!
//! The gateway never talks to a socket directly; it hands requests to a
//! [`Fetch`] implementation and reacts to either a [`Response`] (any status)
//! or a [`FetchError`] (no response at all). A non-2xx status is a successful
//! fetch as far as this layer is concerned.

use async_trait::async_trait;
use thiserror::Error;

use crate::http::{Request, Response};

mod client;

pub use client::HttpFetcher;

/// Transport-level failures: no response was received.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request cannot be sent: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Something that can turn a request into a response over the network.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}
