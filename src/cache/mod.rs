//! Cache storage: named generations of request → response snapshots.
//!
//! The gateway does not own persistence. It talks to a [`CacheStorage`]
//! collaborator that holds any number of named buckets and decides only
//! which bucket names are live and which are garbage.
//!
//! Storage-level invariants, enforced by every implementation:
//!
//! - only `GET` requests are stored
//! - only 2xx responses are stored
//! - a `put` replaces the previous snapshot for the same [`CacheKey`] wholesale

use async_trait::async_trait;
use thiserror::Error;

use crate::http::{Method, Request, Response, StatusCode};

mod memory;

pub use memory::MemoryStorage;

/// Errors produced by a cache storage backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("refusing to cache {method} {url}: only GET requests are cacheable")]
    UnsupportedMethod { method: Method, url: String },

    #[error("refusing to cache {url}: status {status} is not a success")]
    NotCacheable { url: String, status: StatusCode },
}

/// Identity of a cache entry: method plus URL without its fragment.
///
/// The query string is part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: Method,
    url: String,
}

impl CacheKey {
    pub fn for_request(request: &Request) -> Self {
        let mut url = request.url().clone();
        url.set_fragment(None);
        Self {
            method: request.method().clone(),
            url: url.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// A named-bucket key-value store for response snapshots.
///
/// Implementations must be safe to share across tasks; concurrent writes to
/// the same key resolve last-write-wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the bucket if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    /// Looks up `request` in one bucket. A missing bucket is a miss.
    async fn match_in(&self, name: &str, request: &Request)
    -> Result<Option<Response>, CacheError>;

    /// Stores a snapshot, creating the bucket on demand.
    async fn put(&self, name: &str, request: &Request, response: Response)
    -> Result<(), CacheError>;

    /// Deletes a whole bucket. Returns `false` if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// Bucket names in creation order.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Keys stored in one bucket; empty for a missing bucket.
    async fn entries(&self, name: &str) -> Result<Vec<CacheKey>, CacheError>;
}

/// Checks the storage-level invariants for a prospective `put`.
pub(crate) fn ensure_cacheable(request: &Request, response: &Response) -> Result<(), CacheError> {
    if request.method() != &Method::Get {
        return Err(CacheError::UnsupportedMethod {
            method: request.method().clone(),
            url: request.url().to_string(),
        });
    }
    if !response.is_cacheable() {
        return Err(CacheError::NotCacheable {
            url: request.url().to_string(),
            status: response.status(),
        });
    }
    Ok(())
}
