//! In-process [`CacheStorage`] backed by a tokio `RwLock`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheError, CacheKey, CacheStorage, ensure_cacheable};
use crate::http::{Request, Response};

type Bucket = HashMap<CacheKey, Response>;

/// Named buckets held in memory, in creation order.
///
/// # Examples
///
/// ```
/// use offline_gateway::cache::{CacheStorage, MemoryStorage};
/// use offline_gateway::http::{Request, Response, StatusCode};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let storage = MemoryStorage::new();
/// let request = Request::get("http://localhost/static/js/script.js").unwrap();
/// storage
///     .put("site-runtime-v1", &request, Response::new(StatusCode::Ok).body("js"))
///     .await
///     .unwrap();
///
/// let hit = storage.match_in("site-runtime-v1", &request).await.unwrap();
/// assert_eq!(hit.map(|r| r.text()), Some("js".to_string()));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    buckets: RwLock<Vec<(String, Bucket)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        let mut buckets = self.buckets.write().await;
        if !buckets.iter().any(|(n, _)| n == name) {
            buckets.push((name.to_owned(), Bucket::new()));
        }
        Ok(())
    }

    async fn match_in(
        &self,
        name: &str,
        request: &Request,
    ) -> Result<Option<Response>, CacheError> {
        let key = CacheKey::for_request(request);
        let buckets = self.buckets.read().await;
        Ok(buckets
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, bucket)| bucket.get(&key).cloned()))
    }

    async fn put(
        &self,
        name: &str,
        request: &Request,
        response: Response,
    ) -> Result<(), CacheError> {
        ensure_cacheable(request, &response)?;
        let key = CacheKey::for_request(request);

        let mut buckets = self.buckets.write().await;
        match buckets.iter_mut().find(|(n, _)| n == name) {
            Some((_, bucket)) => {
                bucket.insert(key, response);
            }
            None => {
                let mut bucket = Bucket::new();
                bucket.insert(key, response);
                buckets.push((name.to_owned(), bucket));
            }
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|(n, _)| n != name);
        Ok(buckets.len() < before)
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let buckets = self.buckets.read().await;
        Ok(buckets.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn entries(&self, name: &str) -> Result<Vec<CacheKey>, CacheError> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bucket)| bucket.keys().cloned().collect())
            .unwrap_or_default())
    }
}
