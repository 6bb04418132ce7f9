//! Per-request context handed to control endpoint handlers.

use serde::de::DeserializeOwned;

use crate::http::Request;

/// Wraps the incoming [`Request`] with body decoding helpers.
#[derive(Debug, Clone)]
pub struct Context {
    request: Request,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    /// Decodes the body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }

    /// Decodes the body as JSON, treating an empty body as `T::default()`.
    pub fn json_or_default<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned + Default,
    {
        if self.request.body().iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        self.json()
    }

    /// The body as UTF-8 text, or `None` if empty or not valid UTF-8.
    pub fn text(&self) -> Option<String> {
        let body = self.request.body();
        if body.is_empty() {
            return None;
        }
        std::str::from_utf8(body).ok().map(str::to_owned)
    }
}
