//! HTTP response snapshots.
//!
//! A [`Response`] is both what the network collaborator hands back and what
//! the cache stores. The body is a [`Bytes`] buffer, so cloning a response
//! to keep one copy in the cache and return the other is cheap.

use bytes::{BufMut, Bytes, BytesMut};

use super::{Headers, StatusCode};

/// Headers that describe a single connection and must not be replayed from a snapshot.
const HOP_BY_HOP: [&str; 4] = ["connection", "content-length", "transfer-encoding", "keep-alive"];

/// An HTTP response: status, headers, and a fully buffered body.
///
/// # Examples
///
/// ```
/// use offline_gateway::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::ServiceUnavailable)
///     .json_body(&serde_json::json!({ "error": "Offline" }));
///
/// assert_eq!(response.headers().get("content-type"), Some("application/json"));
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
/// assert!(text.ends_with(r#"{"error":"Offline"}"#));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    keep_alive: bool,
    head: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
            keep_alive: true,
            head: false,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Bytes::from(body.into());
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` as the body and sets `Content-Type: application/json`.
    #[must_use]
    pub fn json_body(mut self, value: &serde_json::Value) -> Self {
        self.headers.set("Content-Type", "application/json");
        self.body = Bytes::from(value.to_string());
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Marks this as the answer to a `HEAD` request: no body is written, and
    /// an upstream `Content-Length` survives when the buffered body is empty.
    #[must_use]
    pub fn head(mut self, head: bool) -> Self {
        self.head = head;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Shorthand for `self.status().is_cacheable()`.
    pub fn is_cacheable(&self) -> bool {
        self.status.is_cacheable()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the buffered body.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Hop-by-hop headers captured from upstream are dropped and rewritten:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>` (always written). For a [`head`](Self::head)
    ///   response with an empty body, the upstream value is kept.
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_bytes(mut self) -> BytesMut {
        let declared = self
            .headers
            .get("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok());
        for name in HOP_BY_HOP {
            self.headers.remove(name);
        }

        let content_length = match declared {
            Some(n) if self.head && self.body.is_empty() => n,
            _ => self.body.len(),
        };

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.insert("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);

        if !self.head && !self.body.is_empty() {
            buf.put(self.body);
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn simple_ok_response() {
        let r = Response::new(StatusCode::Ok).body("Hello");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn upstream_framing_headers_are_rewritten() {
        let r = Response::new(StatusCode::Ok)
            .header("Content-Length", "999")
            .header("Transfer-Encoding", "chunked")
            .header("Connection", "close")
            .body("abc");
        let s = to_string(r.into_bytes());
        assert!(s.contains("Content-Length: 3\r\n"));
        assert!(!s.contains("999"));
        assert!(!s.contains("chunked"));
        assert!(s.contains("Connection: keep-alive\r\n"));
    }

    #[test]
    fn head_keeps_upstream_length_without_body() {
        let r = Response::new(StatusCode::Ok)
            .header("Content-Length", "5120")
            .header("Content-Type", "image/jpeg")
            .head(true);
        let s = to_string(r.into_bytes());
        assert!(s.contains("Content-Length: 5120\r\n"));
        assert!(s.ends_with("\r\n\r\n"));

        let r = Response::new(StatusCode::Ok)
            .header("Content-Length", "5120")
            .body("hello")
            .head(true);
        let s = to_string(r.into_bytes());
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(!s.contains("hello"));
    }

    #[test]
    fn empty_get_body_ignores_upstream_length() {
        let r = Response::new(StatusCode::Ok).header("Content-Length", "5120");
        let s = to_string(r.into_bytes());
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn custom_status_has_empty_reason() {
        let r = Response::new(StatusCode::Custom(299));
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 299 \r\n"));
    }

    #[test]
    fn clones_share_body() {
        let original = Response::new(StatusCode::Ok).body("cached");
        let copy = original.clone();
        assert_eq!(original, copy);
        assert_eq!(copy.text(), "cached");
    }

    #[test]
    fn no_body_no_content_type() {
        let r = Response::new(StatusCode::NoContent);
        let s = to_string(r.into_bytes());
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn connection_close() {
        let r = Response::new(StatusCode::RequestTimeout).keep_alive(false);
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 408 Request Timeout\r\n"));
        assert!(s.contains("Connection: close\r\n"));
    }
}
