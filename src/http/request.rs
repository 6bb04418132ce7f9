//! Absolute-URL HTTP requests and HTTP/1.1 request parsing via [`httparse`].
//!
//! The gateway reasons about origins, so every [`Request`] carries a fully
//! resolved [`Url`]. Requests read off the wire in origin-form
//! (`GET /path HTTP/1.1`) are resolved against their `Host` header;
//! absolute-form targets (`GET https://cdn.example/x HTTP/1.1`) are kept as-is.

use bytes::Bytes;
use thiserror::Error;
use url::{Position, Url};

use super::{Headers, Method};

/// Errors that can occur while building or parsing a request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid request target {target:?}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },
}

/// An HTTP request addressed by an absolute URL.
///
/// # Examples
///
/// ```
/// use offline_gateway::http::Request;
///
/// let raw = b"GET /static/css/style.css?v=2 HTTP/1.1\r\nHost: portfolio.local\r\nAccept: text/css\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/static/css/style.css");
/// assert_eq!(request.url().as_str(), "http://portfolio.local/static/css/style.css?v=2");
/// assert!(!request.accepts_html());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
    origin_form: bool,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Creates a request with no headers and an empty body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            version: 1,
            headers: Headers::new(),
            body: Bytes::new(),
            origin_form: false,
        }
    }

    /// Shorthand for a `GET` of an absolute URL string.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidTarget`] if `url` is not an absolute URL.
    pub fn get(url: &str) -> Result<Self, RequestError> {
        let url = Url::parse(url).map_err(|source| RequestError::InvalidTarget {
            target: url.to_owned(),
            source,
        })?;
        Ok(Self::new(Method::Get, url))
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf`. The body itself is everything after that offset that has
    /// already been buffered; callers wait for `Content-Length` bytes first.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: more data is needed to complete the request headers.
    /// - [`RequestError::Parse`]: the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`]: a required field (method, path, version) is absent.
    /// - [`RequestError::InvalidTarget`]: the target cannot be resolved to a URL.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = match raw_req.method {
            Some(m) => m.parse().unwrap_or_else(|never| match never {}),
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let origin_form = target.starts_with('/');
        let url = resolve_target(target, header_map.get("host"))?;
        let body = Bytes::copy_from_slice(&buf[body_offset..]);

        Ok((
            Self {
                method,
                url,
                version,
                headers: header_map,
                body,
                origin_form,
            },
            body_offset,
        ))
    }

    /// Moves an origin-relative request onto another origin, keeping path and query.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidTarget`] if the joined URL is not valid.
    pub fn rebase(&mut self, origin: &Url) -> Result<(), RequestError> {
        let relative = &self.url[Position::BeforePath..];
        let rebased = origin
            .join(relative)
            .map_err(|source| RequestError::InvalidTarget {
                target: relative.to_owned(),
                source,
            })?;
        self.url = rebased;
        Ok(())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the absolute request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.url.query()
    }

    /// Returns `true` if the request arrived as `GET /path`, i.e. its origin
    /// came from the `Host` header rather than the request target.
    pub fn is_origin_form(&self) -> bool {
        self.origin_form
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the request's `Accept` header mentions `text/html`.
    pub fn accepts_html(&self) -> bool {
        self.headers.value_contains("accept", "text/html")
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}

// Absolute-form targets are taken verbatim; origin-form targets hang off the Host header.
fn resolve_target(target: &str, host: Option<&str>) -> Result<Url, RequestError> {
    let invalid = |source| RequestError::InvalidTarget {
        target: target.to_owned(),
        source,
    };

    if !target.starts_with('/') {
        return Url::parse(target).map_err(invalid);
    }

    let base = format!("http://{}/", host.unwrap_or("localhost"));
    Url::parse(&base)
        .and_then(|base| base.join(target))
        .map_err(invalid)
}
