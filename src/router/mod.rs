//! Request routing for the host's control surface.
//!
//! [`Router`] maps a method and an exact path to an async handler. Routes can
//! be mounted under a common prefix with [`Router::nest`], and anything that
//! matches no route goes to the [`Router::fallback`] handler, which is how the
//! proxy hands ordinary traffic to the gateway.
//!
//! Trailing slashes are normalized on both patterns and incoming paths, so
//! `/state/` and `/state` are treated as equivalent. A known path requested
//! with the wrong method answers `405 Method Not Allowed`.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::http::{Method, Request, Response, StatusCode};

/// Type-erased, heap-allocated async handler that processes a [`Context`] and returns a
/// [`Response`].
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait through the blanket impl.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

fn normalize(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    }
}

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// Exact-path router with an optional catch-all.
///
/// # Examples
///
/// ```rust,no_run
/// use offline_gateway::router::Router;
/// use offline_gateway::http::{Response, StatusCode};
///
/// let mut router = Router::nest("/__gateway");
/// router.get("/state", |_ctx| async { Response::new(StatusCode::Ok) });
/// router.fallback(|_ctx| async { Response::new(StatusCode::BadGateway) });
/// ```
pub struct Router {
    prefix: String,
    routes: Vec<Route>,
    fallback: Option<Handler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::nest("")
    }

    /// A router whose routes all live under `prefix`.
    pub fn nest(prefix: &str) -> Self {
        Self {
            prefix: normalize(prefix).trim_end_matches('/').to_owned(),
            routes: Vec::new(),
            fallback: None,
        }
    }

    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    /// Sets the handler for requests that match no route. Without one they get `404`.
    pub fn fallback(&mut self, handler: impl IntoHandler) {
        self.fallback = Some(Arc::new(move |ctx| handler.call(ctx)));
    }

    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        let path = normalize(&format!("{}{path}", self.prefix)).to_owned();
        self.routes.push(Route {
            method,
            path,
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatches `request` to the first route matching method and path.
    pub async fn route(&self, request: Request) -> Response {
        let path = normalize(request.path());

        let mut path_known = false;
        for route in &self.routes {
            if route.path != path {
                continue;
            }
            if &route.method == request.method() {
                return (route.handler)(Context::new(request)).await;
            }
            path_known = true;
        }

        if path_known {
            return Response::new(StatusCode::MethodNotAllowed);
        }
        match &self.fallback {
            Some(fallback) => fallback(Context::new(request)).await,
            None => Response::new(StatusCode::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    #[test]
    fn normalize_strips_one_trailing_slash_except_root() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/state/"), "/state");
        assert_eq!(normalize("/state"), "/state");
    }

    #[test]
    fn router_len_increments_on_add() {
        let mut router = Router::new();
        assert!(router.is_empty());
        router.get("/a", |_ctx| async { Response::new(StatusCode::Ok) });
        router.post("/b", |_ctx| async { Response::new(StatusCode::Ok) });
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn empty_router_returns_404() {
        let router = Router::new();
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn nested_routes_match_under_prefix() {
        let mut router = Router::nest("/__gateway/");
        router.get("/state", |_ctx| async { Response::new(StatusCode::Ok) });

        let res = router.route(make_request("GET", "/__gateway/state/")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        let res = router.route(make_request("GET", "/state")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn wrong_method_on_known_path_is_405() {
        let mut router = Router::new();
        router.post("/message", |_ctx| async { Response::new(StatusCode::Accepted) });
        let res = router.route(make_request("GET", "/message")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
    }

    #[tokio::test]
    async fn unmatched_requests_reach_the_fallback() {
        let mut router = Router::nest("/__gateway");
        router.get("/state", |_ctx| async { Response::new(StatusCode::Ok) });
        router.fallback(|ctx: Context| async move {
            Response::new(StatusCode::Ok).body(ctx.request().path().to_owned())
        });

        let res = router.route(make_request("GET", "/about")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.text(), "/about");
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/path", |_ctx| async { Response::new(StatusCode::Ok) });
        router.get("/path", |_ctx| async { Response::new(StatusCode::Accepted) });

        let res = router.route(make_request("GET", "/path")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }
}
