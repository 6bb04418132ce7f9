//! The request handler that fronts the site with a gateway.
//!
//! Control endpoints live under `control_prefix`. Every other request is
//! turned into a fetch event; if the gateway passes on it, the request goes
//! straight to the network.

use std::sync::Arc;

use serde_json::json;

use crate::context::Context;
use crate::events::{
    ControlMessage, Dispatcher, Event, EventOutcome, FetchOutcome, NotificationClick, SyncTag,
};
use crate::gateway::{Gateway, GatewayError};
use crate::http::{Request, Response, StatusCode};
use crate::network::Fetch;
use crate::router::Router;

/// Serves control endpoints and fetch events for one gateway.
#[derive(Clone)]
pub struct ProxyService {
    router: Arc<Router>,
}

impl ProxyService {
    /// `network` carries pass-through traffic; normally the same fetcher the gateway uses.
    pub fn new(dispatcher: Dispatcher<Gateway>, network: Arc<dyn Fetch>) -> Self {
        let prefix = dispatcher.handler().config().control_prefix.clone();
        let mut router = Router::nest(&prefix);

        let d = dispatcher.clone();
        router.post("/message", move |ctx: Context| {
            let d = d.clone();
            async move {
                match ctx.json::<ControlMessage>() {
                    Ok(message) => reply(d.dispatch(Event::Message(message)).await),
                    Err(e) => bad_request(&e),
                }
            }
        });

        let d = dispatcher.clone();
        router.post("/push", move |ctx: Context| {
            let d = d.clone();
            async move { reply(d.dispatch(Event::Push(ctx.text())).await) }
        });

        let d = dispatcher.clone();
        router.post("/notification-click", move |ctx: Context| {
            let d = d.clone();
            async move {
                match ctx.json_or_default::<NotificationClick>() {
                    Ok(click) => reply(d.dispatch(Event::NotificationClick(click)).await),
                    Err(e) => bad_request(&e),
                }
            }
        });

        let d = dispatcher.clone();
        router.post("/sync", move |ctx: Context| {
            let d = d.clone();
            async move {
                match ctx.json::<SyncTag>() {
                    Ok(SyncTag { tag }) => reply(d.dispatch(Event::Sync(tag)).await),
                    Err(e) => bad_request(&e),
                }
            }
        });

        let d = dispatcher.clone();
        router.post("/periodic-sync", move |ctx: Context| {
            let d = d.clone();
            async move {
                match ctx.json::<SyncTag>() {
                    Ok(SyncTag { tag }) => reply(d.dispatch(Event::PeriodicSync(tag)).await),
                    Err(e) => bad_request(&e),
                }
            }
        });

        let d = dispatcher.clone();
        router.get("/state", move |_ctx: Context| {
            let d = d.clone();
            async move { state(d.handler()).await }
        });

        router.fallback(move |ctx: Context| {
            let d = dispatcher.clone();
            let network = Arc::clone(&network);
            async move { fetch(&d, network.as_ref(), ctx.into_request()).await }
        });

        Self {
            router: Arc::new(router),
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        self.router.route(request).await
    }
}

async fn fetch(
    dispatcher: &Dispatcher<Gateway>,
    network: &dyn Fetch,
    mut request: Request,
) -> Response {
    if request.is_origin_form() {
        let origin = &dispatcher.handler().config().origin;
        if let Err(e) = request.rebase(origin) {
            return Response::new(StatusCode::BadRequest).body(format!("Bad Request: {e}"));
        }
    }

    let outcome = match dispatcher.dispatch(Event::Fetch(request.clone())).await {
        Ok(EventOutcome::Fetched(outcome)) => outcome,
        Ok(other) => {
            tracing::error!(?other, "fetch event produced a non-fetch outcome");
            FetchOutcome::PassThrough
        }
        Err(e) => return error_response(&e),
    };

    match outcome {
        FetchOutcome::Respond(response) => response,
        FetchOutcome::PassThrough => match network.fetch(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "pass-through fetch failed");
                Response::new(StatusCode::BadGateway).body(format!("Bad Gateway: {e}"))
            }
        },
    }
}

async fn state(gateway: &Gateway) -> Response {
    let stored = match gateway.storage().keys().await {
        Ok(keys) => keys,
        Err(e) => return error_response(&GatewayError::from(e)),
    };
    Response::new(StatusCode::Ok).json_body(&json!({
        "state": gateway.state(),
        "caches": gateway.cache_names(),
        "stored": stored,
        "pendingBackground": gateway.pending_background(),
    }))
}

fn reply(result: Result<EventOutcome, GatewayError>) -> Response {
    match result {
        Ok(_) => Response::new(StatusCode::Accepted).json_body(&json!({ "ok": true })),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &GatewayError) -> Response {
    let status = match err {
        GatewayError::InvalidTransition { .. } => StatusCode::Conflict,
        GatewayError::Cache(_) | GatewayError::Config(_) => StatusCode::InternalServerError,
    };
    tracing::warn!(error = %err, status = status.as_u16(), "control request failed");
    Response::new(status).json_body(&json!({ "error": err.to_string() }))
}

fn bad_request(err: &serde_json::Error) -> Response {
    Response::new(StatusCode::BadRequest).json_body(&json!({ "error": err.to_string() }))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryStorage;
    use crate::config::GatewayConfig;
    use crate::events::LoggingClients;
    use crate::network::FetchError;

    struct Offline;

    #[async_trait]
    impl Fetch for Offline {
        async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            Err(FetchError::Connect(format!("{} unreachable", request.url())))
        }
    }

    fn service() -> ProxyService {
        let network: Arc<dyn Fetch> = Arc::new(Offline);
        let gateway = Gateway::new(
            GatewayConfig::default(),
            Arc::new(MemoryStorage::new()),
            Arc::clone(&network),
            Arc::new(LoggingClients),
        );
        ProxyService::new(Dispatcher::new(Arc::new(gateway)), network)
    }

    fn raw(method: &str, target: &str, body: &str) -> Request {
        let raw = format!(
            "{method} {target} HTTP/1.1\r\nHost: localhost:8080\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[tokio::test]
    async fn state_reports_lifecycle_and_cache_names() {
        let res = service().handle(raw("GET", "/__gateway/state", "")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        let body: serde_json::Value = serde_json::from_slice(res.bytes()).unwrap();
        assert_eq!(body["state"], "parsed");
        assert_eq!(body["caches"]["current"], "thegranito-v2.0");
        assert_eq!(body["caches"]["runtime"], "thegranito-runtime-v2.0");
    }

    #[tokio::test]
    async fn malformed_control_message_is_400() {
        let res = service().handle(raw("POST", "/__gateway/message", "not json")).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
    }

    #[tokio::test]
    async fn unknown_control_action_is_accepted() {
        let res = service()
            .handle(raw("POST", "/__gateway/message", r#"{"action":"reboot"}"#))
            .await;
        assert_eq!(res.status(), StatusCode::Accepted);
    }

    #[tokio::test]
    async fn pass_through_failure_is_502() {
        let res = service().handle(raw("GET", "/about", "")).await;
        assert_eq!(res.status(), StatusCode::BadGateway);
        assert!(res.text().contains("127.0.0.1:5000/about"));
    }
}
