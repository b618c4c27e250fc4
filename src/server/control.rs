//! Control plane
//!
//! Small HTTP surface for subscribing, reading and writing the poll interval,
//! and stopping the relay. Every response is `text/plain` and carries
//! `Access-Control-Allow-Origin: *`. When a credential is configured it
//! guards every route.
//!
//! | Route | Methods |
//! |-------|---------|
//! | `/streams/<device>/<stream>?period=<ms>` | GET (WebSocket upgrade) |
//! | `/config/poll` | GET, POST |
//! | `/stop` | GET, POST |
//! | anything else | capability listing |

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::protocol::RoutingKey;
use crate::registry::{Outbound, SubscriberId};

use super::relay::{EventSender, RelayEvent};
use super::runtime::RuntimeConfig;

/// Body of the capability listing
pub const HELP: &str = "/streams/<device>/<stream>?period=<ms> [GET]\n\
/config/poll [GET, POST]\n\
/stop [GET, POST]\n";

const STREAMS_PREFIX: &str = "/streams/";

/// Shared state for control handlers
#[derive(Clone)]
pub struct ControlState {
    runtime: Arc<RuntimeConfig>,
    events: EventSender,
    subscriber_queue: usize,
    next_subscriber_id: Arc<AtomicU64>,
}

impl ControlState {
    pub fn new(runtime: Arc<RuntimeConfig>, events: EventSender, subscriber_queue: usize) -> Self {
        Self {
            runtime,
            events,
            subscriber_queue: subscriber_queue.max(1),
            next_subscriber_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenParams {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SubscribeParams {
    period: Option<String>,
}

/// Build the control router
pub fn create_router(state: ControlState) -> Router {
    Router::new()
        .route("/streams", any(missing_stream_name))
        .route("/streams/", any(missing_stream_name))
        .route("/streams/*name", any(subscribe))
        .route(
            "/config/poll",
            get(read_poll).post(write_poll).fallback(method_not_allowed),
        )
        .route("/stop", get(stop).post(stop).fallback(method_not_allowed))
        .fallback(help)
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .layer(middleware::map_response(allow_any_origin))
        .with_state(state)
}

/// Serve the control plane on a bound listener
pub async fn serve(listener: TcpListener, state: ControlState) -> std::io::Result<()> {
    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await
}

fn plain(status: StatusCode, body: impl Into<String>) -> Response {
    (status, [(CONTENT_TYPE, "text/plain")], body.into()).into_response()
}

async fn allow_any_origin(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// Reject requests without the configured token
///
/// The `token` query parameter wins over an `Authorization: Bearer` header.
async fn require_token(State(state): State<ControlState>, request: Request, next: Next) -> Response {
    let query = Query::<TokenParams>::try_from_uri(request.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();
    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let presented = query.token.as_deref().or(bearer);

    if !state.runtime.authorize(presented) {
        tracing::warn!(path = %request.uri().path(), "Unauthorized control request");
        return plain(StatusCode::FORBIDDEN, "Unauthorized\n");
    }

    next.run(request).await
}

async fn missing_stream_name() -> Response {
    plain(StatusCode::BAD_REQUEST, "Missing stream name\n")
}

async fn method_not_allowed() -> Response {
    plain(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed\n")
}

async fn help() -> Response {
    plain(StatusCode::OK, HELP)
}

async fn read_poll(State(state): State<ControlState>) -> Response {
    plain(StatusCode::OK, format!("{}\n", state.runtime.poll_interval_ms()))
}

/// Replace the poll interval; an unparseable body leaves it unchanged
async fn write_poll(State(state): State<ControlState>, body: Bytes) -> Response {
    match std::str::from_utf8(&body)
        .ok()
        .and_then(|text| text.trim().parse::<u32>().ok())
    {
        Some(value) => state.runtime.set_poll_interval_ms(value),
        None => tracing::debug!(len = body.len(), "Ignoring invalid poll interval"),
    }

    plain(StatusCode::OK, format!("{}\n", state.runtime.poll_interval_ms()))
}

async fn stop(State(state): State<ControlState>) -> Response {
    tracing::info!("Stop requested over control plane");
    state.runtime.request_stop();
    plain(StatusCode::OK, "OK\n")
}

async fn subscribe(
    State(state): State<ControlState>,
    method: Method,
    uri: Uri,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    upgrade: Option<WebSocketUpgrade>,
) -> Response {
    if method != Method::GET {
        return method_not_allowed().await;
    }

    // Hashed as sent, without percent-decoding
    let name = uri.path().strip_prefix(STREAMS_PREFIX).unwrap_or_default();
    if name.is_empty() {
        return missing_stream_name().await;
    }

    let params = Query::<SubscribeParams>::try_from_uri(&uri)
        .map(|Query(params)| params)
        .unwrap_or_default();
    let period_ms = params
        .period
        .as_deref()
        .and_then(|period| period.parse::<u32>().ok())
        .unwrap_or(0);

    let Some(upgrade) = upgrade else {
        return plain(StatusCode::UPGRADE_REQUIRED, "Upgrade required\n");
    };

    let opened = Opened {
        id: SubscriberId(state.next_subscriber_id.fetch_add(1, Ordering::Relaxed)),
        routing_key: RoutingKey::from_name(name),
        throttle: Duration::from_millis(u64::from(period_ms)),
        name: name.to_string(),
        peer: connect_info.map(|ConnectInfo(addr)| addr),
    };

    upgrade.on_upgrade(move |socket| pump(socket, state, opened))
}

struct Opened {
    id: SubscriberId,
    routing_key: RoutingKey,
    throttle: Duration,
    name: String,
    peer: Option<SocketAddr>,
}

/// Drain one subscriber's queue into its WebSocket
async fn pump(socket: WebSocket, state: ControlState, opened: Opened) {
    let id = opened.id;
    let (tx, mut rx) = mpsc::channel(state.subscriber_queue);

    let registered = state
        .events
        .send(RelayEvent::SubscriberOpened {
            id,
            routing_key: opened.routing_key,
            throttle: opened.throttle,
            tx,
            name: opened.name,
            peer: opened.peer,
        })
        .await;
    if registered.is_err() {
        return;
    }

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let message = match outbound {
                    Some(Outbound::Frame(bytes)) => Message::Binary(bytes.to_vec()),
                    Some(Outbound::Ping) => Message::Ping(Vec::new()),
                    None => break,
                };
                if sender.send(message).await.is_err() {
                    break;
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    let _ = state.events.send(RelayEvent::SubscriberClosed { id }).await;
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::AuthToken;
    use crate::server::relay::{event_channel, EventReceiver};

    fn app(token: Option<AuthToken>) -> (Router, Arc<RuntimeConfig>, EventReceiver) {
        let runtime = Arc::new(RuntimeConfig::new(10, token));
        let (tx, rx) = event_channel();
        let router = create_router(ControlState::new(runtime.clone(), tx, 8));
        (router, runtime, rx)
    }

    fn request(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_help_listing() {
        let (router, _, _) = app(None);
        let (status, body) = send(router, request(Method::GET, "/", "")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, HELP);
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let (router, _, _) = app(Some(AuthToken::derive("user", "pass")));

        let (status, body) = send(router.clone(), request(Method::GET, "/streams/a/b", "")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "Unauthorized\n");

        let (status, _) = send(router, request(Method::GET, "/config/poll?token=0123456789abcdef", "")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_authorized_by_query_or_header() {
        let token = AuthToken::derive("user", "pass");
        let (router, _, _) = app(Some(token.clone()));

        let uri = format!("/config/poll?token={}", token.as_str());
        let (status, body) = send(router.clone(), request(Method::GET, &uri, "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "10\n");

        let with_header = Request::builder()
            .uri("/config/poll")
            .header(AUTHORIZATION, format!("Bearer {}", token.as_str()))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(router, with_header).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_stream_name() {
        let (router, _, _) = app(None);

        for uri in ["/streams", "/streams/"] {
            let (status, body) = send(router.clone(), request(Method::GET, uri, "")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, "Missing stream name\n");
        }
    }

    #[tokio::test]
    async fn test_subscribe_wrong_method() {
        let (router, _, _) = app(None);
        let (status, body) = send(router, request(Method::POST, "/streams/a/b", "")).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, "Method not allowed\n");
    }

    #[tokio::test]
    async fn test_subscribe_without_upgrade() {
        let (router, _, mut rx) = app(None);
        let (status, _) = send(router, request(Method::GET, "/streams/a/b?period=100", "")).await;

        assert_eq!(status, StatusCode::UPGRADE_REQUIRED);
        // Nothing was registered
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_poll_read_write() {
        let (router, runtime, _) = app(None);

        let (status, body) = send(router.clone(), request(Method::POST, "/config/poll", "25")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "25\n");
        assert_eq!(runtime.poll_interval_ms(), 25);

        let (_, body) = send(router.clone(), request(Method::POST, "/config/poll", " 40\n")).await;
        assert_eq!(body, "40\n");

        let (_, body) = send(router.clone(), request(Method::GET, "/config/poll", "")).await;
        assert_eq!(body, "40\n");
    }

    #[tokio::test]
    async fn test_poll_invalid_keeps_value() {
        let (router, runtime, _) = app(None);

        for bad in ["abc", "-5", "", "99999999999"] {
            let (status, body) = send(router.clone(), request(Method::POST, "/config/poll", bad)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "10\n");
        }
        assert_eq!(runtime.poll_interval_ms(), 10);
    }

    #[tokio::test]
    async fn test_poll_wrong_method() {
        let (router, _, _) = app(None);
        let (status, body) = send(router, request(Method::PUT, "/config/poll", "5")).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, "Method not allowed\n");
    }

    #[tokio::test]
    async fn test_stop() {
        let (router, runtime, _) = app(None);

        let (status, body) = send(router, request(Method::POST, "/stop", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK\n");
        assert!(runtime.is_stopping());
    }
}
