//! HTTP side of the dev server.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response, Sse, sse::Event, sse::KeepAlive},
    routing::get,
};
use chrono::{DateTime, Utc};
use hyper::ext::ReasonPhrase;
use jsenv_bundler::dev::{ServedResource, error_status};
use jsenv_bundler::transform::AUTORELOAD_CLIENT_PATH;
use jsenv_config::DevConfig;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::Stream;
use tower_http::cors::{Any, CorsLayer};

use crate::dev::{DevEvent, SharedState, error_overlay};
use crate::error::{CliError, Result};

/// Event stream the autoreload client subscribes to.
pub const EVENTS_PATH: &str = "/__jsenv__/events";

const AUTORELOAD_CLIENT: &str = include_str!("../../assets/autoreload.js");

/// Header repeating the reason phrase of a failed request, for clients
/// that do not expose the status line.
pub const REASON_HEADER: &str = "x-jsenv-reason";

pub struct DevServer {
    config: DevConfig,
    state: SharedState,
}

impl DevServer {
    pub fn new(config: DevConfig, state: SharedState) -> Self {
        Self { config, state }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.config.host, self.config.port)
    }

    /// Bind and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// [`CliError::Server`] when the address cannot be bound.
    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| CliError::Server(format!("Failed to bind to {addr}: {e}")))?;

        crate::ui::success(&format!("Development server running at {}", self.server_url()));

        axum::serve(listener, router(self.state, self.config.cors))
            .await
            .map_err(|e| CliError::Server(format!("Server error: {e}")))?;
        Ok(())
    }
}

/// Routes of the dev server. Every path that is not a jsenv endpoint is a
/// project file.
pub fn router(state: SharedState, cors: bool) -> Router {
    let router = Router::new()
        .route(AUTORELOAD_CLIENT_PATH, get(handle_autoreload_client))
        .route(EVENTS_PATH, get(handle_events))
        .fallback(handle_request)
        .with_state(state);
    if cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

async fn handle_autoreload_client() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        AUTORELOAD_CLIENT,
    )
}

async fn handle_events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (id, mut rx) = state.register_client();
    tracing::debug!(client = id, "autoreload client connected");

    let stream = async_stream::stream! {
        if let Ok(connected) = serde_json::to_string(&DevEvent::Connected) {
            yield Ok(Event::default().data(connected));
        }
        while let Some(data) = rx.recv().await {
            yield Ok(Event::default().data(data));
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

async fn handle_request(
    State(state): State<SharedState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request_path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let forwarded: Vec<(String, String)> = headers
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect();

    match state.kitchen().serve(request_path, &forwarded).await {
        Ok(resource) => {
            let if_none_match = header_str(&headers, header::IF_NONE_MATCH);
            let if_modified_since =
                header_str(&headers, header::IF_MODIFIED_SINCE).and_then(parse_http_date);
            if resource.is_not_modified(if_none_match, if_modified_since) {
                tracing::debug!(url = %resource.url, "not modified");
                return (StatusCode::NOT_MODIFIED, validators(&resource)).into_response();
            }
            let mut response_headers = validators(&resource);
            insert(&mut response_headers, header::CONTENT_TYPE, &resource.content_type);
            (StatusCode::OK, response_headers, Body::from(resource.body)).into_response()
        }
        Err(error) => {
            let (code, reason) = error_status(&error);
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status == StatusCode::NOT_FOUND {
                tracing::debug!(path = request_path, "not found");
            } else {
                tracing::warn!(path = request_path, error = %error, "{reason}");
            }

            let mut response_headers = HeaderMap::new();
            insert(&mut response_headers, header::CACHE_CONTROL, "no-cache");
            insert(&mut response_headers, REASON_HEADER, reason);
            let wants_html = header_str(&headers, header::ACCEPT)
                .is_some_and(|accept| accept.contains("text/html"));
            let mut response = if wants_html {
                insert(&mut response_headers, header::CONTENT_TYPE, "text/html; charset=utf-8");
                let html = error_overlay::render(code, reason, &error.to_string());
                (status, response_headers, html).into_response()
            } else {
                insert(&mut response_headers, header::CONTENT_TYPE, "application/json");
                let body = serde_json::json!({
                    "status": code,
                    "reason": reason,
                    "code": miette::Diagnostic::code(&error).map(|code| code.to_string()),
                    "message": error.to_string(),
                });
                (status, response_headers, body.to_string()).into_response()
            };
            // HTTP/1 status line, e.g. "500 parse error".
            response
                .extensions_mut()
                .insert(ReasonPhrase::from_static(reason.as_bytes()));
            response
        }
    }
}

/// `ETag`, `Last-Modified` and `Cache-Control` of a served resource.
fn validators(resource: &ServedResource) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, header::ETAG, &resource.etag);
    if let Some(date) = resource.last_modified.and_then(format_http_date) {
        insert(&mut headers, header::LAST_MODIFIED, &date);
    }
    insert(&mut headers, header::CACHE_CONTROL, "no-cache");
    headers
}

fn insert<K: axum::http::header::IntoHeaderName>(headers: &mut HeaderMap, name: K, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// IMF-fixdate of a millisecond timestamp.
pub fn format_http_date(millis: u64) -> Option<String> {
    let date = DateTime::<Utc>::from_timestamp_millis(i64::try_from(millis).ok()?)?;
    Some(date.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

/// Milliseconds since the epoch of an HTTP date.
pub fn parse_http_date(value: &str) -> Option<u64> {
    let date = DateTime::parse_from_rfc2822(value.trim()).ok()?;
    u64::try_from(date.timestamp_millis()).ok()
}
