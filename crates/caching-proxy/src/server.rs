//! HTTP server and request dispatch
//!
//! Every request goes through [`dispatch`]: safe methods are answered from the
//! cache when possible, everything else is forwarded to the origin untouched.

use crate::forward::OriginForwarder;
use crate::inflight::KeyLocks;
use crate::key::derive_key;
use crate::types::{CacheStatus, X_CACHE};
use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use file_response_cache::{CachedResponse, FileCache};
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: Arc<FileCache>,
    pub forwarder: OriginForwarder,
    pub unique_by_user: bool,
    pub inflight: KeyLocks,
}

impl ServerState {
    pub fn new(cache: Arc<FileCache>, forwarder: OriginForwarder, unique_by_user: bool) -> Self {
        Self {
            cache,
            forwarder,
            unique_by_user,
            inflight: KeyLocks::new(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router. Every path and method reaches [`dispatch`].
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server, running until `shutdown` resolves
pub async fn start_server<F>(state: SharedState, addr: &str, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let origin = state.forwarder.origin().clone();
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        origin = %origin,
        "Starting caching proxy server"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Methods whose responses may be cached
pub fn is_safe_method(method: &Method) -> bool {
    let method = method.as_str();
    ["GET", "HEAD", "OPTIONS"]
        .iter()
        .any(|safe| method.eq_ignore_ascii_case(safe))
}

async fn dispatch(State(state): State<SharedState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let body = match body::to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(e) => {
            warn!(url = %target, error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
        }
    };

    if !is_safe_method(&parts.method) {
        let response = match forward(&state, &parts, body).await {
            Some(fetched) => cached_response(fetched, CacheStatus::Bypass),
            None => origin_failure(),
        };
        log_outcome(&parts.method, &target, CacheStatus::Bypass, &response);
        return response;
    }

    let key = derive_key(
        &target,
        state.unique_by_user,
        header_str(&parts.headers, header::USER_AGENT),
        header_str(&parts.headers, header::COOKIE),
    );

    if let Some(hit) = state.cache.get_entry(&key).await {
        let response = cached_response(hit, CacheStatus::Hit);
        log_outcome(&parts.method, &target, CacheStatus::Hit, &response);
        return response;
    }

    let guard = state.inflight.lock(&key).await;

    // A concurrent request may have populated the entry while we waited
    if let Some(hit) = state.cache.get_entry(&key).await {
        drop(guard);
        let response = cached_response(hit, CacheStatus::Hit);
        log_outcome(&parts.method, &target, CacheStatus::Hit, &response);
        return response;
    }

    let Some(fetched) = forward(&state, &parts, body).await else {
        let response = origin_failure();
        log_outcome(&parts.method, &target, CacheStatus::Miss, &response);
        return response;
    };

    // Populate the cache without delaying the client. The key stays locked
    // until the write is done.
    let cache = state.cache.clone();
    let entry = fetched.clone();
    let write_key = key.clone();
    tokio::spawn(async move {
        if let Err(e) = cache.put_entry(&write_key, &entry).await {
            warn!(key = %write_key, error = %e, "Failed to cache response");
        }
        drop(guard);
    });

    let response = cached_response(fetched, CacheStatus::Miss);
    log_outcome(&parts.method, &target, CacheStatus::Miss, &response);
    response
}

async fn forward(state: &ServerState, parts: &Parts, body: body::Bytes) -> Option<CachedResponse> {
    match state
        .forwarder
        .forward(parts.method.clone(), &parts.uri, &parts.headers, body)
        .await
    {
        Ok(fetched) => Some(fetched),
        Err(e) => {
            error!(method = %parts.method, url = %parts.uri, error = %e, "Failed to fetch from origin");
            None
        }
    }
}

fn cached_response(cached: CachedResponse, status: CacheStatus) -> Response {
    let mut response = Response::new(Body::from(cached.body));
    *response.status_mut() = cached.status;
    *response.headers_mut() = cached.headers;
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(status.header_value()));
    response
}

fn origin_failure() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        [(X_CACHE, CacheStatus::Miss.header_value())],
        "Failed to fetch data from origin",
    )
        .into_response()
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn log_outcome(method: &Method, target: &str, cache: CacheStatus, response: &Response) {
    info!(
        cache = %cache,
        method = %method,
        url = %target,
        status = response.status().as_u16(),
        "Cache {} for URL: {}",
        cache,
        target
    );
}
