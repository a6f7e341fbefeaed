//! Throwaway origin server for forwarding and dispatch tests

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, HOST, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub struct TestOrigin {
    pub addr: SocketAddr,
    pub url: Url,
    requests: Arc<AtomicUsize>,
}

impl TestOrigin {
    /// Number of requests the origin has received
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Start an origin on an ephemeral local port.
///
/// Routes:
/// - `/counter`: `count=N` where N is the origin's request count
/// - `/slow`: like `/counter` after a 200ms delay
/// - `/echo`: `METHOD /path?query body`, echoing `x-test` and `Host`
/// - `/missing`: 404 with two `Set-Cookie` values
/// - `/redirect`: 302 to `/counter`
pub async fn spawn_origin() -> TestOrigin {
    let requests = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .fallback(origin_handler)
        .with_state(requests.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestOrigin {
        addr,
        url: Url::parse(&format!("http://{}", addr)).unwrap(),
        requests,
    }
}

/// An origin URL nothing is listening on
pub async fn unreachable_origin() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{}", addr)).unwrap()
}

async fn origin_handler(
    State(requests): State<Arc<AtomicUsize>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let count = requests.fetch_add(1, Ordering::SeqCst) + 1;

    match uri.path() {
        "/counter" => counter_response(count),
        "/slow" => {
            tokio::time::sleep(Duration::from_millis(200)).await;
            counter_response(count)
        }
        "/echo" => {
            let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            let mut text = format!("{} {}", method, target);
            if !body.is_empty() {
                text.push(' ');
                text.push_str(&String::from_utf8_lossy(&body));
            }

            let mut response = Response::new(Body::from(text));
            if let Some(value) = headers.get("x-test") {
                response.headers_mut().insert("x-echo-test", value.clone());
            }
            if let Some(value) = headers.get(HOST) {
                response.headers_mut().insert("x-echo-host", value.clone());
            }
            response
        }
        "/missing" => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header(CONTENT_TYPE, "text/plain")
            .header(SET_COOKIE, "a=1")
            .header(SET_COOKIE, "b=2")
            .body(Body::from("missing"))
            .unwrap(),
        "/redirect" => Response::builder()
            .status(StatusCode::FOUND)
            .header(LOCATION, "/counter")
            .body(Body::empty())
            .unwrap(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn counter_response(count: usize) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain")
        .header("x-origin", "test")
        .body(Body::from(format!("count={}", count)))
        .unwrap()
}
