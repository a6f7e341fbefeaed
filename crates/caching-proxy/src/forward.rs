//! Request forwarding to the origin server

use crate::error::{ProxyError, Result};
use axum::body::Bytes;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, Method, Uri};
use file_response_cache::CachedResponse;
use reqwest::{redirect, Client};
use tracing::{debug, warn};
use url::Url;

/// Connection-scoped headers that must not be relayed between hops
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// HTTP client for relaying requests to the configured origin
pub struct OriginForwarder {
    client: Client,
    origin: Url,
}

impl OriginForwarder {
    /// Create a forwarder for `origin`. Redirects are passed back to the
    /// client rather than followed.
    pub fn new(origin: Url) -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Origin URL for an incoming request URI, keeping its path and query
    pub fn target_url(&self, uri: &Uri) -> Url {
        let mut url = self.origin.clone();
        url.set_path(uri.path());
        url.set_query(uri.query());
        url
    }

    /// Send the request to the origin and buffer the whole response
    pub async fn forward(
        &self,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<CachedResponse> {
        let url = self.target_url(uri);

        let mut outbound = headers.clone();
        strip_hop_by_hop(&mut outbound);
        outbound.remove(HOST);
        outbound.remove(CONTENT_LENGTH);

        debug!(method = %method, url = %url, "Forwarding request to origin");

        let mut request = self.client.request(method, url.clone()).headers(outbound);
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Failed to reach origin");
            ProxyError::OriginFetch(e.to_string())
        })?;

        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);

        let body = response.bytes().await.map_err(|e| {
            warn!(url = %url, error = %e, "Failed to read origin response body");
            ProxyError::OriginFetch(e.to_string())
        })?;

        debug!(
            url = %url,
            status = %status,
            size = body.len(),
            "Fetched response from origin"
        );

        Ok(CachedResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in HOP_BY_HOP_HEADERS
        .iter()
        .copied()
        .chain(listed.iter().map(String::as_str))
    {
        headers.remove(name);
    }
}
