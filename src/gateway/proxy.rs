//! Transparent upstream proxy. Requests arrive here with the namespace
//! prefix already stripped by the router; the exchange is forwarded to the
//! configured origin and the response streamed back, except that HTML bodies
//! are buffered and rewritten to carry the reconnect script.

use crate::gateway::{rewrite, GatewayState, NAMESPACE_PREFIX};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::fmt;
use tracing::{debug, error};

/// Terminal upstream failure for a single proxied request. Every failure is
/// surfaced synchronously to the original caller; nothing is retried or
/// queued.
#[derive(Debug)]
pub enum ProxyFailure {
    /// Connection refused, timeout, or DNS failure.
    Unreachable { target: String, source: reqwest::Error },
    /// The origin accepted the connection but the exchange broke down.
    Exchange { target: String, source: reqwest::Error },
}

impl fmt::Display for ProxyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyFailure::Unreachable { target, source } => {
                write!(f, "upstream {} unreachable: {}", target, source)
            }
            ProxyFailure::Exchange { target, source } => {
                write!(f, "upstream {} exchange failed: {}", target, source)
            }
        }
    }
}

impl std::error::Error for ProxyFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyFailure::Unreachable { source, .. } | ProxyFailure::Exchange { source, .. } => {
                Some(source)
            }
        }
    }
}

/// Fallback handler for everything in the namespace that is not a reserved
/// asset path.
pub async fn proxy_upstream(State(state): State<GatewayState>, req: Request) -> Response {
    match forward(&state, req).await {
        Ok(response) => response,
        Err(failure) => {
            error!(error = %failure, "proxy request failed");
            (
                StatusCode::BAD_GATEWAY,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("better-gateway: {}\n", failure),
            )
                .into_response()
        }
    }
}

async fn forward(state: &GatewayState, req: Request) -> Result<Response, ProxyFailure> {
    let upstream = &state.config.upstream;
    let (parts, body) = req.into_parts();

    // The query string rides along untouched
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("{}{}", upstream.origin(), path_and_query);

    debug!(method = %parts.method, target = %target, "proxying request");

    let mut headers = parts.headers.clone();
    // Framing and connection headers are recomputed for the upstream leg;
    // Host must name the origin, which the client derives from the URL.
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONNECTION);

    let mut builder = state
        .http
        .request(parts.method.clone(), &target)
        .headers(headers);

    // Bodyless methods complete the upstream request immediately; everything
    // else streams the inbound body through without buffering.
    if !matches!(parts.method, Method::GET | Method::HEAD) {
        builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let upstream_response = builder.send().await.map_err(|source| {
        if source.is_connect() || source.is_timeout() {
            ProxyFailure::Unreachable {
                target: target.clone(),
                source,
            }
        } else {
            ProxyFailure::Exchange {
                target: target.clone(),
                source,
            }
        }
    })?;

    let status = upstream_response.status();
    let upstream_headers = upstream_response.headers().clone();

    if is_html(&upstream_headers) {
        // HTML is buffered in full so the script block can be spliced in and
        // the content length recomputed.
        let bytes = upstream_response
            .bytes()
            .await
            .map_err(|source| ProxyFailure::Exchange {
                target: target.clone(),
                source,
            })?;
        let document = String::from_utf8_lossy(&bytes);
        let rewritten =
            rewrite::rewrite_document(&document, NAMESPACE_PREFIX, &state.config.reconnect);

        let mut response = passthrough_response(status, &upstream_headers, true);
        response.headers_mut().insert(
            header::CONTENT_LENGTH,
            HeaderValue::from(rewritten.len()),
        );
        *response.body_mut() = Body::from(rewritten);
        Ok(response)
    } else {
        // Everything else streams through byte-identical to bound memory use
        let mut response = passthrough_response(status, &upstream_headers, false);
        *response.body_mut() = Body::from_stream(upstream_response.bytes_stream());
        Ok(response)
    }
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().to_ascii_lowercase().starts_with("text/html"))
        .unwrap_or(false)
}

/// Response skeleton carrying the upstream status and headers. Connection
/// and framing headers are dropped; the rewritten-HTML case also drops the
/// now-stale content length.
fn passthrough_response(status: StatusCode, upstream_headers: &HeaderMap, rewritten: bool) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    for (name, value) in upstream_headers {
        if name == header::CONNECTION || name == header::TRANSFER_ENCODING {
            continue;
        }
        if rewritten && name == header::CONTENT_LENGTH {
            continue;
        }
        response.headers_mut().append(name, value.clone());
    }
    response
}
