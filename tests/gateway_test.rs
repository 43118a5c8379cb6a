// Integration tests for the gateway router: reserved asset endpoints and the
// upstream proxy. A small axum app on an ephemeral port stands in for the
// upstream UI server; the gateway router itself is driven with tower's
// oneshot so nothing else needs to listen.

use axum::body::{Body, Bytes};
use axum::extract::RawQuery;
use axum::http::{header, Request, StatusCode};
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use better_gateway::config::{GatewayConfig, ReconnectConfig, UpstreamConfig};
use better_gateway::gateway::{create_gateway_router, GatewayState};
use tower::ServiceExt;

const UPSTREAM_HTML: &str =
    "<html><head><title>ui</title></head><body><p>upstream page</p></body></html>";
const BLOB: &[u8] = &[0x00, 0x01, 0xFE, 0xFF, 0x42];

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// Serve a stand-in upstream UI on an ephemeral port, returning the port.
async fn spawn_upstream() -> u16 {
    let app = Router::new()
        .route("/", get(|| async { Html(UPSTREAM_HTML) }))
        .route(
            "/blob",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/octet-stream")],
                    BLOB.to_vec(),
                )
            }),
        )
        .route("/echo", post(|body: Bytes| async move { body }))
        .route(
            "/search",
            get(|RawQuery(query): RawQuery| async move { query.unwrap_or_default() }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

/// A port on which nothing listens, so connections are refused.
async fn refused_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn gateway_app(upstream_port: u16, reconnect: ReconnectConfig) -> Router {
    let config = GatewayConfig {
        upstream: UpstreamConfig {
            host: "127.0.0.1".to_string(),
            port: upstream_port,
        },
        reconnect,
        ..GatewayConfig::default()
    };
    create_gateway_router(GatewayState::new(config))
}

async fn body_bytes(response: axum::response::Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

// ── Asset endpoints ───────────────────────────────────────────────────────────

/// GET prefix/inject.js carries the configured values verbatim and no-cache
#[tokio::test]
async fn test_inject_js_serves_config_and_script() {
    let app = gateway_app(
        1, // Upstream never contacted for asset endpoints
        ReconnectConfig {
            reconnect_interval_ms: 5000,
            max_reconnect_attempts: 20,
        },
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/better-gateway/inject.js")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/javascript"
    );

    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(body.starts_with(
        r#"window.__betterGatewayConfig = {"reconnectIntervalMs":5000,"maxReconnectAttempts":20};"#
    ));
    assert!(body.contains("GatewayWebSocket"));
}

#[tokio::test]
async fn test_userscript_is_an_attachment() {
    let app = gateway_app(1, ReconnectConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/better-gateway/userscript.user.js")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("attachment"));

    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(body.starts_with("// ==UserScript=="));
    assert!(body.contains("window.__betterGatewayConfig"));
}

#[tokio::test]
async fn test_help_page_embeds_bookmarklet() {
    let app = gateway_app(1, ReconnectConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/better-gateway/help")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/html"));

    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(body.contains("href=\"javascript:"));
    assert!(body.contains("userscript.user.js"));
}

// ── Proxy passthrough ─────────────────────────────────────────────────────────

/// A healthy upstream root comes back rewritten with exactly one config
/// assignment and one base-href marker, and a recomputed content length
#[tokio::test]
async fn test_proxied_html_is_rewritten_exactly_once() {
    let port = spawn_upstream().await;
    let app = gateway_app(port, ReconnectConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/better-gateway/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_length: usize = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();

    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert_eq!(content_length, body.len());
    assert_eq!(body.matches("<base href=\"/better-gateway/\">").count(), 1);
    assert_eq!(body.matches("window.__betterGatewayConfig = {").count(), 1);
    assert!(body.contains("<p>upstream page</p>"));
}

/// Non-HTML bodies stream through byte-identical with their content type
#[tokio::test]
async fn test_non_html_body_is_byte_identical() {
    let port = spawn_upstream().await;
    let app = gateway_app(port, ReconnectConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/better-gateway/blob")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/octet-stream"
    );
    assert_eq!(body_bytes(response).await.as_ref(), BLOB);
}

/// Request bodies are forwarded for methods that carry one
#[tokio::test]
async fn test_post_body_reaches_upstream() {
    let port = spawn_upstream().await;
    let app = gateway_app(port, ReconnectConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/better-gateway/echo")
                .body(Body::from("ping across the proxy"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), b"ping across the proxy");
}

#[tokio::test]
async fn test_query_string_is_preserved() {
    let port = spawn_upstream().await;
    let app = gateway_app(port, ReconnectConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/better-gateway/search?q=reconnect&page=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), b"q=reconnect&page=2");
}

/// Unknown sub-paths are plain passthrough: the upstream's not-found comes
/// back unchanged
#[tokio::test]
async fn test_unknown_subpath_yields_upstream_not_found() {
    let port = spawn_upstream().await;
    let app = gateway_app(port, ReconnectConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/better-gateway/no-such-page")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ── Failure handling ──────────────────────────────────────────────────────────

/// Upstream connection refused ⇒ 502 with a one-line diagnostic, no retry
#[tokio::test]
async fn test_refused_upstream_returns_bad_gateway() {
    let port = refused_port().await;
    let app = gateway_app(port, ReconnectConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/better-gateway/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(body.starts_with("better-gateway: "));
    assert!(body.contains("unreachable"));
    assert!(body.contains(&format!("127.0.0.1:{}", port)));
}

/// Paths outside the reserved namespace are declined
#[tokio::test]
async fn test_outside_namespace_is_declined() {
    let port = spawn_upstream().await;
    let app = gateway_app(port, ReconnectConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
