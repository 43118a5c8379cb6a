//! HTTP gateway: serves the resilience assets under a reserved namespace and
//! transparently proxies everything else to the upstream UI server, injecting
//! the reconnect script into HTML responses on the way back.

pub mod assets;
pub mod proxy;
pub mod rewrite;

use crate::config::GatewayConfig;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tracing::debug;

/// Reserved URL namespace owned by the gateway.
pub const NAMESPACE_PREFIX: &str = "/better-gateway";

/// Shared application state
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub http: reqwest::Client,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }
}

/// True only for paths inside the reserved namespace. Everything else is
/// declined so other handlers keep ownership of the rest of the path space.
pub fn should_handle(path: &str) -> bool {
    path.strip_prefix(NAMESPACE_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Router for the reserved namespace only: the fixed asset endpoints plus the
/// upstream proxy for anything else. Mount with [`create_gateway_router`] or
/// nest it into a larger application.
pub fn namespace_router(state: GatewayState) -> Router {
    Router::new()
        .route("/inject.js", get(assets::inject_script))
        .route("/userscript.user.js", get(assets::userscript))
        .route("/help", get(assets::help_page))
        .fallback(proxy::proxy_upstream)
        .with_state(state)
}

/// Complete application router: the gateway owns [`NAMESPACE_PREFIX`], paths
/// outside it are declined.
pub fn create_gateway_router(state: GatewayState) -> Router {
    Router::new()
        .nest(NAMESPACE_PREFIX, namespace_router(state))
        .fallback(decline)
}

async fn decline(uri: Uri) -> impl IntoResponse {
    debug!(path = %uri.path(), "path outside gateway namespace declined");
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_handle_namespace_paths_only() {
        assert!(should_handle("/better-gateway"));
        assert!(should_handle("/better-gateway/"));
        assert!(should_handle("/better-gateway/inject.js"));
        assert!(should_handle("/better-gateway/deep/nested?q=1".split('?').next().unwrap()));

        assert!(!should_handle("/"));
        assert!(!should_handle("/api/events"));
        assert!(!should_handle("/better-gateway-2/")); // Prefix must be a whole segment
        assert!(!should_handle("/better-gatewayx"));
    }
}
