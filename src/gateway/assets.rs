//! The fixed set of reserved sub-paths served independently of the proxy:
//! the injectable reconnect script, a userscript wrapper for pages the
//! gateway does not front, and a help/landing page with a bookmarklet.

use crate::config::{GatewayConfig, ReconnectConfig};
use crate::gateway::{GatewayState, NAMESPACE_PREFIX};
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use std::fmt;

/// Browser-side rendition of the reconnect engine, served verbatim after the
/// configuration assignment.
pub const RECONNECT_SCRIPT: &str = include_str!("../../assets/reconnect.js");

/// Structured not-found for names outside the reserved set.
#[derive(Debug, PartialEq, Eq)]
pub enum AssetError {
    UnknownAsset(String),
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::UnknownAsset(name) => write!(f, "unknown gateway asset: {}", name),
        }
    }
}

impl std::error::Error for AssetError {}

/// Resolve a reserved asset name to its content type and rendered body.
pub fn serve_asset(name: &str, config: &GatewayConfig) -> Result<(&'static str, String), AssetError> {
    match name {
        "inject.js" => Ok(("application/javascript", inject_body(&config.reconnect))),
        "userscript.user.js" => Ok(("application/javascript", userscript_body(config))),
        "help" => Ok(("text/html; charset=utf-8", help_body(config))),
        other => Err(AssetError::UnknownAsset(other.to_string())),
    }
}

/// The assignment the page must evaluate before the script runs. The script
/// falls back to built-in defaults when the global is absent, so a missing
/// assignment is degraded, never fatal.
pub fn config_assignment(config: &ReconnectConfig) -> String {
    let json = serde_json::to_string(config).expect("reconnect config serializes");
    format!("window.__betterGatewayConfig = {};", json)
}

fn inject_body(config: &ReconnectConfig) -> String {
    format!("{}\n{}", config_assignment(config), RECONNECT_SCRIPT)
}

fn userscript_body(config: &GatewayConfig) -> String {
    let upstream = &config.upstream;
    format!(
        "// ==UserScript==\n\
         // @name         better-gateway reconnect\n\
         // @namespace    better-gateway\n\
         // @version      {version}\n\
         // @description  Keeps the {host}:{port} UI WebSocket alive across connection drops\n\
         // @match        http://{host}:{port}/*\n\
         // @run-at       document-start\n\
         // @grant        none\n\
         // ==/UserScript==\n\n{body}",
        version = env!("CARGO_PKG_VERSION"),
        host = upstream.host,
        port = upstream.port,
        body = inject_body(&config.reconnect),
    )
}

fn help_body(config: &GatewayConfig) -> String {
    let bookmarklet = format!(
        "javascript:{}",
        urlencoding::encode(&inject_body(&config.reconnect))
    );
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>better-gateway</title>
<style>
  body {{ font: 15px/1.5 sans-serif; max-width: 42em; margin: 3em auto; padding: 0 1em; }}
  code {{ background: #f2f2f2; padding: 1px 4px; border-radius: 3px; }}
  a.bookmarklet {{ display: inline-block; padding: 6px 12px; background: #455a64;
    color: #fff; border-radius: 4px; text-decoration: none; }}
</style>
</head>
<body>
<h1>better-gateway</h1>
<p>This gateway fronts <code>{origin}</code> and makes the UI's WebSocket
connection self-healing: dropped connections are retried automatically and a
small status indicator keeps you informed.</p>

<h2>Use it</h2>
<p>Browse the UI through <code>{prefix}/</code> and the reconnect script is
injected into every page automatically.</p>

<h2>Userscript</h2>
<p>If you prefer talking to the UI directly, install the
<a href="{prefix}/userscript.user.js">userscript</a> in your userscript
manager instead.</p>

<h2>Bookmarklet</h2>
<p>One-off sessions: drag
<a class="bookmarklet" href="{bookmarklet}">gateway reconnect</a>
to your bookmarks bar and click it on any UI page.</p>
</body>
</html>
"#,
        origin = config.upstream.origin(),
        prefix = NAMESPACE_PREFIX,
        bookmarklet = bookmarklet,
    )
}

/// GET {prefix}/inject.js - configuration assignment followed by the script
pub async fn inject_script(State(state): State<GatewayState>) -> Response {
    let body = inject_body(&state.config.reconnect);
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// GET {prefix}/userscript.user.js - downloadable userscript
pub async fn userscript(State(state): State<GatewayState>) -> Response {
    let body = userscript_body(&state.config);
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"better-gateway.user.js\"",
            ),
        ],
        body,
    )
        .into_response()
}

/// GET {prefix}/help - landing page
pub async fn help_page(State(state): State<GatewayState>) -> Html<String> {
    Html(help_body(&state.config))
}
