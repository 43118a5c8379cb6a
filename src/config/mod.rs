use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Client-side resilience settings, embedded into every rewritten page.
///
/// Serialized field names are the camelCase keys the injected script reads
/// from its configuration global.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ReconnectConfig {
    /// Delay between reconnect attempts, in milliseconds. Must be positive.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Retry budget for one reconnect sequence; 0 disables retries.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

fn default_reconnect_interval_ms() -> u64 {
    3000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

/// Origin the gateway forwards proxied requests to.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_host")]
    pub host: String,
    #[serde(default = "default_upstream_port")]
    pub port: u16,
}

fn default_upstream_host() -> String {
    "localhost".to_string()
}

fn default_upstream_port() -> u16 {
    18789
}

impl UpstreamConfig {
    /// Base URL of the upstream origin, without a trailing slash.
    pub fn origin(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: default_upstream_host(),
            port: default_upstream_port(),
        }
    }
}

/// The gateway's own listener.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:18790".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl GatewayConfig {
    /// Zero is not a usable retry interval; fall back to the default.
    fn sanitize(mut self) -> Self {
        if self.reconnect.reconnect_interval_ms == 0 {
            warn!("reconnect_interval_ms must be positive, using default");
            self.reconnect.reconnect_interval_ms = default_reconnect_interval_ms();
        }
        self
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &str) -> Result<GatewayConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path))?;
    let config: GatewayConfig =
        toml::from_str(&contents).with_context(|| format!("failed to parse config file {}", path))?;
    Ok(config.sanitize())
}

/// Load configuration, falling back to defaults on any failure. A missing or
/// malformed config file is never fatal.
pub fn load_or_default(path: Option<&str>) -> GatewayConfig {
    let Some(path) = path else {
        return GatewayConfig::default();
    };
    match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path, error = %e, "unusable config file, falling back to defaults");
            GatewayConfig::default()
        }
    }
}
