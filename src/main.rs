use anyhow::{Context, Result};
use better_gateway::config;
use better_gateway::gateway::{self, GatewayState};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "better_gateway=info".into()),
        )
        .init();

    // Optional config file path as the first argument
    let config_path = std::env::args().nth(1);
    let config = config::load_or_default(config_path.as_deref());

    info!(
        upstream = %config.upstream.origin(),
        interval_ms = config.reconnect.reconnect_interval_ms,
        max_attempts = config.reconnect.max_reconnect_attempts,
        "better-gateway starting"
    );

    let listen_addr = config.server.listen_addr.clone();
    let state = GatewayState::new(config);
    let app = gateway::create_gateway_router(state).layer(TraceLayer::new_for_http());

    let addr: std::net::SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", listen_addr))?;
    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
