// rendezvous/src/bin/server.rs
// Entry point for the `room-rendezvous` binary: parses CLI flags, sets up
// structured logging, builds the router, and serves it with graceful
// shutdown on Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use room_rendezvous::{build_router, AppState, RendezvousConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RendezvousConfig::parse();
    init_logging(&config.log_format);

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config);
    let app = build_router(state).into_make_service_with_connect_info::<std::net::SocketAddr>();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {bind_addr}"))?;
    tracing::info!(%bind_addr, "room-rendezvous listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn init_logging(format: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    if format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true).with_line_number(true)).init();
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl-C handler");
    tracing::info!("shutdown signal received, draining connections");
}
