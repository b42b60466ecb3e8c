use anyhow::Context;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    info!("Starting frame transcoder...");

    let config = config::settings::AppConfig::new().context("invalid configuration")?;
    let http = infrastructure::http::client::build_http_client(Duration::from_secs(
        config.fetch_timeout_secs,
    ))
    .context("failed to build HTTP client")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let state = state::AppState::new(config, http);
    info!(
        "Transcoding at {} fps, at most {} frames per request, fetch failures: {:?}",
        state.transcode.frame_rate, state.transcode.max_duration, state.transcode.fetch_failure_policy
    );

    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
