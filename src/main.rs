use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::connect_to_db;
use crate::infrastructure::media::FfmpegTranscoder;
use crate::infrastructure::process::ProcessRegistry;
use crate::modules::jobs::repository::PgCatalogStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("DATABASE_URL must be set")?;
    let pool = connect_to_db(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let state = AppState::new(
        config.clone(),
        Arc::new(PgCatalogStore::new(pool)),
        Arc::new(FfmpegTranscoder::new(&config)),
        Arc::new(ProcessRegistry::new()),
    );

    let token = CancellationToken::new();
    let mission = tokio::spawn(workers::mission::start_mission_worker(
        state.clone(),
        token.clone(),
    ));

    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop claiming new jobs, then wait for the loop to unwind.
    token.cancel();
    let _ = mission.await;
    info!("Exit");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
