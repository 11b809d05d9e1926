use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use gleaner_client::{HttpPageSource, ReqwestFetcher};
use gleaner_core::{RunCoordinator, ScrapeConfig, ScrapeWorker, TracingScrapeReporter};
use gleaner_server::routes;
use gleaner_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gleaner=info".parse()?))
        .with_target(false)
        .init();

    let admin_token = std::env::var("GLEANER_ADMIN_TOKEN")
        .ok()
        .filter(|token| !token.is_empty());
    if admin_token.is_none() {
        tracing::warn!("GLEANER_ADMIN_TOKEN not set, run commands are disabled");
    }
    let port = std::env::var("GLEANER_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let config = ScrapeConfig::from_env()?;
    let fetcher = ReqwestFetcher::from_config(&config).context("Failed to create HTTP client")?;
    let worker = ScrapeWorker::new(fetcher.clone(), &config)?;

    let shutdown = CancellationToken::new();
    let (coordinator, coordinator_task) = RunCoordinator::spawn(
        HttpPageSource::new(fetcher),
        worker,
        TracingScrapeReporter,
        shutdown.clone(),
    );

    let state = Arc::new(AppState {
        coordinator,
        admin_token,
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    coordinator_task
        .await
        .context("Run coordinator panicked")?;

    Ok(())
}

/// Resolves on Ctrl-C and stops the coordinator, which also ends open SSE streams.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
