//! Experimenter Server: Application entry point.

use anyhow::Context;
use clap::Parser;
use experimenter_db::DbManager;
use experimenter_server::{AppState, ServerConfig, build_router};
use experimenter_service::{BugzillaClient, ExperimentService};
use http::HeaderName;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("experimenter=info")),
        )
        .json()
        .init();

    let config = ServerConfig::parse();
    info!(listen = %config.listen, "Starting Experimenter server...");

    let email_header = HeaderName::try_from(config.email_header.as_str())
        .with_context(|| format!("invalid email header name: {}", config.email_header))?;

    let db = DbManager::connect(&config.db_config())
        .await
        .context("opening experiment database")?;

    let service_config = config.service_config();
    let service = ExperimentService::new(
        db.store(),
        BugzillaClient::new(service_config.clone()),
        service_config,
    );
    let router = build_router(AppState::new(service, email_header));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    info!(addr = %config.listen, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Experimenter server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
