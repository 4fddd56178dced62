//! FocusFlow Timer backend: composes the timer and serves the local control API

use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, Method};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use focusflow_timer::{
    api,
    config::Config,
    logging,
    services::{DisplayRefresher, FileStore, HttpSessionStore, SystemTimeProvider, TimerService},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    logging::init_logging(&config.log_level, config.json_logs);
    logging::log_startup();
    config.log_config();

    config.ensure_data_dir()?;
    let store = FileStore::open(config.storage_path())
        .with_context(|| format!("failed to open {}", config.storage_path().display()))?;

    let sessions = HttpSessionStore::from_base_url(
        &config.api_url()?,
        config.auth_cookie.clone(),
        config.commit_timeout(),
    )?;
    info!(endpoint = %sessions.endpoint(), "Session store configured");

    let timer = TimerService::new(
        Arc::new(store),
        Arc::new(SystemTimeProvider::new()),
        Arc::new(sessions),
        config.timer_settings(),
    );
    let refresher = DisplayRefresher::spawn(timer.clone(), config.refresh_interval());

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    let app = api::router(timer).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!(address = %config.bind_address(), "FocusFlow Timer listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresher.shutdown().await;
    info!("FocusFlow Timer stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        logging::log_error(&e.to_string(), "install Ctrl-C handler", None);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
