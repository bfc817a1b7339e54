use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use full_scan::config::AppConfig;
use full_scan::github::TokenConnector;
use full_scan::persistence::{FileCursorStore, FileRecordStore};
use full_scan::scan::{ScanDriver, run_schedule, trigger_channel};
use full_scan::server::{AppState, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "full_scan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("reading configuration")?;
    info!(
        state_dir = %config.state_dir.display(),
        listen_addr = %config.listen_addr,
        cursor = %config.scan.cursor_name,
        "Starting full scan worker"
    );

    let records = Arc::new(
        FileRecordStore::open(&config.state_dir).context("opening record store")?,
    );
    let cursors = Arc::new(FileCursorStore::new(&config.state_dir));
    let connector = TokenConnector::new(config.token.clone()).with_retry(config.retry);

    let shutdown = CancellationToken::new();
    let (handle, mut gate) = trigger_channel(config.scan.trigger_capacity, config.scan.poll_interval);

    let schedule = tokio::spawn(run_schedule(
        handle.clone(),
        config.scan.schedule_interval,
        shutdown.clone(),
    ));

    let mut driver = ScanDriver::new(connector, records, cursors.clone(), &config.scan);
    let worker_shutdown = shutdown.clone();
    let worker = tokio::spawn(async move {
        driver.run(&mut gate, &worker_shutdown).await;
    });

    let app = build_router(AppState::new(handle, cursors));
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!("listening on {}", config.listen_addr);

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
    shutdown.cancel();

    worker.await.context("scan worker panicked")?;
    schedule.await.context("scan schedule panicked")?;
    server
        .await
        .context("HTTP server panicked")?
        .context("HTTP server failed")?;

    info!("Shut down cleanly");
    Ok(())
}
