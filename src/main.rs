use std::sync::Arc;

use order_service::{
    config::AppConfig,
    error::{ConfigError, StartupError},
    jobs::{cache_bootstrap::run_cache_bootstrap, ingestion_worker::start_ingestion_worker},
    router,
    services::{
        ingestion::{IngestionPipeline, PipelineStats},
        order_cache::OrderCache,
        order_feed::start_order_feed,
        order_store::OrderStore,
    },
    AppState,
};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Read before tracing starts; a bad config is reported once logging is up
    let config = AppConfig::from_env();
    let default_filter = match &config {
        Ok(config) => config.default_log_filter(),
        Err(_) => AppConfig::LOCAL_LOG_FILTER,
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Order service failed");
        std::process::exit(1);
    }
}

async fn run(config: Result<AppConfig, ConfigError>) -> Result<(), StartupError> {
    let config = config?;
    tracing::info!(env = %config.env, "Starting order service");

    let store = OrderStore::ensure_schema(&config.postgres).await?;

    let cache = OrderCache::in_memory();
    let report = run_cache_bootstrap(&store, &cache).await?;
    tracing::info!(
        restored = report.restored,
        failed = report.failed,
        "Cache is ready"
    );

    let stats = Arc::new(PipelineStats::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();
    match config.feed.url.clone() {
        Some(url) => {
            let (events_tx, events_rx) = mpsc::channel(config.feed.buffer);
            let pipeline =
                IngestionPipeline::new(Arc::new(store.clone()), cache.clone(), stats.clone());

            tasks.push(start_order_feed(
                url,
                config.feed.clone(),
                events_tx,
                shutdown_rx.clone(),
            ));
            tasks.push(start_ingestion_worker(pipeline, events_rx, shutdown_rx.clone()));
        }
        None => {
            tracing::warn!("ORDER_FEED_URL is not set, ingestion is disabled; serving cached orders only");
        }
    }

    let app = router(AppState {
        cache: cache.clone(),
        stats,
    });

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task ended abnormally");
        }
    }

    if let Err(e) = store.close().await {
        tracing::warn!(error = %e, "Failed to close database connection");
    }
    tracing::info!("Order service stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM and tells the background tasks to stop.
async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown.send(true);
}
