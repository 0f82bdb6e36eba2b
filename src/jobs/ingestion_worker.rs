//! Ingestion Worker
//!
//! The single consumer of the order channel. Events are handled strictly one
//! at a time in arrival order, so System of Record writes follow feed order.
//! Shutdown is checked between events; an event already being processed
//! always runs to completion.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::services::ingestion::IngestionPipeline;

/// Spawn the worker on the runtime.
pub fn start_ingestion_worker(
    pipeline: IngestionPipeline,
    events: mpsc::Receiver<Vec<u8>>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_ingestion_worker(pipeline, events, shutdown))
}

/// Drain `events` through the pipeline until shutdown or until every sender
/// is dropped.
pub async fn run_ingestion_worker(
    pipeline: IngestionPipeline,
    mut events: mpsc::Receiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Ingestion worker started");

    loop {
        if *shutdown.borrow() {
            info!("Shutdown signal received, stopping ingestion worker");
            break;
        }

        tokio::select! {
            biased;

            _ = shutdown.changed() => {
                info!("Shutdown signal received, stopping ingestion worker");
                break;
            }
            payload = events.recv() => match payload {
                Some(payload) => {
                    pipeline.handle_payload(&payload).await;
                }
                None => {
                    info!("Order channel closed, stopping ingestion worker");
                    break;
                }
            },
        }
    }

    let stats = pipeline.stats().snapshot();
    info!(
        received = stats.received,
        cached = stats.cached,
        decode_failed = stats.decode_failed,
        persist_failed = stats.persist_failed,
        cache_failed = stats.cache_failed,
        "Ingestion worker stopped"
    );
}
