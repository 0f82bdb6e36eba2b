//! Order Feed
//!
//! WebSocket client for the inbound order stream. Every text or binary frame
//! is one raw order event and is forwarded, unparsed, into the ingestion
//! channel. The connection is re-established after a delay whenever it drops.
//! Delivery is at-most-once: frames in flight during a reconnect are lost.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};

use crate::config::OrderFeedConfig;

#[derive(Debug, Serialize)]
struct SubscribeMessage<'a> {
    op: &'a str,
    topic: &'a str,
}

/// Why a single connection ended
#[derive(Debug, PartialEq, Eq)]
enum ConnectionEnd {
    /// Server closed or the stream ran out; reconnect
    Closed,
    /// The ingestion side hung up; stop for good
    ReceiverGone,
}

/// Spawn the feed task. It runs until `shutdown` fires or the receiving end
/// of `events` is dropped.
pub fn start_order_feed(
    url: String,
    config: OrderFeedConfig,
    events: mpsc::Sender<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(url = %url, topic = %config.topic, "Starting order feed");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                result = run_connection(&url, &config.topic, &events) => match result {
                    Ok(ConnectionEnd::ReceiverGone) => {
                        info!("Ingestion channel closed, stopping order feed");
                        break;
                    }
                    Ok(ConnectionEnd::Closed) => {
                        warn!(delay_secs = config.reconnect_delay.as_secs(), "Order feed connection ended, reconnecting");
                    }
                    Err(e) => {
                        error!(error = %e, delay_secs = config.reconnect_delay.as_secs(), "Order feed connection failed, reconnecting");
                    }
                },
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(config.reconnect_delay) => {}
            }
        }

        info!("Order feed stopped");
    })
}

async fn run_connection(
    url: &str,
    topic: &str,
    events: &mpsc::Sender<Vec<u8>>,
) -> Result<ConnectionEnd, Box<dyn std::error::Error + Send + Sync>> {
    let (ws_stream, _) = connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();

    let subscribe = serde_json::to_string(&SubscribeMessage {
        op: "subscribe",
        topic,
    })?;
    write.send(Message::Text(subscribe)).await?;
    info!(url = %url, topic = %topic, "Subscribed to order feed");

    while let Some(frame) = read.next().await {
        let payload = match frame? {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(bytes) => bytes,
            Message::Close(_) => {
                info!("Order feed closed by server");
                return Ok(ConnectionEnd::Closed);
            }
            other => {
                trace!(frame = ?other, "Ignoring control frame");
                continue;
            }
        };

        if payload.is_empty() {
            warn!("Empty order feed frame, skipping");
            continue;
        }

        debug!(bytes = payload.len(), "Order event received");
        if events.send(payload).await.is_err() {
            return Ok(ConnectionEnd::ReceiverGone);
        }
    }

    info!("Order feed stream ended");
    Ok(ConnectionEnd::Closed)
}
