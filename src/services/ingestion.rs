//! Ingestion Pipeline
//!
//! Takes one raw feed payload at a time through decode, persist and cache.
//! Each failure is reported here, once, and the event is dropped; nothing is
//! retried and a successful persist is never rolled back because the cache
//! write after it failed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::order::Order;
use crate::services::order_cache::OrderCache;
use crate::services::order_store::SystemOfRecord;

/// Terminal state of one inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Persisted and visible to reads
    Cached { order_uid: String },
    /// Unusable payload, never reached the System of Record
    DecodeFailed,
    /// Rejected by the System of Record, not cached
    PersistFailed { order_uid: String },
    /// Durable but not readable until the next cache bootstrap
    CacheFailed { order_uid: String },
}

/// Running counters per outcome
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    cached: AtomicU64,
    decode_failed: AtomicU64,
    persist_failed: AtomicU64,
    cache_failed: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub cached: u64,
    pub decode_failed: u64,
    pub persist_failed: u64,
    pub cache_failed: u64,
}

impl PipelineStats {
    fn record(&self, outcome: &IngestOutcome) {
        self.received.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            IngestOutcome::Cached { .. } => &self.cached,
            IngestOutcome::DecodeFailed => &self.decode_failed,
            IngestOutcome::PersistFailed { .. } => &self.persist_failed,
            IngestOutcome::CacheFailed { .. } => &self.cache_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            decode_failed: self.decode_failed.load(Ordering::Relaxed),
            persist_failed: self.persist_failed.load(Ordering::Relaxed),
            cache_failed: self.cache_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn SystemOfRecord>,
    cache: OrderCache,
    stats: Arc<PipelineStats>,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn SystemOfRecord>, cache: OrderCache, stats: Arc<PipelineStats>) -> Self {
        Self { store, cache, stats }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Decode a raw payload and run it through the pipeline.
    pub async fn handle_payload(&self, payload: &[u8]) -> IngestOutcome {
        let outcome = match Order::decode(payload) {
            Ok(order) => self.process(&order).await,
            Err(e) => {
                warn!(error = %e, bytes = payload.len(), "Dropping undecodable order event");
                IngestOutcome::DecodeFailed
            }
        };
        self.stats.record(&outcome);
        outcome
    }

    /// Run an already decoded order through persist and cache.
    pub async fn handle_order(&self, order: &Order) -> IngestOutcome {
        let outcome = self.process(order).await;
        self.stats.record(&outcome);
        outcome
    }

    async fn process(&self, order: &Order) -> IngestOutcome {
        let order_uid = order.order_uid.clone();
        debug!(order_uid = %order_uid, "Got new order");

        if let Err(e) = self.store.insert_order(order).await {
            warn!(order_uid = %order_uid, error = %e, "Failed to persist order, dropping event");
            return IngestOutcome::PersistFailed { order_uid };
        }
        debug!(order_uid = %order_uid, "Order is saved in database");

        if let Err(e) = self.cache.save_order(order).await {
            warn!(
                order_uid = %order_uid,
                error = %e,
                "Order persisted but not cached; unreadable until next cache restore"
            );
            return IngestOutcome::CacheFailed { order_uid };
        }
        debug!(order_uid = %order_uid, "Order is saved in cache");

        IngestOutcome::Cached { order_uid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheError, PersistError};
    use crate::services::cache_backend::CacheBackend;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory System of Record that rejects duplicate order ids
    #[derive(Default)]
    struct MemoryStore {
        orders: Mutex<Vec<Order>>,
    }

    #[async_trait]
    impl SystemOfRecord for MemoryStore {
        async fn insert_order(&self, order: &Order) -> Result<(), PersistError> {
            let mut orders = self.orders.lock().await;
            if orders.iter().any(|o| o.order_uid == order.order_uid) {
                return Err(PersistError::Duplicate {
                    order_uid: order.order_uid.clone(),
                });
            }
            orders.push(order.clone());
            Ok(())
        }

        async fn get_all_orders(&self) -> Result<Vec<Order>, PersistError> {
            Ok(self.orders.lock().await.clone())
        }
    }

    struct UnavailableCache;

    #[async_trait]
    impl CacheBackend for UnavailableCache {
        async fn put_hash(&self, _: &str, _: HashMap<String, String>) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
        async fn get_hash(&self, _: &str) -> Result<HashMap<String, String>, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
        async fn put_list(&self, _: &str, _: Vec<String>) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
        async fn get_list(&self, _: &str) -> Result<Vec<String>, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
        async fn add_to_set(&self, _: &str, _: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
        async fn set_members(&self, _: &str) -> Result<Vec<String>, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
        fn entry_count(&self) -> u64 {
            0
        }
    }

    fn payload(uid: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "order_uid": uid,
            "track_number": "WBILMTESTTRACK",
            "entry": "WBIL",
            "delivery": {
                "name": "Test Testov", "phone": "+9720000000", "zip": "2639809",
                "city": "Kiryat Mozkin", "address": "Ploshad Mira 15",
                "region": "Kraiot", "email": "test@gmail.com"
            },
            "payment": {
                "transaction": format!("tx-{}", uid), "currency": "USD",
                "provider": "wbpay", "amount": 1817, "payment_dt": 1637907727,
                "bank": "alpha", "delivery_cost": 1500, "goods_total": 317, "custom_fee": 0
            },
            "items": [{
                "chrt_id": 9934930, "track_number": "WBILMTESTTRACK", "price": 453,
                "rid": "ab4219087a764ae0btest", "name": "Mascaras", "sale": 30,
                "size": "0", "total_price": 317, "nm_id": 2389212,
                "brand": "Vivienne Sabo", "status": 202
            }],
            "locale": "en",
            "customer_id": "test",
            "delivery_service": "meest",
            "shardkey": 9,
            "sm_id": 99,
            "date_created": "2021-11-26T06:22:19Z",
            "oof_shard": "1"
        }))
        .unwrap()
    }

    fn pipeline(store: Arc<MemoryStore>, cache: OrderCache) -> IngestionPipeline {
        IngestionPipeline::new(store, cache, Arc::new(PipelineStats::default()))
    }

    #[tokio::test]
    async fn test_valid_event_is_persisted_and_cached() {
        let store = Arc::new(MemoryStore::default());
        let cache = OrderCache::in_memory();
        let pipeline = pipeline(store.clone(), cache.clone());

        let outcome = pipeline.handle_payload(&payload("o-1")).await;

        assert_eq!(outcome, IngestOutcome::Cached { order_uid: "o-1".to_string() });
        assert_eq!(store.get_all_orders().await.unwrap().len(), 1);
        assert_eq!(cache.get_order("o-1").await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_event_never_reaches_store() {
        let store = Arc::new(MemoryStore::default());
        let pipeline = pipeline(store.clone(), OrderCache::in_memory());

        let mut value: serde_json::Value = serde_json::from_slice(&payload("o-1")).unwrap();
        value.as_object_mut().unwrap().remove("order_uid");
        let outcome = pipeline
            .handle_payload(&serde_json::to_vec(&value).unwrap())
            .await;

        assert_eq!(outcome, IngestOutcome::DecodeFailed);
        assert!(store.get_all_orders().await.unwrap().is_empty());
        assert_eq!(pipeline.stats().snapshot().decode_failed, 1);
    }

    #[tokio::test]
    async fn test_duplicate_is_dropped_without_touching_cache() {
        let store = Arc::new(MemoryStore::default());
        let cache = OrderCache::in_memory();
        let pipeline = pipeline(store.clone(), cache.clone());

        pipeline.handle_payload(&payload("o-1")).await;
        let entries_before = cache.customer_order_ids("test").await.unwrap();
        let outcome = pipeline.handle_payload(&payload("o-1")).await;

        assert_eq!(outcome, IngestOutcome::PersistFailed { order_uid: "o-1".to_string() });
        assert_eq!(store.get_all_orders().await.unwrap().len(), 1);
        assert_eq!(cache.customer_order_ids("test").await.unwrap(), entries_before);
    }

    #[tokio::test]
    async fn test_cache_failure_keeps_order_durable() {
        let store = Arc::new(MemoryStore::default());
        let pipeline = pipeline(store.clone(), OrderCache::new(Arc::new(UnavailableCache)));

        let outcome = pipeline.handle_payload(&payload("o-1")).await;

        assert_eq!(outcome, IngestOutcome::CacheFailed { order_uid: "o-1".to_string() });
        assert_eq!(store.get_all_orders().await.unwrap().len(), 1);

        // A later restore into a working cache makes it readable
        let cache = OrderCache::in_memory();
        cache.restore_from(store.as_ref()).await.unwrap();
        assert!(cache.get_order("o-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_stats_count_each_outcome() {
        let store = Arc::new(MemoryStore::default());
        let pipeline = pipeline(store, OrderCache::in_memory());

        pipeline.handle_payload(&payload("a")).await;
        pipeline.handle_payload(&payload("a")).await;
        pipeline.handle_payload(b"").await;

        assert_eq!(
            pipeline.stats().snapshot(),
            StatsSnapshot {
                received: 3,
                cached: 1,
                decode_failed: 1,
                persist_failed: 1,
                cache_failed: 0,
            }
        );
    }
}
