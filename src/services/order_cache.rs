//! Read Cache
//!
//! Denormalized copy of each order, split across five keys (see
//! [`cache_records`](super::cache_records)). Reads are served from here only;
//! the System of Record is consulted once, at startup, to rebuild it.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{CacheError, LookupError, PersistError};
use crate::models::order::{Item, Order};
use crate::services::cache_backend::{CacheBackend, MokaCacheBackend};
use crate::services::cache_records::{
    customer_orders_key, delivery_key, items_key, order_key, payment_key, DeliveryRecord,
    OrderRecord, PaymentRecord,
};
use crate::services::order_store::SystemOfRecord;

#[derive(Clone)]
pub struct OrderCache {
    backend: Arc<dyn CacheBackend>,
}

/// Outcome of a full cache rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub total: usize,
    pub restored: usize,
    pub failed: usize,
}

impl OrderCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Cache on the in-process moka backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MokaCacheBackend::new()))
    }

    /// Write every sub-key of `order`, overwriting any previous copy.
    ///
    /// Sub-keys are written one after another and the first failure stops
    /// the sequence, which can leave a partially updated entry behind.
    pub async fn save_order(&self, order: &Order) -> Result<(), CacheError> {
        let uid = order.order_uid.as_str();

        self.backend
            .put_hash(&order_key(uid), OrderRecord::from_order(order).into_fields())
            .await?;
        self.backend
            .put_hash(
                &delivery_key(uid),
                DeliveryRecord(order.delivery.clone()).into_fields(),
            )
            .await?;
        self.backend
            .put_hash(
                &payment_key(uid),
                PaymentRecord(order.payment.clone()).into_fields(),
            )
            .await?;

        let items = order
            .items
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        self.backend.put_list(&items_key(uid), items).await?;

        self.backend
            .add_to_set(&customer_orders_key(&order.customer_id), uid)
            .await?;

        debug!(order_uid = %uid, items = order.items.len(), "Order cached");
        Ok(())
    }

    /// Rebuild an order from its cached sub-keys.
    pub async fn get_order(&self, order_uid: &str) -> Result<Order, LookupError> {
        let order_fields = self.backend.get_hash(&order_key(order_uid)).await?;
        if order_fields.is_empty() {
            return Err(LookupError::NotFound(order_uid.to_string()));
        }
        let record = OrderRecord::from_fields(&order_fields);

        let delivery = DeliveryRecord::from_fields(
            &self.backend.get_hash(&delivery_key(order_uid)).await?,
        )
        .0;
        let payment =
            PaymentRecord::from_fields(&self.backend.get_hash(&payment_key(order_uid)).await?).0;

        let items = self
            .backend
            .get_list(&items_key(order_uid))
            .await?
            .iter()
            .enumerate()
            .map(|(position, blob)| {
                serde_json::from_str::<Item>(blob).map_err(|source| LookupError::CorruptItem {
                    order_uid: order_uid.to_string(),
                    position,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Order {
            order_uid: record.order_uid,
            track_number: record.track_number,
            entry: record.entry,
            delivery,
            payment,
            items,
            locale: record.locale,
            internal_signature: record.internal_signature,
            customer_id: record.customer_id,
            delivery_service: record.delivery_service,
            shardkey: record.shardkey,
            sm_id: record.sm_id,
            date_created: record.date_created,
            oof_shard: record.oof_shard,
        })
    }

    /// Order ids cached for a customer, ascending.
    pub async fn customer_order_ids(&self, customer_id: &str) -> Result<Vec<String>, CacheError> {
        self.backend
            .set_members(&customer_orders_key(customer_id))
            .await
    }

    /// Re-save every order from the System of Record.
    ///
    /// Best effort: an order that fails to cache is logged and counted, the
    /// rest are still restored. Stale entries are never removed. Only a
    /// failure to read the source is returned as an error.
    pub async fn restore_from(
        &self,
        source: &dyn SystemOfRecord,
    ) -> Result<RestoreReport, PersistError> {
        let started = Instant::now();
        let orders = source.get_all_orders().await?;

        let mut report = RestoreReport {
            total: orders.len(),
            ..Default::default()
        };

        for order in &orders {
            match self.save_order(order).await {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(order_uid = %order.order_uid, error = %e, "Failed to restore order into cache");
                }
            }
        }

        info!(
            total = report.total,
            restored = report.restored,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cache restored from database"
        );
        Ok(report)
    }

    pub fn entry_count(&self) -> u64 {
        self.backend.entry_count()
    }
}
