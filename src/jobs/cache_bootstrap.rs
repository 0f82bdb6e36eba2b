//! Cache Bootstrap
//!
//! Rebuilds the Read Cache from the System of Record once, at startup,
//! before the ingestion worker and HTTP server are started. Blocking and
//! without a timeout; a failure to read the System of Record aborts startup.

use tracing::{info, warn};

use crate::error::StartupError;
use crate::services::order_cache::{OrderCache, RestoreReport};
use crate::services::order_store::SystemOfRecord;

pub async fn run_cache_bootstrap(
    store: &dyn SystemOfRecord,
    cache: &OrderCache,
) -> Result<RestoreReport, StartupError> {
    info!("Restoring cache from database");

    let report = cache.restore_from(store).await?;

    if report.failed > 0 {
        warn!(
            failed = report.failed,
            total = report.total,
            "Some orders could not be cached and stay unreadable until the next restart"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistError;
    use crate::models::order::Order;
    use async_trait::async_trait;
    use sea_orm::DbErr;

    struct BrokenStore;

    #[async_trait]
    impl SystemOfRecord for BrokenStore {
        async fn insert_order(&self, _order: &Order) -> Result<(), PersistError> {
            Err(PersistError::Database(DbErr::Custom("down".to_string())))
        }
        async fn get_all_orders(&self) -> Result<Vec<Order>, PersistError> {
            Err(PersistError::Database(DbErr::Custom("down".to_string())))
        }
    }

    struct EmptyStore;

    #[async_trait]
    impl SystemOfRecord for EmptyStore {
        async fn insert_order(&self, _order: &Order) -> Result<(), PersistError> {
            Ok(())
        }
        async fn get_all_orders(&self) -> Result<Vec<Order>, PersistError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_unreadable_store_is_fatal() {
        let cache = OrderCache::in_memory();
        let result = run_cache_bootstrap(&BrokenStore, &cache).await;
        assert!(matches!(result, Err(StartupError::Bootstrap(_))));
    }

    #[tokio::test]
    async fn test_empty_store_restores_nothing() {
        let cache = OrderCache::in_memory();
        let report = run_cache_bootstrap(&EmptyStore, &cache).await.unwrap();
        assert_eq!(report, RestoreReport::default());
    }
}
