use chrono::{TimeZone, Utc};
use order_service::models::order::{Delivery, Item, Order, Payment};
use order_service::services::order_store::OrderStore;
use sea_orm::{ConnectOptions, Database, DbErr};

/// Set up an order store on a fresh in-memory SQLite database with the
/// order schema applied.
/// A single pooled connection keeps the in-memory database alive for the
/// whole test.
pub async fn setup_test_store() -> Result<OrderStore, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    let store = OrderStore::new(db);
    store.migrate().await?;
    Ok(store)
}

/// Order fixture with one item per `chrt_ids` entry, in the given order.
#[allow(dead_code)]
pub fn sample_order(order_uid: &str, customer_id: &str, chrt_ids: &[i64]) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: format!("tx-{}", order_uid),
            request_id: None,
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1637907727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: chrt_ids
            .iter()
            .map(|&chrt_id| Item {
                chrt_id,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: format!("rid-{}", chrt_id),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2389212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            })
            .collect(),
        locale: "en".to_string(),
        internal_signature: None,
        customer_id: customer_id.to_string(),
        delivery_service: "meest".to_string(),
        shardkey: 9,
        sm_id: 99,
        date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
        oof_shard: "1".to_string(),
    }
}

/// JSON payload for `order` as the feed would deliver it.
#[allow(dead_code)]
pub fn payload(order: &Order) -> Vec<u8> {
    serde_json::to_vec(order).unwrap()
}
