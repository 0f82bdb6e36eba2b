//! System of Record
//!
//! Normalized, transactional storage of orders across the `orders`,
//! `delivery`, `payment` and `items` tables. This is the point of truth;
//! the Read Cache is rebuilt from it on startup.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sea_orm::{
    ActiveValue::NotSet, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, FromQueryResult, RuntimeErr, Set,
    SqlxPostgresConnector, Statement, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info, warn};

use crate::config::PostgresConfig;
use crate::entities::{delivery, items, orders, payment};
use crate::error::PersistError;
use crate::models::order::{Delivery, Item, Order, Payment};

/// Write/read contract the ingestion pipeline and cache bootstrap depend on.
#[async_trait]
pub trait SystemOfRecord: Send + Sync {
    /// Persist one order atomically across all four tables.
    async fn insert_order(&self, order: &Order) -> Result<(), PersistError>;

    /// Every stored order with its delivery, payment and all items.
    async fn get_all_orders(&self) -> Result<Vec<Order>, PersistError>;
}

#[derive(Clone)]
pub struct OrderStore {
    db: DatabaseConnection,
}

impl OrderStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create the database if absent, connect, and bring the schema up to date.
    ///
    /// Safe to call on every startup.
    pub async fn ensure_schema(config: &PostgresConfig) -> Result<Self, DbErr> {
        ensure_database(config).await?;

        info!(database = %config.name, host = %config.host, "Connecting to order database");
        let db = connect(config.connect_options()).await?;

        let store = Self::new(db);
        store.migrate().await?;
        Ok(store)
    }

    /// Apply pending migrations (creates the four order tables if missing).
    pub async fn migrate(&self) -> Result<(), DbErr> {
        info!("Running migrations...");
        migration::Migrator::up(&self.db, None).await
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn close(self) -> Result<(), DbErr> {
        self.db.close().await
    }
}

#[async_trait]
impl SystemOfRecord for OrderStore {
    async fn insert_order(&self, order: &Order) -> Result<(), PersistError> {
        let txn = self.db.begin().await?;

        if let Err(err) = insert_rows(&txn, order).await {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(
                    order_uid = %order.order_uid,
                    error = %rollback_err,
                    "Rollback after failed insert did not complete"
                );
            }
            return Err(err);
        }

        txn.commit().await?;
        debug!(order_uid = %order.order_uid, items = order.items.len(), "Order committed");
        Ok(())
    }

    async fn get_all_orders(&self) -> Result<Vec<Order>, PersistError> {
        let backend = self.db.get_database_backend();
        let rows = OrderRow::find_by_statement(Statement::from_string(backend, SELECT_ALL_ORDERS))
            .all(&self.db)
            .await?;

        let row_count = rows.len();
        let mut assembler = OrderAssembler::default();
        for row in rows {
            assembler.push_row(row);
        }
        let orders = assembler.finish();

        debug!(rows = row_count, orders = orders.len(), "Loaded all orders");
        Ok(orders)
    }
}

async fn insert_rows(txn: &DatabaseTransaction, order: &Order) -> Result<(), PersistError> {
    orders::Entity::insert(orders::ActiveModel {
        order_uid: Set(order.order_uid.clone()),
        track_number: Set(order.track_number.clone()),
        entry: Set(order.entry.clone()),
        locale: Set(order.locale.clone()),
        internal_signature: Set(order.internal_signature.clone()),
        customer_id: Set(order.customer_id.clone()),
        delivery_service: Set(order.delivery_service.clone()),
        shardkey: Set(order.shardkey),
        sm_id: Set(order.sm_id),
        date_created: Set(order.date_created),
        oof_shard: Set(order.oof_shard.clone()),
    })
    .exec_without_returning(txn)
    .await
    .map_err(|err| PersistError::from_order_insert(&order.order_uid, err))?;

    let d = &order.delivery;
    delivery::Entity::insert(delivery::ActiveModel {
        order_uid: Set(order.order_uid.clone()),
        name: Set(d.name.clone()),
        phone: Set(d.phone.clone()),
        zip: Set(d.zip.clone()),
        city: Set(d.city.clone()),
        address: Set(d.address.clone()),
        region: Set(d.region.clone()),
        email: Set(d.email.clone()),
    })
    .exec_without_returning(txn)
    .await?;

    let p = &order.payment;
    payment::Entity::insert(payment::ActiveModel {
        transaction: Set(p.transaction.clone()),
        order_uid: Set(order.order_uid.clone()),
        request_id: Set(p.request_id.clone()),
        currency: Set(p.currency.clone()),
        provider: Set(p.provider.clone()),
        amount: Set(p.amount),
        payment_dt: Set(p.payment_dt),
        bank: Set(p.bank.clone()),
        delivery_cost: Set(p.delivery_cost),
        goods_total: Set(p.goods_total),
        custom_fee: Set(p.custom_fee),
    })
    .exec_without_returning(txn)
    .await
    .map_err(|err| PersistError::from_payment_insert(&order.order_uid, &p.transaction, err))?;

    // One statement per item so serial ids follow item order
    for item in &order.items {
        items::Entity::insert(items::ActiveModel {
            id: NotSet,
            order_uid: Set(order.order_uid.clone()),
            chrt_id: Set(item.chrt_id),
            track_number: Set(item.track_number.clone()),
            price: Set(item.price),
            rid: Set(item.rid.clone()),
            name: Set(item.name.clone()),
            sale: Set(item.sale),
            size: Set(item.size.clone()),
            total_price: Set(item.total_price),
            nm_id: Set(item.nm_id),
            brand: Set(item.brand.clone()),
            status: Set(item.status),
        })
        .exec_without_returning(txn)
        .await?;
    }

    Ok(())
}

async fn connect(options: PgConnectOptions) -> Result<DatabaseConnection, DbErr> {
    let pool = PgPoolOptions::new()
        .connect_with(options)
        .await
        .map_err(|e| DbErr::Conn(RuntimeErr::SqlxError(e)))?;
    Ok(SqlxPostgresConnector::from_sqlx_postgres_pool(pool))
}

/// Create the configured database through the maintenance database when it
/// does not exist yet.
async fn ensure_database(config: &PostgresConfig) -> Result<(), DbErr> {
    let admin = connect(config.maintenance_connect_options()).await?;

    let exists = admin
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "SELECT 1 FROM pg_database WHERE datname = $1",
            [config.name.clone().into()],
        ))
        .await?
        .is_some();

    if exists {
        debug!(database = %config.name, "Database already exists");
    } else {
        let ident = config.name.replace('"', "\"\"");
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("CREATE DATABASE \"{}\"", ident),
            ))
            .await?;
        info!(database = %config.name, "Created database");
    }

    admin.close().await
}

/// One joined row: order scalars, delivery, payment and at most one item.
const SELECT_ALL_ORDERS: &str = r#"
    SELECT
        o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
        o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created, o.oof_shard,
        d.name AS delivery_name, d.phone AS delivery_phone, d.zip AS delivery_zip,
        d.city AS delivery_city, d.address AS delivery_address, d.region AS delivery_region,
        d.email AS delivery_email,
        p."transaction" AS payment_transaction, p.request_id AS payment_request_id,
        p.currency AS payment_currency, p.provider AS payment_provider,
        p.amount AS payment_amount, p.payment_dt AS payment_dt, p.bank AS payment_bank,
        p.delivery_cost AS payment_delivery_cost, p.goods_total AS payment_goods_total,
        p.custom_fee AS payment_custom_fee,
        i.chrt_id AS item_chrt_id, i.track_number AS item_track_number, i.price AS item_price,
        i.rid AS item_rid, i.name AS item_name, i.sale AS item_sale, i.size AS item_size,
        i.total_price AS item_total_price, i.nm_id AS item_nm_id, i.brand AS item_brand,
        i.status AS item_status
    FROM orders o
    JOIN delivery d ON d.order_uid = o.order_uid
    JOIN payment p ON p.order_uid = o.order_uid
    LEFT JOIN items i ON i.order_uid = o.order_uid
    ORDER BY o.order_uid, i.id
"#;

#[derive(Debug, Clone, FromQueryResult)]
struct OrderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: Option<String>,
    customer_id: String,
    delivery_service: String,
    shardkey: i32,
    sm_id: i32,
    date_created: DateTime<Utc>,
    oof_shard: String,
    delivery_name: String,
    delivery_phone: String,
    delivery_zip: String,
    delivery_city: String,
    delivery_address: String,
    delivery_region: String,
    delivery_email: String,
    payment_transaction: String,
    payment_request_id: Option<String>,
    payment_currency: String,
    payment_provider: String,
    payment_amount: i64,
    payment_dt: i64,
    payment_bank: String,
    payment_delivery_cost: i64,
    payment_goods_total: i64,
    payment_custom_fee: i64,
    // NULL on the single row of an order without items
    item_chrt_id: Option<i64>,
    item_track_number: Option<String>,
    item_price: Option<i64>,
    item_rid: Option<String>,
    item_name: Option<String>,
    item_sale: Option<i32>,
    item_size: Option<String>,
    item_total_price: Option<i64>,
    item_nm_id: Option<i64>,
    item_brand: Option<String>,
    item_status: Option<i32>,
}

impl OrderRow {
    fn item(&self) -> Option<Item> {
        Some(Item {
            chrt_id: self.item_chrt_id?,
            track_number: self.item_track_number.clone()?,
            price: self.item_price?,
            rid: self.item_rid.clone()?,
            name: self.item_name.clone()?,
            sale: self.item_sale?,
            size: self.item_size.clone()?,
            total_price: self.item_total_price?,
            nm_id: self.item_nm_id?,
            brand: self.item_brand.clone()?,
            status: self.item_status?,
        })
    }

    fn into_order(self) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery: Delivery {
                name: self.delivery_name,
                phone: self.delivery_phone,
                zip: self.delivery_zip,
                city: self.delivery_city,
                address: self.delivery_address,
                region: self.delivery_region,
                email: self.delivery_email,
            },
            payment: Payment {
                transaction: self.payment_transaction,
                request_id: self.payment_request_id,
                currency: self.payment_currency,
                provider: self.payment_provider,
                amount: self.payment_amount,
                payment_dt: self.payment_dt,
                bank: self.payment_bank,
                delivery_cost: self.payment_delivery_cost,
                goods_total: self.payment_goods_total,
                custom_fee: self.payment_custom_fee,
            },
            items: Vec::new(),
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

/// Folds joined rows into orders, accumulating every item row of an order
/// into that order's item list. Output keeps first-seen order.
#[derive(Default)]
struct OrderAssembler {
    orders: Vec<Order>,
    by_uid: HashMap<String, usize>,
}

impl OrderAssembler {
    fn push_row(&mut self, row: OrderRow) {
        let item = row.item();

        let position = match self.by_uid.get(&row.order_uid) {
            Some(&position) => position,
            None => {
                let position = self.orders.len();
                self.by_uid.insert(row.order_uid.clone(), position);
                self.orders.push(row.into_order());
                position
            }
        };

        if let Some(item) = item {
            self.orders[position].items.push(item);
        }
    }

    fn finish(self) -> Vec<Order> {
        self.orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(order_uid: &str, chrt_id: Option<i64>) -> OrderRow {
        OrderRow {
            order_uid: order_uid.to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            locale: "en".to_string(),
            internal_signature: None,
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: 9,
            sm_id: 99,
            date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
            oof_shard: "1".to_string(),
            delivery_name: "Test Testov".to_string(),
            delivery_phone: "+9720000000".to_string(),
            delivery_zip: "2639809".to_string(),
            delivery_city: "Kiryat Mozkin".to_string(),
            delivery_address: "Ploshad Mira 15".to_string(),
            delivery_region: "Kraiot".to_string(),
            delivery_email: "test@gmail.com".to_string(),
            payment_transaction: format!("tx-{}", order_uid),
            payment_request_id: None,
            payment_currency: "USD".to_string(),
            payment_provider: "wbpay".to_string(),
            payment_amount: 1817,
            payment_dt: 1637907727,
            payment_bank: "alpha".to_string(),
            payment_delivery_cost: 1500,
            payment_goods_total: 317,
            payment_custom_fee: 0,
            item_chrt_id: chrt_id,
            item_track_number: chrt_id.map(|_| "WBILMTESTTRACK".to_string()),
            item_price: chrt_id.map(|_| 453),
            item_rid: chrt_id.map(|id| format!("rid-{}", id)),
            item_name: chrt_id.map(|_| "Mascaras".to_string()),
            item_sale: chrt_id.map(|_| 30),
            item_size: chrt_id.map(|_| "0".to_string()),
            item_total_price: chrt_id.map(|_| 317),
            item_nm_id: chrt_id.map(|_| 2389212),
            item_brand: chrt_id.map(|_| "Vivienne Sabo".to_string()),
            item_status: chrt_id.map(|_| 202),
        }
    }

    #[test]
    fn test_assembler_groups_item_rows_by_order() {
        let mut assembler = OrderAssembler::default();
        assembler.push_row(row("a", Some(1)));
        assembler.push_row(row("a", Some(2)));
        assembler.push_row(row("a", Some(3)));
        assembler.push_row(row("b", Some(10)));

        let orders = assembler.finish();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_uid, "a");
        let chrt_ids: Vec<i64> = orders[0].items.iter().map(|i| i.chrt_id).collect();
        assert_eq!(chrt_ids, vec![1, 2, 3]);
        assert_eq!(orders[1].items.len(), 1);
        assert_eq!(orders[1].payment.transaction, "tx-b");
    }

    #[test]
    fn test_assembler_order_without_items() {
        let mut assembler = OrderAssembler::default();
        assembler.push_row(row("empty", None));

        let orders = assembler.finish();
        assert_eq!(orders.len(), 1);
        assert!(orders[0].items.is_empty());
        assert_eq!(orders[0].delivery.city, "Kiryat Mozkin");
    }

    #[test]
    fn test_assembler_partial_item_columns_are_skipped() {
        let mut partial = row("a", Some(1));
        partial.item_brand = None;

        let mut assembler = OrderAssembler::default();
        assembler.push_row(partial);
        assert!(assembler.finish()[0].items.is_empty());
    }
}
