//! Cache encoding of an order
//!
//! Typed records for the three field hashes of a cached order plus the key
//! layout. Numbers and timestamps are stored as text; a field that fails to
//! parse on the way back reads as the zero value instead of failing the lookup.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::models::order::{Delivery, Order, Payment};

pub fn order_key(order_uid: &str) -> String {
    format!("order:{}", order_uid)
}

pub fn delivery_key(order_uid: &str) -> String {
    format!("order:{}:delivery", order_uid)
}

pub fn payment_key(order_uid: &str) -> String {
    format!("order:{}:payment", order_uid)
}

pub fn items_key(order_uid: &str) -> String {
    format!("order:{}:items", order_uid)
}

pub fn customer_orders_key(customer_id: &str) -> String {
    format!("customer:{}:orders", customer_id)
}

/// Order-level scalars (everything except delivery, payment and items)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub locale: String,
    pub internal_signature: Option<String>,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: i32,
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

impl OrderRecord {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_uid: order.order_uid.clone(),
            track_number: order.track_number.clone(),
            entry: order.entry.clone(),
            locale: order.locale.clone(),
            internal_signature: order.internal_signature.clone(),
            customer_id: order.customer_id.clone(),
            delivery_service: order.delivery_service.clone(),
            shardkey: order.shardkey,
            sm_id: order.sm_id,
            date_created: order.date_created,
            oof_shard: order.oof_shard.clone(),
        }
    }

    pub fn into_fields(self) -> HashMap<String, String> {
        let mut fields = FieldWriter::default();
        fields.put("order_uid", self.order_uid);
        fields.put("track_number", self.track_number);
        fields.put("entry", self.entry);
        fields.put("locale", self.locale);
        fields.put_opt("internal_signature", self.internal_signature);
        fields.put("customer_id", self.customer_id);
        fields.put("delivery_service", self.delivery_service);
        fields.put("shardkey", self.shardkey);
        fields.put("sm_id", self.sm_id);
        fields.put(
            "date_created",
            self.date_created.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        );
        fields.put("oof_shard", self.oof_shard);
        fields.0
    }

    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let r = FieldReader(fields);
        Self {
            order_uid: r.text("order_uid"),
            track_number: r.text("track_number"),
            entry: r.text("entry"),
            locale: r.text("locale"),
            internal_signature: r.opt_text("internal_signature"),
            customer_id: r.text("customer_id"),
            delivery_service: r.text("delivery_service"),
            shardkey: r.number("shardkey"),
            sm_id: r.number("sm_id"),
            date_created: r.timestamp("date_created"),
            oof_shard: r.text("oof_shard"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord(pub Delivery);

impl DeliveryRecord {
    pub fn into_fields(self) -> HashMap<String, String> {
        let d = self.0;
        let mut fields = FieldWriter::default();
        fields.put("name", d.name);
        fields.put("phone", d.phone);
        fields.put("zip", d.zip);
        fields.put("city", d.city);
        fields.put("address", d.address);
        fields.put("region", d.region);
        fields.put("email", d.email);
        fields.0
    }

    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let r = FieldReader(fields);
        Self(Delivery {
            name: r.text("name"),
            phone: r.text("phone"),
            zip: r.text("zip"),
            city: r.text("city"),
            address: r.text("address"),
            region: r.text("region"),
            email: r.text("email"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord(pub Payment);

impl PaymentRecord {
    pub fn into_fields(self) -> HashMap<String, String> {
        let p = self.0;
        let mut fields = FieldWriter::default();
        fields.put("transaction", p.transaction);
        fields.put_opt("request_id", p.request_id);
        fields.put("currency", p.currency);
        fields.put("provider", p.provider);
        fields.put("amount", p.amount);
        fields.put("payment_dt", p.payment_dt);
        fields.put("bank", p.bank);
        fields.put("delivery_cost", p.delivery_cost);
        fields.put("goods_total", p.goods_total);
        fields.put("custom_fee", p.custom_fee);
        fields.0
    }

    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let r = FieldReader(fields);
        Self(Payment {
            transaction: r.text("transaction"),
            request_id: r.opt_text("request_id"),
            currency: r.text("currency"),
            provider: r.text("provider"),
            amount: r.number("amount"),
            payment_dt: r.number("payment_dt"),
            bank: r.text("bank"),
            delivery_cost: r.number("delivery_cost"),
            goods_total: r.number("goods_total"),
            custom_fee: r.number("custom_fee"),
        })
    }
}

#[derive(Default)]
struct FieldWriter(HashMap<String, String>);

impl FieldWriter {
    fn put(&mut self, name: &str, value: impl ToString) {
        self.0.insert(name.to_string(), value.to_string());
    }

    /// Absent values are not stored, so `None` and `Some("")` stay distinct.
    fn put_opt(&mut self, name: &str, value: Option<String>) {
        if let Some(value) = value {
            self.0.insert(name.to_string(), value);
        }
    }
}

struct FieldReader<'a>(&'a HashMap<String, String>);

impl FieldReader<'_> {
    fn text(&self, name: &str) -> String {
        self.0.get(name).cloned().unwrap_or_default()
    }

    fn opt_text(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }

    fn number<T: FromStr + Default>(&self, name: &str) -> T {
        match self.0.get(name) {
            None => T::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(field = name, value = %raw, "Unparseable cached number, using zero");
                T::default()
            }),
        }
    }

    fn timestamp(&self, name: &str) -> DateTime<Utc> {
        match self.0.get(name) {
            None => DateTime::<Utc>::default(),
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|ts| ts.with_timezone(&Utc))
                .unwrap_or_else(|_| {
                    warn!(field = name, value = %raw, "Unparseable cached timestamp, using epoch");
                    DateTime::<Utc>::default()
                }),
        }
    }
}
