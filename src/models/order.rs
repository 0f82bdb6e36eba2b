//! Order aggregate
//!
//! Wire representation of an order as it arrives from the feed and as the
//! Read API returns it. Field names follow the inbound JSON one to one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    #[serde(default)]
    pub internal_signature: Option<String>,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: i32,
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub transaction: String,
    #[serde(default)]
    pub request_id: Option<String>,
    pub currency: String,
    pub provider: String,
    /// Smallest currency unit
    pub amount: i64,
    /// Unix seconds
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    /// Discount percent, 0-100
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

impl Order {
    /// Decode and validate a raw feed payload.
    ///
    /// Everything that reaches the pipeline has passed through here; a
    /// payload that fails is dropped by the caller.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(DecodeError::Empty);
        }

        let order: Order = serde_json::from_slice(payload)?;
        order.validate()?;
        Ok(order)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if self.order_uid.trim().is_empty() {
            return Err(DecodeError::Invalid("order_uid is empty".to_string()));
        }
        if self.payment.transaction.trim().is_empty() {
            return Err(DecodeError::Invalid(format!(
                "order {}: payment transaction is empty",
                self.order_uid
            )));
        }
        if let Some(item) = self.items.iter().find(|i| !(0..=100).contains(&i.sale)) {
            return Err(DecodeError::Invalid(format!(
                "order {}: item {} has sale {} outside 0-100",
                self.order_uid, item.chrt_id, item.sale
            )));
        }
        Ok(())
    }
}
