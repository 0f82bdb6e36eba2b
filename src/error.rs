//! Error taxonomy for the ingestion and read paths.
//!
//! Each stage of the pipeline owns one error type. Only [`StartupError`] is
//! fatal to the process.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Inbound event could not be turned into an `Order`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("malformed order payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid order: {0}")]
    Invalid(String),
}

/// System of Record write or read failed.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("order {order_uid} already exists")]
    Duplicate { order_uid: String },
    #[error("payment transaction {transaction} of order {order_uid} is already recorded")]
    DuplicateTransaction {
        order_uid: String,
        transaction: String,
    },
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl PersistError {
    /// Classify a failed `orders` insert; a key clash means the order exists.
    pub fn from_order_insert(order_uid: &str, err: DbErr) -> Self {
        if is_unique_violation(&err) {
            PersistError::Duplicate {
                order_uid: order_uid.to_string(),
            }
        } else {
            PersistError::Database(err)
        }
    }

    /// Classify a failed `payment` insert; a key clash means another order
    /// already carries this transaction.
    pub fn from_payment_insert(order_uid: &str, transaction: &str, err: DbErr) -> Self {
        if is_unique_violation(&err) {
            PersistError::DuplicateTransaction {
                order_uid: order_uid.to_string(),
                transaction: transaction.to_string(),
            }
        } else {
            PersistError::Database(err)
        }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Read Cache backend failure.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("key {key} holds a {found} value, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("failed to encode cache value: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Order lookup through the Read Cache failed.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("order {0} not found")]
    NotFound(String),
    #[error("order {order_uid} has a malformed item at position {position}: {source}")]
    CorruptItem {
        order_uid: String,
        position: usize,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Conditions that prevent the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("schema setup failed: {0}")]
    Schema(#[from] DbErr),
    #[error("cache bootstrap failed: {0}")]
    Bootstrap(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
