//! Read API request/response models

use serde::{Deserialize, Serialize};

use crate::services::ingestion::StatsSnapshot;

/// Query parameters for the form lookup endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct OrderLookupQuery {
    #[serde(default)]
    pub order_uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerOrdersResponse {
    pub customer_id: String,
    pub order_uids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub ingestion: StatsSnapshot,
    pub cache_entries: u64,
}

/// Generic error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: Some(code.to_string()),
        }
    }
}
