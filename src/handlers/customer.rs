use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::models::api::{CustomerOrdersResponse, ErrorResponse};
use crate::AppState;

/// Handler for GET /api/customers/{customer_id}/orders
/// Ids of every cached order placed by the customer, ascending
pub async fn get_customer_orders(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<CustomerOrdersResponse>, (StatusCode, Json<ErrorResponse>)> {
    let order_uids = state
        .cache
        .customer_order_ids(&customer_id)
        .await
        .map_err(|e| {
            tracing::error!(customer_id = %customer_id, error = %e, "Failed to read customer orders");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    format!("Failed to read customer orders: {}", e),
                    "CACHE_ERROR",
                )),
            )
        })?;

    Ok(Json(CustomerOrdersResponse {
        customer_id,
        order_uids,
    }))
}
