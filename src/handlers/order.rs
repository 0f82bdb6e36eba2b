use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};

use crate::error::LookupError;
use crate::models::api::{ErrorResponse, OrderLookupQuery};
use crate::models::order::Order;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Order lookup</title>
</head>
<body>
  <h1>Order lookup</h1>
  <form action="/order" method="get">
    <label for="order_uid">Order UID</label>
    <input id="order_uid" name="order_uid" type="text" required>
    <button type="submit">Find</button>
  </form>
</body>
</html>
"#;

/// Handler for GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// Handler for GET /order?order_uid=...
/// Target of the lookup form
pub async fn lookup_order(
    State(state): State<AppState>,
    Query(query): Query<OrderLookupQuery>,
) -> Result<Json<Order>, ApiError> {
    find_order(&state, query.order_uid.trim()).await
}

/// Handler for GET /api/orders/{order_uid}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>, ApiError> {
    find_order(&state, order_uid.trim()).await
}

async fn find_order(state: &AppState, order_uid: &str) -> Result<Json<Order>, ApiError> {
    if order_uid.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("order_uid is required", "MISSING_ORDER_UID")),
        ));
    }

    match state.cache.get_order(order_uid).await {
        Ok(order) => Ok(Json(order)),
        Err(LookupError::NotFound(uid)) => {
            tracing::debug!(order_uid = %uid, "Order not in cache");
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(
                    format!("Order {} not found", uid),
                    "ORDER_NOT_FOUND",
                )),
            ))
        }
        Err(e) => {
            tracing::error!(order_uid = %order_uid, error = %e, "Failed to read order from cache");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    format!("Failed to read order: {}", e),
                    "CACHE_ERROR",
                )),
            ))
        }
    }
}
