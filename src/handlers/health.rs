use axum::{extract::State, Json};

use crate::models::api::HealthResponse;
use crate::AppState;

/// Handler for GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        ingestion: state.stats.snapshot(),
        cache_entries: state.cache.entry_count(),
    })
}
