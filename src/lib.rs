// src/lib.rs

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use services::{ingestion::PipelineStats, order_cache::OrderCache};

#[derive(Clone)]
pub struct AppState {
    pub cache: OrderCache,
    pub stats: Arc<PipelineStats>,
}

pub mod config;
pub mod error;

pub mod entities {
    pub mod prelude;
    pub mod delivery;
    pub mod items;
    pub mod orders;
    pub mod payment;
}

pub mod services {
    pub mod cache_backend;
    pub mod cache_records;
    pub mod order_cache;
    pub mod order_store;
    pub mod ingestion;
    pub mod order_feed;
}

pub mod jobs {
    pub mod cache_bootstrap;
    pub mod ingestion_worker;
}

pub mod handlers {
    pub mod customer;
    pub mod health;
    pub mod order;
}

pub mod models;

/// Read API routes. Every handler reads from the cache only.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::order::index))
        .route("/order", get(handlers::order::lookup_order))
        .route("/api/orders/{order_uid}", get(handlers::order::get_order))
        .route(
            "/api/customers/{customer_id}/orders",
            get(handlers::customer::get_customer_orders),
        )
        .route("/health", get(handlers::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
