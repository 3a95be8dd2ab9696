//! API route definitions

use super::{handlers::*, ApiState};
use axum::{routing::get, Router};

/// Ledger read routes
pub fn create_metrics_routes() -> Router<ApiState> {
    Router::new().route("/metrics/transactions", get(list_transactions))
}

/// Operational routes
pub fn create_health_routes() -> Router<ApiState> {
    Router::new().route("/health", get(health))
}
