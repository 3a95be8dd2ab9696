//! REST API over the indexed payment ledger

mod handlers;
mod responses;
mod routes;

pub use handlers::{ApiError, TransactionsQuery};
pub use responses::{ErrorResponse, HealthResponse, TransactionView, TransactionsResponse};
pub use routes::*;

use crate::config::ApiConfig;
use crate::core::LedgerStore;
use crate::pagination::PaginationEngine;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub ledger: Arc<dyn LedgerStore>,
    pub engine: PaginationEngine,
    pub default_page_size: u32,
}

impl ApiState {
    pub fn new(ledger: Arc<dyn LedgerStore>, config: &ApiConfig) -> Self {
        Self {
            ledger,
            engine: PaginationEngine::new(config.max_page_size),
            default_page_size: config.default_page_size,
        }
    }
}

/// Build the application router
pub fn create_router(state: ApiState, enable_cors: bool) -> Router {
    let app = Router::new()
        .merge(create_metrics_routes())
        .merge(create_health_routes())
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    if enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Start the API server
pub async fn start_server(
    ledger: Arc<dyn LedgerStore>,
    config: &ApiConfig,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = create_router(ApiState::new(ledger, config), config.enable_cors);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("API server listening on {}", config.bind_address);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(handle)
}
