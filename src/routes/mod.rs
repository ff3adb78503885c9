//! API Routes
//!
//! - `/api/health` - Health checks
//! - `/api/datasets` - Upload, re-ingest, inspect and delete datasets
//! - `/api/equipment`, `/api/summary` - Views across all of a user's datasets
//!
//! Everything except health identifies the caller via the `x-user-id` header.

pub mod datasets;
pub mod equipment;
pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(health::router())
        .merge(datasets::router())
        .merge(equipment::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
