use axum::{extract::State, routing::get, Json, Router};
use tracing::warn;

use crate::models::{AppState, HealthResponse};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!(error = %e, "Store health check failed");
            "degraded"
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        store: state.store.backend().to_string(),
    })
}
