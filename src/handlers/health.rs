use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let backends: Vec<_> = state
        .load_balancer
        .all_backends()
        .iter()
        .map(|b| serde_json::json!({ "url": b.url, "healthy": b.is_healthy() }))
        .collect();
    let config = state.coordinator.config();

    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "batch_processor": if state.coordinator.is_running() { "running" } else { "not_running" },
        "batching": {
            "max_batch_size": config.max_batch_size,
            "batch_timeout_ms": config.batch_timeout.as_millis() as u64,
        },
        "backends": backends,
    }))
}
