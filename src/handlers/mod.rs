mod health;
mod metrics;
mod qa;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::state::AppState;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use qa::{ApiError, qa_handler};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/qa", post(qa_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
