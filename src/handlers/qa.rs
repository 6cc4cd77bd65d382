use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::BatchError;
use crate::models::{AskRequest, AskResponse};
use crate::state::AppState;

// Error body returned by the gateway
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl From<BatchError> for ApiError {
    fn from(e: BatchError) -> Self {
        let status = match e {
            BatchError::EmptyQuestion => StatusCode::BAD_REQUEST,
            BatchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            BatchError::Upstream(_) => StatusCode::BAD_GATEWAY,
            BatchError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

// Malformed or mistyped bodies keep axum's status but get the JSON error body
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

pub async fn qa_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    if !state.rate_limiter.check("global") {
        return Err(ApiError {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "Rate limit exceeded. Try again later.".to_string(),
        });
    }

    let Json(payload) = payload?;
    let answer = state
        .coordinator
        .submit(&payload.question, state.request_timeout)
        .await?;

    Ok(Json(AskResponse { answer }))
}
