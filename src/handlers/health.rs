// handlers/health.rs - GET /health and GET /v1/health

use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::ApiResponse;

/// Liveness only; upstream directories are not probed
pub async fn health_get(State(state): State<AppState>) -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": format!("{:?}", state.config.environment).to_lowercase(),
        "timestamp": chrono::Utc::now(),
    }))
}
