//! Service-level endpoints.
//!
//! - GET /                      - Service info (plain JSON)
//! - GET /health                - Health report, 200 healthy / 503 degraded
//! - GET /api/v1/system/status  - Health plus counters and storage totals

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use persona_types::status::{HealthReport, HealthStatus, SystemStatus};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestMeta};
use crate::state::AppState;

/// GET / - Service info.
pub async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "persona-chat",
        "version": env!("CARGO_PKG_VERSION"),
        "engine_available": state.engine.is_some(),
        "endpoints": {
            "health": "/health",
            "status": "/api/v1/system/status",
            "chat": "/api/v1/chat",
            "chat_stream": "/api/v1/chat/stream",
            "conversations": "/api/v1/conversations",
            "persona": "/api/v1/persona",
        },
    }))
}

/// GET /health - Component health, outside the envelope.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.check().await;
    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}

/// GET /api/v1/system/status
pub async fn system_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SystemStatus>>, AppError> {
    let meta = RequestMeta::start();
    let status = state.health.system_status().await;
    Ok(Json(
        meta.respond(status)
            .with_link("self", "/api/v1/system/status")
            .with_link("health", "/health"),
    ))
}
