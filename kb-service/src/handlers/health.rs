use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::metrics::get_metrics;
use crate::startup::AppState;

/// Liveness: the session store must answer.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.chat.store().health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "kb-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "kb-service",
                "error": e.to_string()
            })),
        ),
    }
}

/// Readiness: the session store and the LLM provider must both be usable.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.chat.store().health_check().await {
        tracing::warn!(error = %e, "Not ready: session store");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    if let Err(e) = state.text_provider.health_check().await {
        tracing::warn!(error = %e, "Not ready: LLM provider");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
