use crate::startup::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe. Answers without touching any model.
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Server is live!" }))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "sentence-service",
        "version": env!("CARGO_PKG_VERSION"),
        "models": state.selector.model_ids().count()
    }))
}
