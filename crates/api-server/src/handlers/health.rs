use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::ApiState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /health` (none) — §6.
pub async fn health_check(State(_state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}
