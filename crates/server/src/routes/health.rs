use axum::{Json, extract::State};

use chatfront_api::HealthResponse;

use crate::AppState;

/// GET /api/health — liveness check, reporting which chat backend this
/// deployment is fronting.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.backend.base_url().to_string(),
    })
}
