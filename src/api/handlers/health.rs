use crate::AppState;
use crate::config::StorageBackend;
use crate::models::SystemStatus;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub version: String,
    pub system: SystemStatus,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Liveness and store counters", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage = match state.portal.config().storage_backend {
        StorageBackend::Disk => "disk",
        StorageBackend::Memory => "memory",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        storage: storage.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        system: state.portal.status(),
    })
}
