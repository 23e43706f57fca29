use axum::{Json, extract::State, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub database: String,
    pub uptime_seconds: i64,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = if state.store.connection().ping().await.is_ok() {
        "connected"
    } else {
        "disconnected"
    };

    let now = Utc::now();
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        timestamp: now,
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status.to_string(),
        uptime_seconds: (now - state.started_at).num_seconds(),
    })
}
