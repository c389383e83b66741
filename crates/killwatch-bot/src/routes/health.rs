//! Liveness endpoint for the process supervisor.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use killwatch_core::{HealthMonitor, HealthReport};
use std::sync::Arc;

/// Per-stage liveness report.
pub async fn health_check(
    State(health): State<Arc<HealthMonitor>>,
) -> (StatusCode, Json<HealthReport>) {
    respond(health.snapshot())
}

/// 200 while every stage is fresh and 503 as soon as one is stale, with the
/// same JSON body either way.
pub(super) fn respond(report: HealthReport) -> (StatusCode, Json<HealthReport>) {
    let status = if report.status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
