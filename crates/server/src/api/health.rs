//! Liveness and scheduler statistics.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use abacus_compute::SchedulerSnapshot;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub scheduler: SchedulerSnapshot,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        scheduler: state.scheduler.snapshot().await,
    })
}
