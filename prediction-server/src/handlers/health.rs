//! Health check handler

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use hazard_core::{HazardState, HazardType};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    models_loaded: usize,
    hazards: BTreeMap<HazardType, HazardState>,
    retraining: Vec<HazardType>,
    layout_version: u8,
    layout_hash: u32,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.engine.status();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        models_loaded: status.models_loaded,
        hazards: status.hazards,
        retraining: status.busy,
        layout_version: status.layout.version,
        layout_hash: status.layout.hash,
    })
}
