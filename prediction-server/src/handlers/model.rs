//! Model management handlers

use std::collections::BTreeMap;

use axum::{body::Bytes, extract::State, Json};
use hazard_core::HazardType;

use crate::models::{AccuracyResponse, RetrainOutcome, RetrainRequest, RetrainResponse};
use crate::{AppResult, AppState};

/// Per-learner and ensemble accuracy of every trained hazard
pub async fn accuracy(State(state): State<AppState>) -> Json<AccuracyResponse> {
    Json(AccuracyResponse {
        accuracies: state.engine.get_accuracies(),
        timestamp: chrono::Utc::now(),
    })
}

/// Retrain one hazard, or all of them when no `disaster_type` is given
pub async fn retrain(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<RetrainResponse>> {
    let req = RetrainRequest::from_body(&body)?;
    let engine = state.engine.clone();

    let (message, results) = match req.disaster_type {
        Some(name) => {
            let hazard: HazardType = name.parse()?;
            tracing::info!("Retrain requested for {}", hazard);

            let accuracy = tokio::task::spawn_blocking(move || engine.retrain(hazard)).await??;

            let mut results = BTreeMap::new();
            results.insert(hazard, RetrainOutcome::from(Ok(accuracy)));
            (format!("Model for {} retrained successfully", hazard), results)
        }
        None => {
            tracing::info!("Retrain requested for all hazards");

            let outcomes = tokio::task::spawn_blocking(move || engine.retrain_all()).await?;
            let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();

            let results: BTreeMap<_, _> = outcomes
                .into_iter()
                .map(|(hazard, result)| (hazard, RetrainOutcome::from(result)))
                .collect();
            let message = if failed == 0 {
                "All models retrained successfully".to_string()
            } else {
                format!("{} of {} models failed to retrain", failed, results.len())
            };
            (message, results)
        }
    };

    Ok(Json(RetrainResponse {
        message,
        results,
        timestamp: chrono::Utc::now(),
    }))
}
