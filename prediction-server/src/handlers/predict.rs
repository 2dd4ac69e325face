//! Prediction handlers

use axum::{extract::State, Json};
use hazard_core::{BatchItem, FeatureProvider, Location, RawFeatures, WeatherSnapshot};

use crate::models::{
    check_coordinates, resolve_hazards, BatchPredictRequest, BatchPredictResponse, BatchResult, PredictRequest,
    PredictResponse, MAX_BATCH_LOCATIONS,
};
use crate::{AppError, AppResult, AppState};

/// Caller features win; otherwise the provider builds them from the location
/// and the weather it was given (or a mock snapshot).
fn features_for(
    state: &AppState,
    location: &Location,
    features: Option<RawFeatures>,
    weather: Option<WeatherSnapshot>,
) -> (RawFeatures, Option<WeatherSnapshot>) {
    match features {
        Some(features) => (features, weather),
        None => {
            let weather = weather.unwrap_or_else(|| state.features.mock_weather());
            let features = state.features.features(location, Some(&weather));
            (features, Some(weather))
        }
    }
}

/// Score one location against the requested hazards
pub async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> AppResult<Json<PredictResponse>> {
    let location = check_coordinates(req.latitude, req.longitude)?;
    let hazards = resolve_hazards(req.disaster_types.as_deref())?;
    let (features, weather) = features_for(&state, &location, req.features, req.weather);

    let assessment = state.engine.assess(&features, &hazards)?;
    tracing::debug!(
        "Predicted {} hazard(s) at ({}, {}): overall {:?}",
        hazards.len(),
        location.latitude,
        location.longitude,
        assessment.overall_risk
    );

    Ok(Json(PredictResponse::new(location, weather, assessment)))
}

/// Score several locations; a failing location never fails the request
pub async fn predict_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchPredictRequest>,
) -> AppResult<Json<BatchPredictResponse>> {
    if req.locations.len() > MAX_BATCH_LOCATIONS {
        return Err(AppError::ValidationError(format!(
            "at most {} locations per batch, got {}",
            MAX_BATCH_LOCATIONS,
            req.locations.len()
        )));
    }
    let hazards = resolve_hazards(req.disaster_types.as_deref())?;

    // `true` marks a location handed to the engine, in request order
    let mut scored_slots = Vec::with_capacity(req.locations.len());
    let mut items = Vec::with_capacity(req.locations.len());
    let mut rejected = Vec::new();

    for entry in req.locations {
        let location = Location { latitude: entry.latitude, longitude: entry.longitude };
        match check_coordinates(entry.latitude, entry.longitude) {
            Ok(_) => {
                let (features, _) = features_for(&state, &location, entry.features, entry.weather);
                items.push(BatchItem { location, features });
                scored_slots.push(true);
            }
            Err(e) => {
                rejected.push(BatchResult::failed(location, e.to_string()));
                scored_slots.push(false);
            }
        }
    }

    let mut scored = state.engine.predict_batch(&items, &hazards).into_iter().map(BatchResult::from);
    let mut rejected = rejected.into_iter();
    let results: Vec<BatchResult> = scored_slots
        .into_iter()
        .filter_map(|was_scored| if was_scored { scored.next() } else { rejected.next() })
        .collect();

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    Ok(Json(BatchPredictResponse {
        timestamp: chrono::Utc::now(),
        count: results.len(),
        failed,
        results,
    }))
}
