//! Prediction request/response models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hazard_core::{Assessment, BatchOutcome, HazardType, Location, PredictionResult, RawFeatures, RiskLevel, WeatherSnapshot};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

/// Largest number of locations accepted by one batch request
pub const MAX_BATCH_LOCATIONS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Hazard names; all hazards when absent
    pub disaster_types: Option<Vec<String>>,
    /// Caller-measured features. Built by the feature provider when absent.
    pub features: Option<RawFeatures>,
    pub weather: Option<WeatherSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub location: Location,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_conditions: Option<WeatherSnapshot>,
    pub predictions: BTreeMap<HazardType, PredictionResult>,
    /// Highest risk category across the requested hazards
    pub overall_risk: Option<RiskLevel>,
}

impl PredictResponse {
    pub fn new(location: Location, weather_conditions: Option<WeatherSnapshot>, assessment: Assessment) -> Self {
        Self {
            location,
            timestamp: assessment.assessed_at,
            weather_conditions,
            predictions: assessment.predictions,
            overall_risk: assessment.overall_risk,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub features: Option<RawFeatures>,
    pub weather: Option<WeatherSnapshot>,
}

#[derive(Debug, Deserialize)]
pub struct BatchPredictRequest {
    pub locations: Vec<BatchLocation>,
    pub disaster_types: Option<Vec<String>>,
}

/// One entry per requested location, either predictions or an error
#[derive(Debug, Serialize)]
pub struct BatchResult {
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictions: Option<BTreeMap<HazardType, PredictionResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_risk: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResult {
    pub fn failed(location: Location, error: String) -> Self {
        Self {
            location,
            predictions: None,
            overall_risk: None,
            error: Some(error),
        }
    }
}

impl From<BatchOutcome> for BatchResult {
    fn from(outcome: BatchOutcome) -> Self {
        match outcome.result {
            Ok(assessment) => Self {
                location: outcome.location,
                predictions: Some(assessment.predictions),
                overall_risk: assessment.overall_risk,
                error: None,
            },
            Err(e) => Self::failed(outcome.location, e.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchPredictResponse {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub failed: usize,
    pub results: Vec<BatchResult>,
}

/// Resolve requested hazard names, defaulting to every hazard
pub fn resolve_hazards(names: Option<&[String]>) -> AppResult<Vec<HazardType>> {
    let Some(names) = names else {
        return Ok(HazardType::ALL.to_vec());
    };
    if names.is_empty() {
        return Err(AppError::ValidationError("disaster_types must not be empty".to_string()));
    }

    let mut hazards = Vec::with_capacity(names.len());
    for name in names {
        let hazard: HazardType = name.parse()?;
        if !hazards.contains(&hazard) {
            hazards.push(hazard);
        }
    }
    Ok(hazards)
}

/// Reject coordinates outside the WGS84 range
pub fn check_coordinates(latitude: f64, longitude: f64) -> AppResult<Location> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(AppError::ValidationError(format!("latitude {} is outside [-90, 90]", latitude)));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::ValidationError(format!("longitude {} is outside [-180, 180]", longitude)));
    }
    Ok(Location { latitude, longitude })
}
