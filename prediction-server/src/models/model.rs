//! Model management models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hazard_core::{EngineResult, HazardAccuracy, HazardType};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct AccuracyResponse {
    pub accuracies: BTreeMap<HazardType, HazardAccuracy>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrainRequest {
    /// One hazard; every hazard when absent
    pub disaster_type: Option<String>,
}

impl RetrainRequest {
    /// An empty body retrains everything; a body that does not parse is rejected
    pub fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::ValidationError(format!("invalid retrain request: {}", e)))
    }
}

#[derive(Debug, Serialize)]
pub struct RetrainOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<EngineResult<f64>> for RetrainOutcome {
    fn from(result: EngineResult<f64>) -> Self {
        match result {
            Ok(accuracy) => Self { accuracy: Some(accuracy), error: None },
            Err(e) => Self { accuracy: None, error: Some(e.to_string()) },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RetrainResponse {
    pub message: String,
    pub results: BTreeMap<HazardType, RetrainOutcome>,
    pub timestamp: DateTime<Utc>,
}
