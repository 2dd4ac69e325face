//! Scoring - Result types and collaborator interfaces of the scoring façade
//!
//! `score` is the pure core of `predict`: validated vector + record →
//! PredictionResult. The façade itself (`HazardEngine`) only adds the
//! registry lookup.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::logic::features::{FeatureVector, RawFeatures};
use crate::logic::hazard::HazardType;
use crate::logic::model::{combine, LearnerKind, RiskLevel};
use crate::logic::registry::HazardModelRecord;

// ============================================================================
// COLLABORATOR INTERFACES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Current conditions at a location, as a weather source reports them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    #[serde(default)]
    pub wind_direction: f64,
    #[serde(default)]
    pub rainfall_1h: f64,
}

/// Produces raw features for a location. Any gap filling happens here.
pub trait FeatureProvider: Send + Sync {
    fn features(&self, location: &Location, weather: Option<&WeatherSnapshot>) -> RawFeatures;
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub hazard: HazardType,
    pub probability: f64,
    pub risk_level: RiskLevel,
    /// Held-out ensemble accuracy at last training
    pub confidence: f64,
    pub model_predictions: BTreeMap<LearnerKind, f64>,
}

/// Several hazards scored against one feature vector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub predictions: BTreeMap<HazardType, PredictionResult>,
    /// Highest categorical level across `predictions`; see `overall_risk`
    pub overall_risk: Option<RiskLevel>,
    pub assessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub location: Location,
    pub features: RawFeatures,
}

/// One entry per input item; a failed item never affects the others
#[derive(Debug)]
pub struct BatchOutcome {
    pub location: Location,
    pub result: EngineResult<Assessment>,
}

// ============================================================================
// SCORING
// ============================================================================

/// Combine, classify and package one prediction
pub fn score(vector: &FeatureVector, record: &HazardModelRecord) -> EngineResult<PredictionResult> {
    let combination = combine(vector, record)?;
    let risk_level = RiskLevel::classify(combination.probability)?;

    Ok(PredictionResult {
        hazard: record.hazard(),
        probability: combination.probability,
        risk_level,
        confidence: record.ensemble_accuracy(),
        model_predictions: LearnerKind::SLOTS
            .iter()
            .copied()
            .zip(combination.learner_probabilities)
            .collect(),
    })
}

/// Maximum categorical risk level across hazards, `None` when empty.
///
/// Two hazards both `critical` tie here regardless of their probabilities;
/// this ranks by category, not by probability.
pub fn overall_risk<'a>(predictions: impl IntoIterator<Item = &'a PredictionResult>) -> Option<RiskLevel> {
    predictions.into_iter().map(|p| p.risk_level).max()
}

impl Assessment {
    pub fn new(predictions: BTreeMap<HazardType, PredictionResult>) -> Self {
        let overall_risk = overall_risk(predictions.values());
        Self {
            predictions,
            overall_risk,
            assessed_at: Utc::now(),
        }
    }

    pub fn get(&self, hazard: HazardType) -> EngineResult<&PredictionResult> {
        self.predictions
            .get(&hazard)
            .ok_or(EngineError::ModelNotTrained(hazard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::{validate, FEATURE_COUNT};
    use crate::logic::test_support::{fixed_record, record_with};

    fn zeros() -> FeatureVector {
        validate(&RawFeatures::from_ordered(&[0.0; FEATURE_COUNT])).unwrap()
    }

    fn prediction(hazard: HazardType, p: f64) -> PredictionResult {
        score(&zeros(), &fixed_record(hazard, p)).unwrap()
    }

    #[test]
    fn test_flood_scenario() {
        let record = record_with(HazardType::Flood, [0.9, 0.8, 0.1, 0.2], [0.3, 0.3, 0.2, 0.2]);

        let result = score(&zeros(), &record).unwrap();

        assert!((result.probability - 0.59).abs() < 1e-12);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(result.model_predictions[&LearnerKind::RandomForest], 0.9);
        assert_eq!(result.model_predictions[&LearnerKind::NeuralNetwork], 0.2);
        assert_eq!(result.confidence, record.ensemble_accuracy());
    }

    #[test]
    fn test_single_learner_boundaries() {
        let medium = record_with(HazardType::Cyclone, [0.2, 0.9, 0.9, 0.9], [1.0, 0.0, 0.0, 0.0]);
        let critical = record_with(HazardType::Cyclone, [0.8, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]);

        assert_eq!(score(&zeros(), &medium).unwrap().risk_level, RiskLevel::Medium);
        assert_eq!(score(&zeros(), &critical).unwrap().risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_overall_risk_is_max_category() {
        let predictions = [
            prediction(HazardType::Flood, 0.1),
            prediction(HazardType::Wildfire, 0.55),
            prediction(HazardType::Earthquake, 0.3),
        ];
        assert_eq!(overall_risk(&predictions), Some(RiskLevel::High));
        assert_eq!(overall_risk(&[]), None);
    }

    #[test]
    fn test_overall_risk_ties_ignore_probability() {
        let a = prediction(HazardType::Flood, 0.81);
        let b = prediction(HazardType::Cyclone, 0.99);
        assert_eq!(overall_risk([&a, &b]), Some(RiskLevel::Critical));
    }

    #[test]
    fn test_assessment_serializes_by_name() {
        let mut predictions = BTreeMap::new();
        predictions.insert(HazardType::Landslide, prediction(HazardType::Landslide, 0.6));
        let assessment = Assessment::new(predictions);

        let json = serde_json::to_value(&assessment).unwrap();
        assert_eq!(json["overall_risk"], "high");
        assert_eq!(json["predictions"]["landslide"]["risk_level"], "high");
        assert!(json["predictions"]["landslide"]["model_predictions"]["extra_trees"].is_number());
    }

    #[test]
    fn test_weather_optional_fields_default() {
        let weather: WeatherSnapshot = serde_json::from_str(
            r#"{"temperature": 30.0, "humidity": 60.0, "pressure": 1008.0, "wind_speed": 4.0}"#,
        )
        .unwrap();
        assert_eq!(weather.rainfall_1h, 0.0);
    }
}
