//! Weighted Ensemble Combiner
//!
//! p = Σ wᵢ · pᵢ over the four slots, in slot order. Weights are pinned at
//! training time (accuracy-proportional) and never renormalized per call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::learner::{BaseLearner, LEARNER_COUNT};
use crate::error::{EngineError, EngineResult};
use crate::logic::features::FeatureVector;
use crate::logic::registry::HazardModelRecord;

/// Tolerance on Σw = 1
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

// ============================================================================
// WEIGHTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; LEARNER_COUNT]", into = "[f64; LEARNER_COUNT]")]
pub struct EnsembleWeights([f64; LEARNER_COUNT]);

impl EnsembleWeights {
    /// Explicit weights; non-negative, finite, summing to 1
    pub fn new(weights: [f64; LEARNER_COUNT]) -> Result<Self, String> {
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!("weights must be finite and non-negative: {:?}", weights));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(format!("weights sum to {}, expected 1", sum));
        }
        Ok(Self(weights))
    }

    /// wᵢ = accᵢ / Σ acc
    pub fn from_accuracies(accuracies: &[f64; LEARNER_COUNT]) -> Result<Self, String> {
        if accuracies.iter().any(|a| !a.is_finite() || *a < 0.0) {
            return Err(format!("accuracies must be finite and non-negative: {:?}", accuracies));
        }
        let total: f64 = accuracies.iter().sum();
        if total <= 0.0 {
            return Err("every learner has zero held-out accuracy".to_string());
        }
        Self::new(accuracies.map(|a| a / total))
    }

    pub fn as_array(&self) -> &[f64; LEARNER_COUNT] {
        &self.0
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl TryFrom<[f64; LEARNER_COUNT]> for EnsembleWeights {
    type Error = String;

    fn try_from(weights: [f64; LEARNER_COUNT]) -> Result<Self, Self::Error> {
        Self::new(weights)
    }
}

impl From<EnsembleWeights> for [f64; LEARNER_COUNT] {
    fn from(weights: EnsembleWeights) -> Self {
        weights.0
    }
}

// ============================================================================
// COMBINATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Combination {
    pub probability: f64,
    /// Per-slot probabilities, for explainability
    pub learner_probabilities: [f64; LEARNER_COUNT],
}

/// Scale the vector with the record's scaler, then combine
pub fn combine(vector: &FeatureVector, record: &HazardModelRecord) -> EngineResult<Combination> {
    let scaled = record.scaler().transform_row(vector.as_slice())?;
    combine_scaled(&scaled, record.learners(), record.weights())
}

/// Combine an already-scaled row. A learner answering outside [0, 1] is `OutOfRange`.
pub fn combine_scaled(
    x: &[f64],
    learners: &[Arc<dyn BaseLearner>; LEARNER_COUNT],
    weights: &EnsembleWeights,
) -> EngineResult<Combination> {
    let mut learner_probabilities = [0.0; LEARNER_COUNT];
    let mut probability = 0.0;

    for (slot, learner) in learners.iter().enumerate() {
        let p = learner.probability_of_positive(x);
        if !(0.0..=1.0).contains(&p) {
            return Err(EngineError::OutOfRange(p));
        }
        learner_probabilities[slot] = p;
        probability += weights.0[slot] * p;
    }

    // rounding in Σw is tolerated; anything larger is a bad weight set
    if probability > 1.0 + WEIGHT_SUM_TOLERANCE {
        return Err(EngineError::OutOfRange(probability));
    }

    Ok(Combination {
        probability: probability.min(1.0),
        learner_probabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::learner::LearnerKind;

    #[derive(Debug)]
    struct Fixed(f64);

    impl BaseLearner for Fixed {
        fn kind(&self) -> LearnerKind {
            LearnerKind::RandomForest
        }

        fn probability_of_positive(&self, _x: &[f64]) -> f64 {
            self.0
        }
    }

    fn fixed(ps: [f64; LEARNER_COUNT]) -> [Arc<dyn BaseLearner>; LEARNER_COUNT] {
        ps.map(|p| Arc::new(Fixed(p)) as Arc<dyn BaseLearner>)
    }

    #[test]
    fn test_weighted_sum_in_slot_order() {
        let weights = EnsembleWeights::new([0.3, 0.3, 0.2, 0.2]).unwrap();
        let result = combine_scaled(&[], &fixed([0.9, 0.8, 0.1, 0.2]), &weights).unwrap();

        assert!((result.probability - 0.59).abs() < 1e-12);
        assert_eq!(result.learner_probabilities, [0.9, 0.8, 0.1, 0.2]);
    }

    #[test]
    fn test_from_accuracies_normalizes() {
        let weights = EnsembleWeights::from_accuracies(&[0.9, 0.6, 0.3, 0.0]).unwrap();

        assert!((weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((weights.as_array()[0] - 0.5).abs() < 1e-12);
        assert_eq!(weights.as_array()[3], 0.0);
    }

    #[test]
    fn test_zero_accuracy_rejected() {
        assert!(EnsembleWeights::from_accuracies(&[0.0; LEARNER_COUNT]).is_err());
        assert!(EnsembleWeights::from_accuracies(&[0.5, -0.1, 0.3, 0.3]).is_err());
    }

    #[test]
    fn test_new_rejects_bad_sums() {
        assert!(EnsembleWeights::new([0.5, 0.5, 0.5, 0.0]).is_err());
        assert!(EnsembleWeights::new([1.0, 0.0, 0.0, 0.0]).is_ok());
    }

    #[test]
    fn test_learner_out_of_range() {
        let weights = EnsembleWeights::new([1.0, 0.0, 0.0, 0.0]).unwrap();
        let result = combine_scaled(&[], &fixed([0.5, 1.5, 0.0, 0.0]), &weights);
        assert!(matches!(result, Err(EngineError::OutOfRange(p)) if p == 1.5));
    }

    #[test]
    fn test_sum_above_one_is_out_of_range() {
        let drift = EnsembleWeights([0.5 + 1e-12, 0.5, 0.0, 0.0]);
        let result = combine_scaled(&[], &fixed([1.0, 1.0, 0.0, 0.0]), &drift).unwrap();
        assert_eq!(result.probability, 1.0);

        let oversized = EnsembleWeights([0.6, 0.6, 0.0, 0.0]);
        let result = combine_scaled(&[], &fixed([1.0, 1.0, 0.0, 0.0]), &oversized);
        assert!(matches!(result, Err(EngineError::OutOfRange(p)) if p > 1.0));
    }

    #[test]
    fn test_weights_deserialize_validated() {
        let ok: EnsembleWeights = serde_json::from_str("[0.25,0.25,0.25,0.25]").unwrap();
        assert_eq!(ok.sum(), 1.0);
        assert!(serde_json::from_str::<EnsembleWeights>("[0.9,0.9,0.0,0.0]").is_err());
    }
}
