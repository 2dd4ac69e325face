//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use ndarray::{Array2, ArrayView2};

use crate::logic::features::FEATURE_COUNT;
use crate::logic::hazard::HazardType;
use crate::logic::model::{
    BaseLearner, EnsembleWeights, FitError, LearnerKind, LearnerTrainer, StandardScaler, LEARNER_COUNT,
};
use crate::logic::registry::{HazardModelRecord, TrainingMetrics};

/// Always answers the same probability
#[derive(Debug)]
pub struct FixedLearner {
    pub kind: LearnerKind,
    pub probability: f64,
    pub calls: Arc<AtomicUsize>,
}

impl BaseLearner for FixedLearner {
    fn kind(&self) -> LearnerKind {
        self.kind
    }

    fn probability_of_positive(&self, _x: &[f64]) -> f64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.probability
    }
}

/// Identity scaler over the full layout
pub fn identity_scaler() -> StandardScaler {
    let x = Array2::from_shape_fn((2, FEATURE_COUNT), |(i, _)| if i == 0 { -1.0 } else { 1.0 });
    StandardScaler::fit(x.view()).expect("scaler fits")
}

pub fn metrics() -> TrainingMetrics {
    TrainingMetrics {
        precision: 0.7,
        recall: 0.6,
        f1: 0.65,
        train_rows: 80,
        test_rows: 20,
        trained_at: Utc::now(),
    }
}

pub fn record_with(
    hazard: HazardType,
    probabilities: [f64; LEARNER_COUNT],
    weights: [f64; LEARNER_COUNT],
) -> HazardModelRecord {
    counted_record(hazard, probabilities, weights).0
}

/// Record plus the call counter shared by all four learners
pub fn counted_record(
    hazard: HazardType,
    probabilities: [f64; LEARNER_COUNT],
    weights: [f64; LEARNER_COUNT],
) -> (HazardModelRecord, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let learners = std::array::from_fn(|slot| {
        Arc::new(FixedLearner {
            kind: LearnerKind::SLOTS[slot],
            probability: probabilities[slot],
            calls: calls.clone(),
        }) as Arc<dyn BaseLearner>
    });

    let record = HazardModelRecord::new(
        hazard,
        learners,
        EnsembleWeights::new(weights).expect("valid weights"),
        [0.8, 0.7, 0.6, 0.5],
        0.75,
        identity_scaler(),
        metrics(),
    );
    (record, calls)
}

/// Every slot answers `p`, equal weights
pub fn fixed_record(hazard: HazardType, p: f64) -> HazardModelRecord {
    record_with(hazard, [p; LEARNER_COUNT], [0.25; LEARNER_COUNT])
}

/// Trainer that always fails to fit
#[derive(Debug)]
pub struct FailingTrainer(pub LearnerKind);

impl LearnerTrainer for FailingTrainer {
    fn kind(&self) -> LearnerKind {
        self.0
    }

    fn fit(&self, _x: ArrayView2<'_, f64>, _y: &[u8], _seed: u64) -> Result<Arc<dyn BaseLearner>, FitError> {
        Err(FitError::Diverged("simulated failure".to_string()))
    }
}
