//! Model Registry - One record per hazard
//!
//! Single writer, atomic swap, many readers. A reader clones the slot's
//! `Arc` and scores against that snapshot; a writer publishes a complete
//! new record in one pointer swap. Nobody ever sees new weights next to an
//! old scaler.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::logic::hazard::HazardType;
use crate::logic::model::{BaseLearner, EnsembleWeights, LearnerKind, StandardScaler, LEARNER_COUNT};

// ============================================================================
// RECORD
// ============================================================================

/// Held-out evaluation of the ensemble at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub trained_at: DateTime<Utc>,
}

/// Everything needed to score one hazard. Immutable once built.
#[derive(Debug)]
pub struct HazardModelRecord {
    hazard: HazardType,
    learners: [Arc<dyn BaseLearner>; LEARNER_COUNT],
    weights: EnsembleWeights,
    accuracies: [f64; LEARNER_COUNT],
    ensemble_accuracy: f64,
    scaler: StandardScaler,
    metrics: TrainingMetrics,
}

impl HazardModelRecord {
    pub fn new(
        hazard: HazardType,
        learners: [Arc<dyn BaseLearner>; LEARNER_COUNT],
        weights: EnsembleWeights,
        accuracies: [f64; LEARNER_COUNT],
        ensemble_accuracy: f64,
        scaler: StandardScaler,
        metrics: TrainingMetrics,
    ) -> Self {
        Self {
            hazard,
            learners,
            weights,
            accuracies,
            ensemble_accuracy,
            scaler,
            metrics,
        }
    }

    pub fn hazard(&self) -> HazardType {
        self.hazard
    }

    pub fn learners(&self) -> &[Arc<dyn BaseLearner>; LEARNER_COUNT] {
        &self.learners
    }

    pub fn weights(&self) -> &EnsembleWeights {
        &self.weights
    }

    pub fn accuracies(&self) -> &[f64; LEARNER_COUNT] {
        &self.accuracies
    }

    pub fn ensemble_accuracy(&self) -> f64 {
        self.ensemble_accuracy
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    pub fn accuracy_report(&self) -> HazardAccuracy {
        let by_slot = |values: &[f64; LEARNER_COUNT]| -> BTreeMap<LearnerKind, f64> {
            LearnerKind::SLOTS
                .iter()
                .zip(values)
                .map(|(kind, v)| (*kind, *v))
                .collect()
        };

        HazardAccuracy {
            learners: by_slot(&self.accuracies),
            weights: by_slot(self.weights.as_array()),
            ensemble: self.ensemble_accuracy,
            metrics: self.metrics.clone(),
        }
    }
}

/// Accuracy summary for one hazard, keyed by learner name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HazardAccuracy {
    pub learners: BTreeMap<LearnerKind, f64>,
    pub weights: BTreeMap<LearnerKind, f64>,
    pub ensemble: f64,
    pub metrics: TrainingMetrics,
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Fixed table, one slot per `HazardType`. Never grows or shrinks.
#[derive(Debug)]
pub struct ModelRegistry {
    slots: [RwLock<Option<Arc<HazardModelRecord>>>; HazardType::COUNT],
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| RwLock::new(None)),
        }
    }

    /// Snapshot of the live record; `ModelNotTrained` while the slot is empty
    pub fn get(&self, hazard: HazardType) -> EngineResult<Arc<HazardModelRecord>> {
        self.snapshot(hazard).ok_or(EngineError::ModelNotTrained(hazard))
    }

    pub fn get_by_name(&self, name: &str) -> EngineResult<Arc<HazardModelRecord>> {
        self.get(name.parse()?)
    }

    pub fn snapshot(&self, hazard: HazardType) -> Option<Arc<HazardModelRecord>> {
        self.slots[hazard.index()].read().clone()
    }

    /// Publish a complete record, returning the one it replaced
    pub fn publish(&self, record: HazardModelRecord) -> Option<Arc<HazardModelRecord>> {
        let hazard = record.hazard();
        let record = Arc::new(record);
        self.slots[hazard.index()].write().replace(record)
    }

    /// Back to `Empty`
    pub fn clear(&self, hazard: HazardType) -> Option<Arc<HazardModelRecord>> {
        self.slots[hazard.index()].write().take()
    }

    pub fn is_trained(&self, hazard: HazardType) -> bool {
        self.slots[hazard.index()].read().is_some()
    }

    pub fn trained_count(&self) -> usize {
        HazardType::ALL.iter().filter(|h| self.is_trained(**h)).count()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
