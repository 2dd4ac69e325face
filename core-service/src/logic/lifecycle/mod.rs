//! Model Lifecycle - train → evaluate → persist → load → retrain
//!
//! Per hazard: `Empty → Trained`. A failed `train` keeps whatever record was
//! live; a failed `load` leaves the hazard `Empty` and never affects the
//! others. Every writer for a hazard goes through the same non-blocking
//! guard, so a second concurrent retrain is rejected instead of duplicated.

pub mod storage;


use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ndarray::{Array2, Axis};
use parking_lot::{Mutex, MutexGuard};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;

use crate::constants::{get_training_samples, get_training_seed, DEFAULT_TEST_FRACTION, DEFAULT_TRAINING_SAMPLES, DEFAULT_TRAINING_SEED};
use crate::error::{EngineError, EngineResult};
use crate::logic::features::FEATURE_COUNT;
use crate::logic::hazard::HazardType;
use crate::logic::model::{
    combine_scaled, BaseLearner, EnsembleWeights, LearnerParams, LearnerSuite, StandardScaler, LEARNER_COUNT,
};
use crate::logic::registry::{HazardModelRecord, ModelRegistry, TrainingMetrics};

use self::storage::{ArtifactStore, ModelBundle, StoreError};

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingConfig {
    /// Rows requested from the training-data provider
    pub samples: usize,
    pub test_fraction: f64,
    /// Seeds the split and every learner
    pub seed: u64,
    pub learners: LearnerParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            samples: DEFAULT_TRAINING_SAMPLES,
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_TRAINING_SEED,
            learners: LearnerParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Defaults, with `HAZARD_TRAINING_SAMPLES` / `HAZARD_TRAINING_SEED` applied
    pub fn from_env() -> Self {
        Self {
            samples: get_training_samples(),
            seed: get_training_seed(),
            ..Default::default()
        }
    }

    /// Reduced learners for quick runs and tests
    pub fn small(samples: usize) -> Self {
        let defaults = LearnerParams::default();
        Self {
            samples,
            learners: LearnerParams {
                random_forest: defaults.random_forest.small(),
                extra_trees: defaults.extra_trees.small(),
                gradient_boosting: defaults.gradient_boosting.small(),
                neural_network: defaults.neural_network.small(),
            },
            ..Default::default()
        }
    }
}

// ============================================================================
// TRAINING DATA
// ============================================================================

#[derive(Debug, Error)]
#[error("training data unavailable: {0}")]
pub struct DataError(pub String);

/// Labeled rows in canonical layout order, label 1 = hazard occurred
#[derive(Debug, Clone)]
pub struct LabeledSet {
    x: Array2<f64>,
    y: Vec<u8>,
}

impl LabeledSet {
    pub fn new(x: Array2<f64>, y: Vec<u8>) -> Result<Self, DataError> {
        if x.ncols() != FEATURE_COUNT {
            return Err(DataError(format!("{} columns, layout has {}", x.ncols(), FEATURE_COUNT)));
        }
        if x.nrows() != y.len() {
            return Err(DataError(format!("{} rows but {} labels", x.nrows(), y.len())));
        }
        if y.iter().any(|&label| label > 1) {
            return Err(DataError("labels must be 0 or 1".to_string()));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(DataError("feature matrix contains non-finite values".to_string()));
        }
        Ok(Self { x, y })
    }

    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    pub fn y(&self) -> &[u8] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.y.iter().filter(|&&label| label == 1).count()
    }
}

/// Supplies a labeled dataset for one hazard
pub trait TrainingDataProvider: Send + Sync {
    fn labeled_set(&self, hazard: HazardType, samples: usize, seed: u64) -> Result<LabeledSet, DataError>;
}

// ============================================================================
// SPLIT / EVALUATION
// ============================================================================

/// Stratified split: each class contributes `round(n_class · test_fraction)`
/// rows to the held-out side. Returns sorted (train, test) row indices.
pub fn stratified_split(y: &[u8], test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut idx: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        idx.shuffle(&mut rng);

        let n_test = ((idx.len() as f64) * test_fraction).round() as usize;
        test.extend_from_slice(&idx[..n_test.min(idx.len())]);
        train.extend_from_slice(&idx[n_test.min(idx.len())..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Fraction of `p > 0.5` predictions matching the label
pub fn accuracy(probabilities: &[f64], y: &[u8]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let correct = probabilities
        .iter()
        .zip(y)
        .filter(|(p, &label)| (**p > 0.5) == (label == 1))
        .count();
    correct as f64 / y.len() as f64
}

/// (precision, recall, f1) of the positive class; 0 where undefined
pub fn precision_recall_f1(probabilities: &[f64], y: &[u8]) -> (f64, f64, f64) {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (p, &label) in probabilities.iter().zip(y) {
        match (*p > 0.5, label == 1) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1)
}

/// Fit scaler and all four learners on the training split, weight them by
/// held-out accuracy, evaluate the ensemble. Any slot failing aborts.
pub fn fit_record(
    hazard: HazardType,
    set: &LabeledSet,
    config: &TrainingConfig,
    suite: &LearnerSuite,
) -> EngineResult<HazardModelRecord> {
    let (train_idx, test_idx) = stratified_split(set.y(), config.test_fraction, config.seed);
    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(EngineError::training(
            hazard,
            format!("{} rows cannot be split into train and held-out sets", set.len()),
        ));
    }

    let train_x = set.x().select(Axis(0), &train_idx);
    let test_x = set.x().select(Axis(0), &test_idx);
    let train_y: Vec<u8> = train_idx.iter().map(|&i| set.y()[i]).collect();
    let test_y: Vec<u8> = test_idx.iter().map(|&i| set.y()[i]).collect();

    let scaler = StandardScaler::fit(train_x.view())
        .ok_or_else(|| EngineError::training(hazard, "cannot fit scaler on an empty split"))?;
    let train_s = scaler.transform(train_x.view());
    let test_rows: Vec<Vec<f64>> = scaler
        .transform(test_x.view())
        .outer_iter()
        .map(|row| row.to_vec())
        .collect();

    let mut learners: Vec<Arc<dyn BaseLearner>> = Vec::with_capacity(LEARNER_COUNT);
    let mut accuracies = [0.0; LEARNER_COUNT];

    for (slot, trainer) in suite.trainers().iter().enumerate() {
        let started = Instant::now();
        let seed = config.seed.wrapping_add(1 + slot as u64);
        let learner = trainer
            .fit(train_s.view(), &train_y, seed)
            .map_err(|e| EngineError::training(hazard, format!("{} failed to fit: {}", trainer.kind(), e)))?;

        let probabilities: Vec<f64> = test_rows.iter().map(|row| learner.probability_of_positive(row)).collect();
        if let Some(p) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(EngineError::training(
                hazard,
                format!("{} produced probability {} outside [0, 1]", trainer.kind(), p),
            ));
        }

        accuracies[slot] = accuracy(&probabilities, &test_y);
        log::debug!(
            "[{}] {} held-out accuracy {:.4} ({:.1?})",
            hazard,
            trainer.kind(),
            accuracies[slot],
            started.elapsed()
        );
        learners.push(learner);
    }

    let learners: [Arc<dyn BaseLearner>; LEARNER_COUNT] = learners
        .try_into()
        .map_err(|_| EngineError::training(hazard, "learner suite did not fill every slot"))?;

    let weights = EnsembleWeights::from_accuracies(&accuracies).map_err(|reason| EngineError::training(hazard, reason))?;

    let ensemble: Vec<f64> = test_rows
        .iter()
        .map(|row| combine_scaled(row, &learners, &weights).map(|c| c.probability))
        .collect::<EngineResult<_>>()
        .map_err(|e| EngineError::training(hazard, format!("ensemble evaluation failed: {}", e)))?;

    let ensemble_accuracy = accuracy(&ensemble, &test_y);
    let (precision, recall, f1) = precision_recall_f1(&ensemble, &test_y);

    Ok(HazardModelRecord::new(
        hazard,
        learners,
        weights,
        accuracies,
        ensemble_accuracy,
        scaler,
        TrainingMetrics {
            precision,
            recall,
            f1,
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
            trained_at: Utc::now(),
        },
    ))
}

// ============================================================================
// REPORTS
// ============================================================================

/// Per-hazard outcome of `load_all` / `ensure_models`
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<HazardType>,
    /// Trained because no usable bundle existed (`ensure_models` only)
    pub trained: Vec<HazardType>,
    pub failed: BTreeMap<HazardType, String>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// LIFECYCLE MANAGER
// ============================================================================

pub struct ModelLifecycle {
    registry: Arc<ModelRegistry>,
    store: Arc<dyn ArtifactStore>,
    data: Arc<dyn TrainingDataProvider>,
    suite: LearnerSuite,
    config: TrainingConfig,
    /// One writer per hazard
    guards: [Mutex<()>; HazardType::COUNT],
}

impl ModelLifecycle {
    pub fn new(
        registry: Arc<ModelRegistry>,
        store: Arc<dyn ArtifactStore>,
        data: Arc<dyn TrainingDataProvider>,
        suite: LearnerSuite,
        config: TrainingConfig,
    ) -> Self {
        Self {
            registry,
            store,
            data,
            suite,
            config,
            guards: std::array::from_fn(|_| Mutex::new(())),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// A train, retrain, persist or load currently holds this hazard
    pub fn is_busy(&self, hazard: HazardType) -> bool {
        self.guards[hazard.index()].is_locked()
    }

    fn acquire(&self, hazard: HazardType) -> EngineResult<MutexGuard<'_, ()>> {
        self.guards[hazard.index()]
            .try_lock()
            .ok_or(EngineError::RetrainInProgress(hazard))
    }

    /// Fit a fresh record and publish it. Returns held-out ensemble accuracy.
    pub fn train(&self, hazard: HazardType) -> EngineResult<f64> {
        let _guard = self.acquire(hazard)?;
        self.train_locked(hazard)
    }

    fn train_locked(&self, hazard: HazardType) -> EngineResult<f64> {
        let started = Instant::now();
        log::info!(
            "[{}] Training ensemble ({} samples, seed {})",
            hazard,
            self.config.samples,
            self.config.seed
        );

        let result = self
            .data
            .labeled_set(hazard, self.config.samples, self.config.seed)
            .map_err(|e| EngineError::training(hazard, e.to_string()))
            .and_then(|set| {
                log::debug!("[{}] {} rows, {} positive", hazard, set.len(), set.positives());
                fit_record(hazard, &set, &self.config, &self.suite)
            });

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::error!("[{}] Training failed, keeping previous model: {}", hazard, e);
                return Err(e);
            }
        };

        let accuracy = record.ensemble_accuracy();
        log::info!(
            "[{}] Trained in {:.1?}: ensemble accuracy {:.4}, learner accuracies {:.4?}, weights {:.4?}",
            hazard,
            started.elapsed(),
            accuracy,
            record.accuracies(),
            record.weights().as_array()
        );

        self.registry.publish(record);
        Ok(accuracy)
    }

    /// Write the live record to the artifact store. In-memory state is untouched.
    pub fn persist(&self, hazard: HazardType) -> EngineResult<()> {
        let _guard = self.acquire(hazard)?;
        self.persist_locked(hazard)
    }

    fn persist_locked(&self, hazard: HazardType) -> EngineResult<()> {
        let record = self.registry.get(hazard)?;

        ModelBundle::from_record(&record)
            .and_then(|bundle| self.store.write(hazard, &bundle))
            .map_err(|e| {
                log::error!("[{}] Persist failed: {}", hazard, e);
                EngineError::persistence(hazard, e)
            })?;

        log::info!("[{}] Model persisted", hazard);
        Ok(())
    }

    /// Rebuild the record from the artifact store. On failure the hazard is `Empty`.
    pub fn load(&self, hazard: HazardType) -> EngineResult<()> {
        let _guard = self.acquire(hazard)?;

        let result = self.store.read(hazard).and_then(|bundle| {
            if bundle.hazard != hazard {
                return Err(StoreError::Corrupt(format!("bundle is for {}, expected {}", bundle.hazard, hazard)));
            }
            bundle.into_record()
        });

        match result {
            Ok(record) => {
                log::info!(
                    "[{}] Model loaded (ensemble accuracy {:.4})",
                    hazard,
                    record.ensemble_accuracy()
                );
                self.registry.publish(record);
                Ok(())
            }
            Err(e) => {
                self.registry.clear(hazard);
                if e.is_not_found() {
                    log::info!("[{}] No stored model", hazard);
                } else {
                    log::warn!("[{}] Load failed: {}", hazard, e);
                }
                Err(EngineError::persistence(hazard, e))
            }
        }
    }

    /// `train` + `persist` under one guard
    pub fn retrain(&self, hazard: HazardType) -> EngineResult<f64> {
        let _guard = self.acquire(hazard)?;
        let accuracy = self.train_locked(hazard)?;
        self.persist_locked(hazard)?;
        Ok(accuracy)
    }

    pub fn load_all(&self) -> LoadReport {
        let mut report = LoadReport::default();
        for hazard in HazardType::ALL {
            match self.load(hazard) {
                Ok(()) => report.loaded.push(hazard),
                Err(e) => {
                    report.failed.insert(hazard, e.to_string());
                }
            }
        }
        report
    }

    pub fn train_all(&self) -> Vec<(HazardType, EngineResult<f64>)> {
        HazardType::ALL.iter().map(|&h| (h, self.train(h))).collect()
    }

    pub fn retrain_all(&self) -> Vec<(HazardType, EngineResult<f64>)> {
        HazardType::ALL.iter().map(|&h| (h, self.retrain(h))).collect()
    }

    /// Load everything; train and persist whatever could not be loaded
    pub fn ensure_models(&self) -> LoadReport {
        let loaded = self.load_all();
        let mut report = LoadReport {
            loaded: loaded.loaded,
            ..Default::default()
        };

        for hazard in loaded.failed.into_keys() {
            match self.retrain(hazard) {
                Ok(_) => report.trained.push(hazard),
                Err(e) => {
                    report.failed.insert(hazard, e.to_string());
                }
            }
        }

        log::info!(
            "Models ready: {} loaded, {} trained, {} failed",
            report.loaded.len(),
            report.trained.len(),
            report.failed.len()
        );
        report
    }
}
