//! Base Learners - The capability the combiner is written against
//!
//! Four slots per hazard. The combiner only ever sees `BaseLearner`;
//! concrete algorithms live in `forest`, `boosting` and `neural`.

use std::fmt;
use std::sync::Arc;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::boosting::{BoostedTrees, BoostingParams, BoostingTrainer};
use super::forest::{ForestParams, ForestTrainer, TreeEnsemble};
use super::neural::{Mlp, MlpParams, MlpTrainer};

/// Number of base-learner slots per hazard
pub const LEARNER_COUNT: usize = 4;

// ============================================================================
// LEARNER KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerKind {
    RandomForest,
    ExtraTrees,
    GradientBoosting,
    NeuralNetwork,
}

impl LearnerKind {
    /// Slot order. Weights and probabilities are always reported in this order.
    pub const SLOTS: [LearnerKind; LEARNER_COUNT] = [
        LearnerKind::RandomForest,
        LearnerKind::ExtraTrees,
        LearnerKind::GradientBoosting,
        LearnerKind::NeuralNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LearnerKind::RandomForest => "random_forest",
            LearnerKind::ExtraTrees => "extra_trees",
            LearnerKind::GradientBoosting => "gradient_boosting",
            LearnerKind::NeuralNetwork => "neural_network",
        }
    }

    pub fn slot(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for LearnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// A trained binary classifier.
///
/// Input is a scaled feature row in canonical layout order.
pub trait BaseLearner: Send + Sync + fmt::Debug {
    fn kind(&self) -> LearnerKind;

    /// P(positive | x), expected in [0, 1]
    fn probability_of_positive(&self, x: &[f64]) -> f64;

    /// Serializable form; `None` for learners that cannot be persisted
    fn to_artifact(&self) -> Option<LearnerArtifact> {
        None
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("training set is empty")]
    Empty,

    #[error("{rows} rows but {labels} labels")]
    Shape { rows: usize, labels: usize },

    #[error("labels must be 0 or 1, found {0}")]
    InvalidLabel(u8),

    #[error("training diverged: {0}")]
    Diverged(String),
}

/// Fits one learner slot
pub trait LearnerTrainer: Send + Sync {
    fn kind(&self) -> LearnerKind;

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[u8], seed: u64) -> Result<Arc<dyn BaseLearner>, FitError>;
}

/// Shared input checks for the built-in trainers
pub(crate) fn check_fit_input(x: &ArrayView2<'_, f64>, y: &[u8]) -> Result<(), FitError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(FitError::Empty);
    }
    if x.nrows() != y.len() {
        return Err(FitError::Shape { rows: x.nrows(), labels: y.len() });
    }
    if let Some(&bad) = y.iter().find(|&&label| label > 1) {
        return Err(FitError::InvalidLabel(bad));
    }
    Ok(())
}

// ============================================================================
// ARTIFACTS
// ============================================================================

/// Persisted form of a built-in learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerArtifact {
    Forest(TreeEnsemble),
    Boosting(BoostedTrees),
    Neural(Mlp),
}

impl LearnerArtifact {
    pub fn kind(&self) -> LearnerKind {
        match self {
            LearnerArtifact::Forest(model) => model.kind(),
            LearnerArtifact::Boosting(_) => LearnerKind::GradientBoosting,
            LearnerArtifact::Neural(_) => LearnerKind::NeuralNetwork,
        }
    }

    /// Rebuild a live learner, rejecting structurally broken artifacts
    pub fn into_learner(self, n_features: usize) -> Result<Arc<dyn BaseLearner>, String> {
        match self {
            LearnerArtifact::Forest(model) => {
                model.check(n_features)?;
                Ok(Arc::new(model))
            }
            LearnerArtifact::Boosting(model) => {
                model.check(n_features)?;
                Ok(Arc::new(model))
            }
            LearnerArtifact::Neural(model) => {
                model.check(n_features)?;
                Ok(Arc::new(model))
            }
        }
    }
}

// ============================================================================
// SUITE
// ============================================================================

/// Hyperparameters for the four built-in trainers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerParams {
    pub random_forest: ForestParams,
    pub extra_trees: ForestParams,
    pub gradient_boosting: BoostingParams,
    pub neural_network: MlpParams,
}

impl Default for LearnerParams {
    fn default() -> Self {
        Self {
            random_forest: ForestParams::random_forest(),
            extra_trees: ForestParams::extra_trees(),
            gradient_boosting: BoostingParams::default(),
            neural_network: MlpParams::default(),
        }
    }
}

/// One trainer per slot, in `LearnerKind::SLOTS` order
pub struct LearnerSuite {
    trainers: [Box<dyn LearnerTrainer>; LEARNER_COUNT],
}

impl LearnerSuite {
    pub fn new(trainers: [Box<dyn LearnerTrainer>; LEARNER_COUNT]) -> Self {
        for (slot, trainer) in trainers.iter().enumerate() {
            if trainer.kind() != LearnerKind::SLOTS[slot] {
                log::warn!(
                    "Trainer for slot {} reports kind {}, expected {}",
                    slot,
                    trainer.kind(),
                    LearnerKind::SLOTS[slot]
                );
            }
        }
        Self { trainers }
    }

    pub fn from_params(params: &LearnerParams) -> Self {
        Self::new([
            Box::new(ForestTrainer::new(LearnerKind::RandomForest, params.random_forest)),
            Box::new(ForestTrainer::new(LearnerKind::ExtraTrees, params.extra_trees)),
            Box::new(BoostingTrainer::new(params.gradient_boosting)),
            Box::new(MlpTrainer::new(params.neural_network)),
        ])
    }

    pub fn trainers(&self) -> &[Box<dyn LearnerTrainer>; LEARNER_COUNT] {
        &self.trainers
    }
}

impl Default for LearnerSuite {
    fn default() -> Self {
        Self::from_params(&LearnerParams::default())
    }
}

impl fmt::Debug for LearnerSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.trainers.iter().map(|t| t.kind()))
            .finish()
    }
}
