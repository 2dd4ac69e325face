//! Model Module - Base learners, scaler, combiner, risk mapping
//!
//! Everything downstream of a validated FeatureVector and upstream of a
//! PredictionResult. Learners are only ever reached through `BaseLearner`.

pub mod learner;
pub mod tree;
pub mod forest;
pub mod boosting;
pub mod neural;
pub mod scaler;
pub mod combiner;
pub mod risk;

// Re-export common types
pub use combiner::{combine, combine_scaled, Combination, EnsembleWeights};
pub use learner::{
    BaseLearner, FitError, LearnerArtifact, LearnerKind, LearnerParams, LearnerSuite, LearnerTrainer,
    LEARNER_COUNT,
};
pub use risk::RiskLevel;
pub use scaler::StandardScaler;
