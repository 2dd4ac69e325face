//! Hazard Risk Core - Ensemble Scoring Engine
//!
//! Estimates, per location and hazard, a calibrated probability of occurrence
//! by combining four independently trained classifiers into one weighted
//! ensemble score, then maps that score to a discrete risk level.
//!
//! # Architecture
//!
//! ```text
//! raw features ──► features::validate ──► FeatureVector
//!                                             │
//!                      ModelRegistry ──► HazardModelRecord (scaler, 4 learners, weights)
//!                                             │
//!                                   model::combine ──► model::risk ──► PredictionResult
//!
//! lifecycle (out of band): data provider ──► train ──► atomic swap ──► artifact store
//! ```
//!
//! The scoring path only reads snapshots of a record. Training builds a
//! complete new record and publishes it with a single pointer swap.

pub mod constants;
pub mod error;
pub mod logic;

pub use error::{ContractError, EngineError, EngineResult};
pub use logic::engine::{EngineStatus, HazardEngine, HazardState};
pub use logic::features::{validate, FeatureVector, RawFeatures, FEATURE_COUNT, FEATURE_LAYOUT};
pub use logic::hazard::HazardType;
pub use logic::lifecycle::storage::{ArtifactStore, FileArtifactStore, MemoryArtifactStore, StoreError};
pub use logic::lifecycle::{DataError, LabeledSet, LoadReport, TrainingConfig, TrainingDataProvider};
pub use logic::model::{BaseLearner, LearnerKind, LearnerSuite, RiskLevel};
pub use logic::registry::{HazardAccuracy, HazardModelRecord, TrainingMetrics};
pub use logic::scoring::{
    overall_risk, Assessment, BatchItem, BatchOutcome, FeatureProvider, Location, PredictionResult, WeatherSnapshot,
};
pub use logic::synthetic::{SyntheticFeatureProvider, SyntheticTrainingData};
