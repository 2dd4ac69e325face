//! Engine Errors
//!
//! Every failure the engine can report, grouped the way callers react to them:
//! contract violations are the caller's fault, registry mismatches surface
//! immediately, training and persistence failures never touch the live record.

use thiserror::Error;

use crate::logic::hazard::HazardType;
use crate::logic::lifecycle::storage::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Feature input that does not satisfy the canonical layout
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    #[error("missing feature field '{field}'")]
    MissingField { field: String },

    #[error("invalid value for feature '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("feature sequence has {actual} values, expected {expected}")]
    Shape { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("contract violation: {0}")]
    Contract(#[from] ContractError),

    #[error("unknown hazard type: {0}")]
    UnknownHazard(String),

    #[error("no trained model for {0}")]
    ModelNotTrained(HazardType),

    #[error("probability {0} is outside [0, 1]")]
    OutOfRange(f64),

    #[error("training failed for {hazard}: {reason}")]
    TrainingFailure { hazard: HazardType, reason: String },

    #[error("persistence failed for {hazard}: {source}")]
    Persistence {
        hazard: HazardType,
        #[source]
        source: StoreError,
    },

    #[error("retrain already in progress for {0}")]
    RetrainInProgress(HazardType),
}

impl EngineError {
    pub fn training(hazard: HazardType, reason: impl Into<String>) -> Self {
        EngineError::TrainingFailure { hazard, reason: reason.into() }
    }

    pub fn persistence(hazard: HazardType, source: StoreError) -> Self {
        EngineError::Persistence { hazard, source }
    }

    /// Short machine-readable category, used by the HTTP binding and logs
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Contract(_) => "contract_error",
            EngineError::UnknownHazard(_) => "unknown_hazard",
            EngineError::ModelNotTrained(_) => "model_not_trained",
            EngineError::OutOfRange(_) => "out_of_range",
            EngineError::TrainingFailure { .. } => "training_failure",
            EngineError::Persistence { .. } => "persistence_error",
            EngineError::RetrainInProgress(_) => "retrain_in_progress",
        }
    }
}
