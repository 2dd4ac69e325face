//! Central Configuration Constants
//!
//! Single source of truth for engine defaults.
//! Every value can be overridden from the environment.

use std::path::PathBuf;

/// Default number of synthetic rows generated per hazard for training
pub const DEFAULT_TRAINING_SAMPLES: usize = 20_000;

/// Default seed for data generation, splits and learner randomness
pub const DEFAULT_TRAINING_SEED: u64 = 42;

/// Fraction of the labeled set held out for evaluation
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Directory name under the platform data dir
pub const APP_DIR_NAME: &str = "hazard-risk";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Default model directory: `<data_local_dir>/hazard-risk/models`
pub fn default_model_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("models")
}

/// Get model directory from environment or use default
pub fn get_model_dir() -> PathBuf {
    std::env::var("HAZARD_MODEL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_model_dir())
}

/// Get training sample count from environment or use default
pub fn get_training_samples() -> usize {
    std::env::var("HAZARD_TRAINING_SAMPLES")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or(DEFAULT_TRAINING_SAMPLES)
}

/// Get training seed from environment or use default
pub fn get_training_seed() -> u64 {
    std::env::var("HAZARD_TRAINING_SEED")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TRAINING_SEED)
}
