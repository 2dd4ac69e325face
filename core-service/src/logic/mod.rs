//! Logic Module - Engine components
//!
//! Leaves first:
//! - `features/` - Canonical layout, FeatureVector, input contract
//! - `hazard` - Closed set of hazard types
//! - `model/` - Base learners, scaler, weighted combiner, risk classifier
//! - `registry` - One record slot per hazard, atomic swap on update
//! - `lifecycle/` - Train, evaluate, persist, load
//! - `scoring` - Prediction results and batch aggregation
//! - `engine` - Public entry point tying the above together
//! - `synthetic` - Reference feature and training-data providers

pub mod features;
pub mod hazard;
pub mod model;
pub mod registry;
pub mod lifecycle;
pub mod scoring;
pub mod engine;
pub mod synthetic;

#[cfg(test)]
pub(crate) mod test_support;
