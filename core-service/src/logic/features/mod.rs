//! Features Module - Canonical feature contract
//!
//! One ordered layout shared by every hazard. Raw input is validated once,
//! up front, so no learner is ever invoked on partial data.

pub mod layout;
pub mod vector;
pub mod contract;

#[cfg(test)]
mod tests;

pub use contract::{validate, RawFeatures};
pub use layout::{feature_index, feature_name, LayoutInfo, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
pub use vector::FeatureVector;
