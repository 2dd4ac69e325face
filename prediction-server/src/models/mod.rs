//! Request/response models

pub mod prediction;
pub mod model;

pub use prediction::*;
pub use model::*;
