//! Feature Vector - Validated input for every learner
//!
//! A `FeatureVector` only exists once every canonical field is present and
//! finite. Use `features::validate` to build one from raw input.

use std::collections::BTreeMap;

use super::layout::{feature_index, layout_hash, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
use crate::error::ContractError;

/// Versioned, fully-populated feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    version: u8,
    layout_hash: u32,
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Build from values already in canonical order.
    ///
    /// Fails on the first non-finite value.
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Result<Self, ContractError> {
        if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ContractError::InvalidValue {
                field: FEATURE_LAYOUT[i].to_string(),
                reason: format!("{} is not a finite number", v),
            });
        }

        Ok(Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn layout_hash(&self) -> u32 {
        self.layout_hash
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|i| self.values[i])
    }

    /// Named view, for logging and responses
    pub fn to_named(&self) -> BTreeMap<&'static str, f64> {
        FEATURE_LAYOUT
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_stamps_layout() {
        let vector = FeatureVector::from_values([1.0; FEATURE_COUNT]).unwrap();
        assert_eq!(vector.version(), FEATURE_VERSION);
        assert_eq!(vector.layout_hash(), layout_hash());
        assert_eq!(vector.get("temperature"), Some(1.0));
        assert_eq!(vector.get("nonexistent"), None);
    }

    #[test]
    fn test_from_values_rejects_nan() {
        let mut values = [0.0; FEATURE_COUNT];
        values[3] = f64::NAN;

        match FeatureVector::from_values(values) {
            Err(ContractError::InvalidValue { field, .. }) => assert_eq!(field, "wind_speed"),
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_to_named_covers_layout() {
        let vector = FeatureVector::from_values([2.5; FEATURE_COUNT]).unwrap();
        let named = vector.to_named();
        assert_eq!(named.len(), FEATURE_COUNT);
        assert_eq!(named["river_level"], 2.5);
    }
}
