//! Feature Contract - Raw input → FeatureVector
//!
//! No implicit defaulting: a field the caller did not send is a
//! `MissingField` error, never a zero. Filling gaps is the feature
//! provider's job.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::layout::{feature_index, FEATURE_COUNT, FEATURE_LAYOUT};
use super::vector::FeatureVector;
use crate::error::ContractError;

/// Raw feature input, as a caller sends it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFeatures {
    /// Named mapping (field name → value)
    Named(Map<String, Value>),
    /// Pre-ordered values matching FEATURE_LAYOUT
    Ordered(Vec<Value>),
}

impl RawFeatures {
    /// Convenience for callers that already hold numbers
    pub fn from_numbers<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        RawFeatures::Named(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), number(v)))
                .collect(),
        )
    }

    pub fn from_ordered(values: &[f64]) -> Self {
        RawFeatures::Ordered(values.iter().copied().map(number).collect())
    }
}

impl From<HashMap<String, f64>> for RawFeatures {
    fn from(fields: HashMap<String, f64>) -> Self {
        RawFeatures::from_numbers(fields)
    }
}

// Non-finite floats have no JSON number form; keep them as Null so that
// validation reports them instead of silently dropping them.
fn number(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Validate raw input against the canonical layout
pub fn validate(raw: &RawFeatures) -> Result<FeatureVector, ContractError> {
    let mut values = [0.0f64; FEATURE_COUNT];

    match raw {
        RawFeatures::Named(map) => {
            for (i, &name) in FEATURE_LAYOUT.iter().enumerate() {
                let value = map.get(name).ok_or_else(|| ContractError::MissingField {
                    field: name.to_string(),
                })?;
                values[i] = numeric(name, value)?;
            }

            for key in map.keys().filter(|k| feature_index(k).is_none()) {
                log::debug!("Ignoring non-canonical feature field '{}'", key);
            }
        }
        RawFeatures::Ordered(seq) => {
            if seq.len() != FEATURE_COUNT {
                return Err(ContractError::Shape {
                    expected: FEATURE_COUNT,
                    actual: seq.len(),
                });
            }
            for (i, value) in seq.iter().enumerate() {
                values[i] = numeric(FEATURE_LAYOUT[i], value)?;
            }
        }
    }

    FeatureVector::from_values(values)
}

fn numeric(field: &str, value: &Value) -> Result<f64, ContractError> {
    let invalid = |reason: String| ContractError::InvalidValue {
        field: field.to_string(),
        reason,
    };

    match value {
        Value::Number(n) => {
            let v = n
                .as_f64()
                .ok_or_else(|| invalid(format!("{} is not representable as f64", n)))?;
            if v.is_finite() {
                Ok(v)
            } else {
                Err(invalid(format!("{} is not finite", v)))
            }
        }
        Value::Null => Err(invalid("null (or non-finite number)".to_string())),
        Value::Bool(_) => Err(invalid("boolean is not numeric".to_string())),
        Value::String(s) => Err(invalid(format!("string {:?} is not numeric", s))),
        Value::Array(_) | Value::Object(_) => Err(invalid("nested value is not numeric".to_string())),
    }
}
